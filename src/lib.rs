mod bbhist;
mod bbv;
mod checkpoint;
mod chunk;
mod compress;
mod engine;
mod error;
mod path;
mod sampler;
#[cfg(test)]
mod testing;
mod utils;

pub use bbhist::*;
pub use bbv::*;
pub use checkpoint::*;
pub use chunk::*;
pub use compress::*;
pub use engine::*;
pub use error::*;
pub use path::*;
pub use sampler::*;
pub use utils::*;
