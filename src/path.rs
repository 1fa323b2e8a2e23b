// checkpoint folder structure:
// {outdir}/
//  |- cpt.{name}/
//  |- cpt.simpoint_{name}_inst_{inst}_weight_{weight}_interval_{interval}_warmup_{warmup}
//  |     -> cpt.{name}
//  \- checkpoints.json

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

pub fn short_checkpoint_name(name: &str) -> String {
    format!("cpt.{}", name)
}

/// Long name in the format the simulator uses to restore SimPoint checkpoints
pub fn long_checkpoint_name<L: Display, W: Display>(
    label: L,
    inst: u64,
    weight: W,
    interval: u64,
    warmup: u64,
) -> String {
    format!(
        "cpt.simpoint_{}_inst_{}_weight_{}_interval_{}_warmup_{}",
        label, inst, weight, interval, warmup
    )
}

/// Numeric simpoint names are zero padded to two digits
pub fn simpoint_label(name: &str) -> String {
    match name.parse::<u64>() {
        Ok(index) => format!("{:02}", index),
        Err(_) => name.to_string(),
    }
}

/// Render a weight the way SimPoint's weight files print it: integral
/// weights keep one decimal place
pub fn format_weight(weight: f64) -> String {
    if weight.is_finite() && weight.fract() == 0.0 {
        format!("{:.1}", weight)
    } else {
        format!("{}", weight)
    }
}

pub fn get_checkpoint_path<P: AsRef<Path>>(outdir: P, short_name: &str) -> PathBuf {
    outdir.as_ref().join(short_name)
}

pub fn get_manifest_path<P: AsRef<Path>>(outdir: P) -> PathBuf {
    outdir.as_ref().join("checkpoints.json")
}

/// Create `{outdir}/{long_name} -> {short_name}`, replacing a stale link
pub fn link_checkpoint<P: AsRef<Path>>(
    outdir: P,
    short_name: &str,
    long_name: &str,
) -> anyhow::Result<PathBuf> {
    let link = outdir.as_ref().join(long_name);
    std::fs::remove_file(&link).ok();
    std::os::unix::fs::symlink(short_name, &link)?;
    log::info!("Create symlink: {} => {}", link.display(), short_name);
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names() {
        assert_eq!(
            long_checkpoint_name(simpoint_label("3"), 1200, format_weight(0.25), 100, 50),
            "cpt.simpoint_03_inst_1200_weight_0.25_interval_100_warmup_50"
        );
        assert_eq!(
            long_checkpoint_name(12, 0, 0, 1000, 1),
            "cpt.simpoint_12_inst_0_weight_0_interval_1000_warmup_1"
        );
        assert_eq!(simpoint_label("phase-a"), "phase-a");
        assert_eq!(format_weight(1.0), "1.0");
    }

    #[test]
    fn relink_replaces_existing_link() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        link_checkpoint(dir.path(), "cpt.0", "cpt.long")?;
        let link = link_checkpoint(dir.path(), "cpt.1", "cpt.long")?;
        assert_eq!(std::fs::read_link(link)?, PathBuf::from("cpt.1"));
        Ok(())
    }
}
