use crate::SamplingError;
use std::collections::HashMap;

/// One executed basic block in a histogram dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCount {
    /// comma separated instruction addresses, used as an opaque key
    pub block: String,
    /// number of times the block was entered in the interval
    pub count: u64,
}

impl BlockCount {
    /// number of instructions in the block
    pub fn length(&self) -> u64 {
        self.block.split(',').count() as u64
    }

    /// instructions retired by this block in the interval
    pub fn weight(&self) -> u64 {
        self.count.saturating_mul(self.length())
    }
}

/// Basic block histogram of one interval, in dump order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicBlockObservation {
    pub blocks: Vec<BlockCount>,
    /// sum of count * length over all blocks
    pub total_insts: u64,
}

/// Parse the output of `bbhist dump`: one "<count> <block>" line per block.
///
/// An unterminated final line means the instrumentation and the driver
/// disagree on where the interval ended, so it is rejected.
pub fn parse_bbhist(s: &str) -> Result<BasicBlockObservation, SamplingError> {
    if s.is_empty() {
        return Ok(BasicBlockObservation::default());
    }
    let Some(body) = s.strip_suffix('\n') else {
        return Err(SamplingError::UnterminatedHistogram);
    };

    let mut observation = BasicBlockObservation::default();
    for (i, line) in body.split('\n').enumerate() {
        let malformed = || SamplingError::MalformedHistogram {
            line: i + 1,
            text: line.to_string(),
        };

        let mut fields = line.split_whitespace();
        let (Some(count), Some(block), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed());
        };
        let count: u64 = count.parse().map_err(|_| malformed())?;
        if count == 0 {
            return Err(malformed());
        }

        let block = BlockCount {
            block: block.to_string(),
            count,
        };
        observation.total_insts = count
            .checked_mul(block.length())
            .and_then(|weight| observation.total_insts.checked_add(weight))
            .ok_or_else(malformed)?;
        observation.blocks.push(block);
    }
    Ok(observation)
}

/// Dense block ids shared by every interval of one sampling session.
///
/// Ids start at 1 and follow first-seen order, so they can be used directly as
/// vector dimensions by SimPoint.
#[derive(Debug, Default)]
pub struct BlockIdRegistry {
    ids: HashMap<String, u64>,
}

impl BlockIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, block: &str) -> u64 {
        if let Some(id) = self.ids.get(block) {
            return *id;
        }
        let id = self.ids.len() as u64 + 1;
        self.ids.insert(block.to_string(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_computes_total_weight() {
        let dump = "3 401000,401004,401008\n10 401100\n2 401200,401204\n";
        let observation = parse_bbhist(dump).unwrap();
        assert_eq!(observation.blocks.len(), 3);
        assert_eq!(observation.blocks[0].weight(), 9);
        assert_eq!(observation.blocks[1].weight(), 10);
        assert_eq!(observation.blocks[2].weight(), 4);
        assert_eq!(observation.total_insts, 3 * 3 + 10 + 2 * 2);
    }

    #[test]
    fn parse_rejects_unterminated_dump() {
        let err = parse_bbhist("3 401000\n1 401004").unwrap_err();
        assert!(matches!(err, SamplingError::UnterminatedHistogram));
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        for dump in ["abc 401000\n", "0 401000\n", "3\n", "3 401000 extra\n", "1 a\n\n"] {
            assert!(
                matches!(
                    parse_bbhist(dump),
                    Err(SamplingError::MalformedHistogram { .. })
                ),
                "accepted {dump:?}"
            );
        }
    }

    #[test]
    fn overflowing_weights_are_rejected() {
        assert!(matches!(
            parse_bbhist("18446744073709551615 a,b\n"),
            Err(SamplingError::MalformedHistogram { line: 1, .. })
        ));
        assert!(matches!(
            parse_bbhist("9223372036854775808 a\n9223372036854775808 b\n"),
            Err(SamplingError::MalformedHistogram { line: 2, .. })
        ));
        // largest weight that still fits
        let observation = parse_bbhist("18446744073709551615 a\n").unwrap();
        assert_eq!(observation.total_insts, u64::MAX);
    }

    #[test]
    fn empty_dump_is_an_empty_interval() {
        let observation = parse_bbhist("").unwrap();
        assert!(observation.blocks.is_empty());
        assert_eq!(observation.total_insts, 0);
    }

    #[test]
    fn registry_is_stable_and_dense() {
        let mut registry = BlockIdRegistry::new();
        assert_eq!(registry.id("a,b"), 1);
        assert_eq!(registry.id("c"), 2);
        assert_eq!(registry.id("a,b"), 1);
        assert_eq!(registry.id("d"), 3);
        assert_eq!(registry.id("c"), 2);
        assert_eq!(registry.len(), 3);
    }
}
