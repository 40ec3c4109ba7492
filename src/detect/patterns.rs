use crate::{config::Analysis, report::PatternFinding};
use std::collections::HashMap;

/// Counts re-occurrences of fixed-size chunks taken at non-overlapping
/// offsets. A chunk contributes one repetition per sighting beyond
/// `pattern_max_occurrences`.
pub fn patterns(cfg: &Analysis, bytes: &[u8]) -> PatternFinding {
    let chunk = cfg.pattern_chunk_bytes.max(1);
    let mut seen: HashMap<&[u8], u32> = HashMap::new();
    let mut repetitions = 0u32;

    // The trailing chunk is never sampled, even when it is complete.
    let mut offset = 0;
    while offset + chunk < bytes.len() {
        let count = seen.entry(&bytes[offset..offset + chunk]).or_insert(0);
        *count += 1;
        if *count > cfg.pattern_max_occurrences {
            repetitions += 1;
        }
        offset += chunk;
    }

    let limit = bytes.len() as f64 / (chunk * cfg.pattern_density_divisor.max(1)) as f64;
    PatternFinding {
        repetitions,
        suspicious: f64::from(repetitions) > limit,
    }
}
