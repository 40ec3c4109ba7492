use crate::{config::Analysis, report::LsbFinding};

/// Band in which embedding tools tend to leave the LSB ones-ratio.
const EMBEDDED_RATIO_BAND: std::ops::RangeInclusive<f64> = 0.50..=0.52;

/// Least-significant-bit statistics over the leading sample of the buffer.
///
/// Tools in the OpenStego family leave an LSB stream whose ones-ratio looks
/// uniform but whose bit-to-bit transitions are far more frequent than in an
/// untouched image.
pub fn lsb(cfg: &Analysis, bytes: &[u8]) -> LsbFinding {
    let sample = &bytes[..bytes.len().min(cfg.lsb_sample_bytes)];
    let n = sample.len();

    let ones = sample.iter().filter(|&&b| b & 1 == 1).count();
    let pair_changes = sample.windows(2).filter(|w| flips(w[0], w[1])).count();
    let sequential_changes = sample
        .windows(3)
        .filter(|w| flips(w[0], w[1]) && flips(w[1], w[2]))
        .count();

    let ratio = ratio_of(ones, n);
    let bit_pair_change_ratio = ratio_of(pair_changes, n.saturating_sub(1));
    let sequential_change_ratio = ratio_of(sequential_changes, n.saturating_sub(2));
    let deviation = (ratio - 0.5).abs();

    let many_flips = bit_pair_change_ratio > cfg.lsb_min_pair_change_ratio;
    let chained_flips = sequential_change_ratio > cfg.lsb_min_sequential_change_ratio;
    let suspicious = (deviation < cfg.lsb_max_deviation && many_flips)
        || (chained_flips && many_flips)
        || (EMBEDDED_RATIO_BAND.contains(&ratio) && many_flips && chained_flips);

    LsbFinding {
        ratio,
        deviation,
        bit_pair_change_ratio,
        sequential_change_ratio,
        suspicious,
    }
}

fn flips(a: u8, b: u8) -> bool {
    (a ^ b) & 1 == 1
}

fn ratio_of(count: usize, over: usize) -> f64 {
    if over == 0 {
        0.0
    } else {
        count as f64 / over as f64
    }
}
