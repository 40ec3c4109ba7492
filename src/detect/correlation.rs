use super::is_png;
use crate::{config::Analysis, report::PixelCorrelationFinding};

const UNCORRELATED: PixelCorrelationFinding = PixelCorrelationFinding {
    correlation: 1.0,
    average_difference: 0.0,
    suspicious: false,
};

/// Adjacent-byte similarity. Only meaningful for PNG; every other type
/// reports full correlation.
pub fn pixel_correlation(cfg: &Analysis, bytes: &[u8], mime: &str) -> PixelCorrelationFinding {
    if !is_png(mime) || bytes.len() < 2 {
        return UNCORRELATED;
    }
    let pairs = (bytes.len() - 1).min(cfg.pixel_sample_pairs);
    if pairs == 0 {
        return UNCORRELATED;
    }

    let sum_diff: u64 = bytes[..=pairs]
        .windows(2)
        .map(|w| u64::from(w[0].abs_diff(w[1])))
        .sum();
    let average_difference = sum_diff as f64 / pairs as f64;
    let correlation = 1.0 - average_difference / 255.0;

    PixelCorrelationFinding {
        correlation,
        average_difference,
        suspicious: correlation < cfg.pixel_min_correlation,
    }
}
