use super::{Histogram, is_compressed_image};
use crate::{config::Analysis, report::EntropyFinding};

/// Shannon entropy in bits per byte, in `0.0..=8.0`.
pub fn shannon(hist: &Histogram) -> f64 {
    if hist.total == 0 {
        return 0.0;
    }
    let len = hist.total as f64;
    hist.counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

pub fn threshold_for(cfg: &Analysis, mime: &str) -> f64 {
    if is_compressed_image(mime) {
        cfg.entropy_threshold_compressed
    } else {
        cfg.entropy_threshold_default
    }
}

pub fn entropy(cfg: &Analysis, hist: &Histogram, mime: &str) -> EntropyFinding {
    let value = shannon(hist);
    let threshold = threshold_for(cfg, mime);
    EntropyFinding {
        value,
        threshold,
        alert: value > threshold,
    }
}
