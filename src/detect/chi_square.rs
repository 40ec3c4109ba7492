use super::Histogram;
use crate::{config::Analysis, report::ChiSquareFinding};

/// Goodness-of-fit of the byte histogram against a uniform distribution
/// (255 degrees of freedom).
pub fn chi_square(cfg: &Analysis, hist: &Histogram) -> ChiSquareFinding {
    if hist.total == 0 {
        return ChiSquareFinding {
            value: 0.0,
            suspicious: false,
        };
    }
    let expected = hist.total as f64 / 256.0;
    let value: f64 = hist
        .counts
        .iter()
        .map(|&observed| {
            let diff = observed as f64 - expected;
            diff * diff / expected
        })
        .sum();
    ChiSquareFinding {
        value,
        suspicious: value > cfg.chi_square_max,
    }
}
