use crate::{
    config::Analysis,
    detect::{self, Histogram},
    policy::{self, Findings},
    report::{AnalysisReport, Verdict},
};
use std::time::Instant;

/// Runs every test and scores the result. Pure: equal inputs give equal
/// reports, and `analysis_time_ms` is left at 0.
pub fn evaluate(cfg: &Analysis, bytes: &[u8], filename: &str, mime_type: &str) -> AnalysisReport {
    let hist = Histogram::from_bytes(bytes);

    let entropy = detect::entropy(cfg, &hist, mime_type);
    let lsb = detect::lsb(cfg, bytes);
    let chi_square = detect::chi_square(cfg, &hist);
    let patterns = detect::patterns(cfg, bytes);
    let pixel_correlation = detect::pixel_correlation(cfg, bytes, mime_type);
    let metadata = detect::metadata(bytes, mime_type);

    let (risk_score, breakdown) = policy::score(
        &cfg.weights,
        &Findings {
            mime_type,
            entropy: &entropy,
            lsb: &lsb,
            chi_square: &chi_square,
            patterns: &patterns,
            pixel_correlation: &pixel_correlation,
            metadata: &metadata,
        },
    );

    AnalysisReport {
        filename: filename.to_string(),
        mime_type: mime_type.to_string(),
        size: bytes.len() as u64,
        entropy,
        lsb,
        chi_square,
        patterns,
        pixel_correlation,
        metadata,
        risk_score,
        verdict: Verdict::from_score(risk_score),
        breakdown,
        analysis_time_ms: 0,
    }
}

/// [`evaluate`] plus wall-clock timing.
pub fn analyze(cfg: &Analysis, bytes: &[u8], filename: &str, mime_type: &str) -> AnalysisReport {
    let started = Instant::now();
    let mut report = evaluate(cfg, bytes, filename, mime_type);
    report.analysis_time_ms = started.elapsed().as_millis() as u64;
    report
}
