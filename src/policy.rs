use crate::{
    config::Weights,
    detect::is_compressed_image,
    report::{
        AnalysisReport, ChiSquareFinding, EntropyFinding, LsbFinding, MetadataFinding,
        PatternFinding, PixelCorrelationFinding, ScoreContribution, Verdict,
    },
};
use serde::{Deserialize, Serialize};

pub const MAX_RISK_SCORE: u32 = 100;

/// The six test results a score is computed from.
pub struct Findings<'a> {
    pub mime_type: &'a str,
    pub entropy: &'a EntropyFinding,
    pub lsb: &'a LsbFinding,
    pub chi_square: &'a ChiSquareFinding,
    pub patterns: &'a PatternFinding,
    pub pixel_correlation: &'a PixelCorrelationFinding,
    pub metadata: &'a MetadataFinding,
}

/// Weighted sum of the flagged tests, capped at 100.
pub fn score(weights: &Weights, f: &Findings<'_>) -> (u8, Vec<ScoreContribution>) {
    let entropy_weight = if is_compressed_image(f.mime_type) {
        weights.entropy_compressed
    } else {
        weights.entropy_default
    };

    let flagged = [
        ("entropy", f.entropy.alert, entropy_weight),
        ("lsb", f.lsb.suspicious, weights.lsb),
        ("chi_square", f.chi_square.suspicious, weights.chi_square),
        ("patterns", f.patterns.suspicious, weights.patterns),
        (
            "pixel_correlation",
            f.pixel_correlation.suspicious,
            weights.pixel_correlation,
        ),
        ("metadata", f.metadata.suspicious, weights.metadata),
    ];

    let breakdown: Vec<ScoreContribution> = flagged
        .into_iter()
        .filter(|&(_, hit, _)| hit)
        .map(|(test, _, points)| ScoreContribution {
            test: test.to_string(),
            points,
        })
        .collect();

    let total: u32 = breakdown.iter().map(|c| c.points).sum();
    (total.min(MAX_RISK_SCORE) as u8, breakdown)
}

/// What gets stored next to the admitted file or message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub verdict: Verdict,
    pub risk_score: u8,
    pub analysis_time_ms: u64,
}

/// Real-time notification payload for room administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAlert {
    pub filename: String,
    pub mime_type: String,
    pub verdict: Verdict,
    pub risk_score: u8,
    pub summary: String,
    pub breakdown: Vec<ScoreContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub admit: bool,
    pub analysis_skipped: bool,
    pub record: AdmissionRecord,
    pub alert: Option<AdminAlert>,
}

/// Upload admission. Only REJECTED keeps a file out; ALERT and REJECTED also
/// raise an admin alert. A skipped analysis never blocks the upload.
pub fn decide(report: &AnalysisReport, analysis_skipped: bool) -> AdmissionDecision {
    let verdict = report.verdict;
    let alert = verdict.notifies_admins().then(|| AdminAlert {
        filename: report.filename.clone(),
        mime_type: report.mime_type.clone(),
        verdict,
        risk_score: report.risk_score,
        summary: format!(
            "{} scored {}/100: {}",
            report.filename,
            report.risk_score,
            verdict.describe()
        ),
        breakdown: report.breakdown.clone(),
    });

    AdmissionDecision {
        admit: !verdict.blocks_admission(),
        analysis_skipped,
        record: AdmissionRecord {
            verdict,
            risk_score: report.risk_score,
            analysis_time_ms: report.analysis_time_ms,
        },
        alert,
    }
}
