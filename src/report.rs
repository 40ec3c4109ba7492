use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    Warning,
    Alert,
    Rejected,
}

impl Verdict {
    /// Bands are inclusive on their lower edge.
    pub fn from_score(risk_score: u8) -> Self {
        match risk_score {
            70.. => Verdict::Rejected,
            40..=69 => Verdict::Alert,
            20..=39 => Verdict::Warning,
            _ => Verdict::Approved,
        }
    }

    /// Only a rejected file is kept out of the room.
    pub fn blocks_admission(self) -> bool {
        matches!(self, Verdict::Rejected)
    }

    pub fn notifies_admins(self) -> bool {
        matches!(self, Verdict::Alert | Verdict::Rejected)
    }

    pub fn describe(self) -> &'static str {
        match self {
            Verdict::Approved => "no significant anomalies",
            Verdict::Warning => "possible anomalies",
            Verdict::Alert => "moderate risk detected",
            Verdict::Rejected => "high risk of manipulation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyFinding {
    pub value: f64,
    pub threshold: f64,
    pub alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsbFinding {
    pub ratio: f64,
    pub deviation: f64,
    pub bit_pair_change_ratio: f64,
    pub sequential_change_ratio: f64,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareFinding {
    pub value: f64,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFinding {
    pub repetitions: u32,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelCorrelationFinding {
    pub correlation: f64,
    pub average_difference: f64,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFinding {
    pub magic_bytes: String,
    pub detected_type: String,
    pub suspicious: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Points one flagged test contributed to the risk score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreContribution {
    pub test: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub entropy: EntropyFinding,
    pub lsb: LsbFinding,
    pub chi_square: ChiSquareFinding,
    pub patterns: PatternFinding,
    pub pixel_correlation: PixelCorrelationFinding,
    pub metadata: MetadataFinding,
    pub risk_score: u8,
    pub verdict: Verdict,
    pub breakdown: Vec<ScoreContribution>,
    pub analysis_time_ms: u64,
}

impl AnalysisReport {
    /// Stand-in used when analysis could not run: scores nothing and approves.
    pub fn neutral(filename: &str, mime_type: &str, size: u64) -> Self {
        Self {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size,
            entropy: EntropyFinding {
                value: 0.0,
                threshold: 0.0,
                alert: false,
            },
            lsb: LsbFinding {
                ratio: 0.0,
                deviation: 0.0,
                bit_pair_change_ratio: 0.0,
                sequential_change_ratio: 0.0,
                suspicious: false,
            },
            chi_square: ChiSquareFinding {
                value: 0.0,
                suspicious: false,
            },
            patterns: PatternFinding {
                repetitions: 0,
                suspicious: false,
            },
            pixel_correlation: PixelCorrelationFinding {
                correlation: 1.0,
                average_difference: 0.0,
                suspicious: false,
            },
            metadata: MetadataFinding {
                magic_bytes: String::new(),
                detected_type: "Unknown".to_string(),
                suspicious: false,
                reason: Some("analysis skipped".to_string()),
            },
            risk_score: 0,
            verdict: Verdict::Approved,
            breakdown: Vec::new(),
            analysis_time_ms: 0,
        }
    }
}
