use crate::{
    pool::JobHandle,
    policy::{self, AdmissionDecision},
    probe::Upload,
    report::AnalysisReport,
    scheduler::SchedulerHandle,
};
use serde::Serialize;
use tracing::{info, warn};

/// Upload admission: analyze through the scheduler, then decide.
///
/// Analyzer failures never block an upload. The file is scored with a
/// neutral report and admitted with `analysis_skipped` set, trading a
/// possible false negative for availability.
pub struct Pipeline {
    scheduler: SchedulerHandle,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreeningOutcome {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub report: AnalysisReport,
    pub decision: AdmissionDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct InFlight {
    filename: String,
    mime_type: String,
    size: u64,
    handle: JobHandle<AnalysisReport>,
}

impl Pipeline {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub async fn screen(&self, upload: Upload) -> ScreeningOutcome {
        let in_flight = self.dispatch(upload);
        settle(in_flight).await
    }

    /// Submits every upload before awaiting any, so they share the pool.
    /// Outcomes come back in input order.
    pub async fn screen_all(&self, uploads: Vec<Upload>) -> Vec<ScreeningOutcome> {
        let pending: Vec<InFlight> = uploads.into_iter().map(|u| self.dispatch(u)).collect();
        let mut outcomes = Vec::with_capacity(pending.len());
        for in_flight in pending {
            outcomes.push(settle(in_flight).await);
        }
        outcomes
    }

    fn dispatch(&self, upload: Upload) -> InFlight {
        let size = upload.size();
        let Upload {
            filename,
            mime_type,
            bytes,
        } = upload;
        info!("screening file={filename} mime={mime_type} size={size}");
        let handle = self.scheduler.analyze(bytes, &filename, &mime_type);
        InFlight {
            filename,
            mime_type,
            size,
            handle,
        }
    }
}

async fn settle(in_flight: InFlight) -> ScreeningOutcome {
    let InFlight {
        filename,
        mime_type,
        size,
        handle,
    } = in_flight;

    let (report, error) = match handle.await {
        Ok(report) => (report, None),
        Err(err) => {
            warn!("analysis skipped for {filename}: {err}");
            (
                AnalysisReport::neutral(&filename, &mime_type, size),
                Some(err.to_string()),
            )
        }
    };

    let decision = policy::decide(&report, error.is_some());
    info!(
        "verdict file={filename} risk={} verdict={:?} admit={} analysis_ms={}",
        report.risk_score, report.verdict, decision.admit, report.analysis_time_ms
    );
    if let Some(alert) = &decision.alert {
        warn!("admin alert: {}", alert.summary);
    }

    ScreeningOutcome {
        filename,
        mime_type,
        size,
        report,
        decision,
        error,
    }
}
