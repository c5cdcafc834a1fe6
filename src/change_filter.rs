use crate::summary::FrameSummary;
use tracing::trace;

/// Passes a summary downstream only when the active counts changed since
/// the last summary it saw.
#[derive(Clone, Debug, Default)]
pub struct ChangeFilter {
    previous: Option<FrameSummary>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the summary if it should be emitted, `None` if suppressed.
    /// The first summary is always emitted.
    pub fn filter(&mut self, summary: FrameSummary) -> Option<FrameSummary> {
        if let Some(previous) = &self.previous {
            if previous.same_counts(&summary) {
                trace!("suppressed unchanged summary at {} ms", summary.timestamp_ms);
                return None;
            }
        }
        self.previous = Some(summary.clone());
        Some(summary)
    }

    pub fn previous(&self) -> Option<&FrameSummary> {
        self.previous.as_ref()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
