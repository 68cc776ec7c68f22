use std::fmt;
use crate::error::{Error, FailureKind};
use crate::types::metrics::DerivedMetrics;
use crate::types::series_key::SeriesKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Committing,
    Degraded,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Fetching => "fetching",
            SchedulerState::Committing => "committing",
            SchedulerState::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Why a tick produced no new record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DegradedReason {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&Error> for DegradedReason {
    fn from(error: &Error) -> Self {
        DegradedReason {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// What a presentation layer should show for the selected key.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricsView {
    /// No tick has completed yet; carries whatever history was reloaded.
    Starting { last_known: Option<DerivedMetrics> },
    /// Freshly committed this tick.
    Live(DerivedMetrics),
    /// This tick failed; the last committed record stands in.
    Stale {
        last_known: DerivedMetrics,
        reason: DegradedReason,
    },
    /// This tick failed and the key has no history at all.
    NoDataYet { reason: DegradedReason },
}

impl MetricsView {
    pub fn metrics(&self) -> Option<&DerivedMetrics> {
        match self {
            MetricsView::Starting { last_known } => last_known.as_ref(),
            MetricsView::Live(metrics) => Some(metrics),
            MetricsView::Stale { last_known, .. } => Some(last_known),
            MetricsView::NoDataYet { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MetricsView::Stale { .. } | MetricsView::NoDataYet { .. })
    }

    pub fn reason(&self) -> Option<&DegradedReason> {
        match self {
            MetricsView::Stale { reason, .. } | MetricsView::NoDataYet { reason } => Some(reason),
            MetricsView::Starting { .. } | MetricsView::Live(_) => None,
        }
    }
}

/// Published after every tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub key: SeriesKey,
    /// 0 before the first tick.
    pub tick: u64,
    /// `Committing` or `Degraded` for the tick just finished, `Idle` before the first.
    pub outcome: SchedulerState,
    pub view: MetricsView,
}
