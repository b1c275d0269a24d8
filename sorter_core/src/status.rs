//! Outcome of one pass through the sort loop.

use crate::error::SorterError;
use crate::types::SortEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown flag observed (operator interrupt).
    Shutdown,
    /// Every bean source reported it will never fire again.
    SourcesExhausted,
    /// The requested number of beans was handled.
    BeanLimit,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Shutdown => "shutdown",
            StopReason::SourcesExhausted => "sources_exhausted",
            StopReason::BeanLimit => "bean_limit",
        }
    }
}

/// Public status of a single step of the sort loop.
#[derive(Debug)]
pub enum SortStatus {
    /// One bean measured, classified, routed and recorded.
    Sorted(SortEvent),
    /// The bean's cycle failed; it was counted and the actuator sent home.
    Failed(SorterError),
    /// No further beans will be processed.
    Stopped(StopReason),
}
