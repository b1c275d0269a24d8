//! Maps `Box<dyn Error>` from trait boundaries to typed `SorterError`.
//!
//! The traits in `sorter_traits` use `Box<dyn Error + Send + Sync>` so any device
//! can plug in; this module converts those to our typed error enum, with an
//! optional feature-gated path for `sorter_hardware::HwError` downcasting.

use crate::error::SorterError;

/// Map a trait-boundary error to a typed `SorterError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    #[cfg(feature = "hardware-errors")]
    {
        use sorter_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout | HwError::DataReadyTimeout => SorterError::Timeout,
                HwError::InvalidArgument(m) => SorterError::Config(m.clone()),
                other => SorterError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        SorterError::Timeout
    } else {
        SorterError::Hardware(s)
    }
}

/// Boxed trait error into an `eyre::Report` carrying a typed `SorterError`.
pub(crate) fn hw_report(e: &sorter_traits::BoxError, what: &'static str) -> eyre::Report {
    eyre::Report::new(map_hw_error(&**e)).wrap_err(what)
}
