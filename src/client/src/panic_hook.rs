//! Process-wide handler routing panics into the error monitor.

use crate::monitor::ErrorMonitor;
use arcu_common::types::CapturedError;
use tracing::error;

/// Installs a panic hook that logs the panic and reports it through
/// `monitor`, then runs the previously installed hook.
pub fn install(monitor: ErrorMonitor) {
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        error!("Global error caught: {}", info);
        monitor.report_error(CapturedError::from_panic(info), None);
        previous(info);
    }));
}
