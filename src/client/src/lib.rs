pub mod context;
pub mod exporters;
pub mod logging;
pub mod monitor;
pub mod panic_hook;

pub use monitor::{ErrorMonitor, MonitorDeps, MonitorState};
