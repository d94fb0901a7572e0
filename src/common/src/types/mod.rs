mod captured;
mod record;

pub use captured::CapturedError;
pub use record::{fingerprint, iso_timestamp, ErrorRecord, Severity};
