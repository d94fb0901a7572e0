pub mod remote;
pub mod sentry_sink;
pub mod sink;

pub use remote::{HttpTransport, RemoteSink, SendError, SendResult, Transport};
pub use sentry_sink::SentrySink;
pub use sink::Sink;
