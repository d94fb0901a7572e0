use crate::exporters::remote::{SendError, SendResult};
use crate::exporters::sink::Sink;
use arcu_common::types::{ErrorRecord, Severity};
use async_trait::async_trait;
use sentry::protocol::{Context, User};
use sentry::Hub;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub fn sentry_level(severity: Severity) -> sentry::Level {
    match severity {
        Severity::Info => sentry::Level::Info,
        Severity::Warning => sentry::Level::Warning,
        Severity::Error => sentry::Level::Error,
        Severity::Critical => sentry::Level::Fatal,
    }
}

/// Sentry only accepts flat contexts; nested values are dropped.
fn flat_context(context: &Map<String, Value>) -> BTreeMap<String, Value> {
    context
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Forwards records to Sentry.
///
/// The sink owns the hub it was created with. User and tags live on that hub,
/// and every capture runs on a hub forked from it, so the thread a delivery
/// runs on does not matter. The Sentry client queues and sends events itself,
/// so delivery here is a single capture without retries.
#[derive(Clone)]
pub struct SentrySink {
    hub: Arc<Hub>,
    console_logging: bool,
}

impl SentrySink {
    /// Sink bound to the hub of the calling thread.
    pub fn new(console_logging: bool) -> Self {
        Self::with_hub(Hub::current(), console_logging)
    }

    pub fn with_hub(hub: Arc<Hub>, console_logging: bool) -> Self {
        Self {
            hub,
            console_logging,
        }
    }
}

#[async_trait]
impl Sink for SentrySink {
    fn name(&self) -> &'static str {
        "sentry"
    }

    async fn deliver(&self, record: &ErrorRecord) -> SendResult<()> {
        if self.hub.client().is_none() {
            return Err(SendError::Rejected(
                "Sentry client is not initialised".to_string(),
            ));
        }

        let hub = Hub::new_from_top(&self.hub);
        hub.configure_scope(|scope| {
            scope.set_tag("errorType", &record.error_kind);
            scope.set_tag("severity", record.severity.as_str());
            scope.set_level(Some(sentry_level(record.severity)));

            if let Some(context) = &record.context {
                scope.set_context("error_context", Context::Other(flat_context(context)));
            }
            for (key, value) in &record.tags {
                scope.set_tag(key, value);
            }

            let fingerprint = [record.fingerprint.as_str()];
            scope.set_fingerprint(Some(&fingerprint[..]));
        });
        hub.capture_message(&record.message, sentry_level(record.severity));

        if self.console_logging {
            debug!(fingerprint = %record.fingerprint, "Error sent to Sentry");
        }
        Ok(())
    }

    fn identify(&self, user_id: &str, info: Option<&Map<String, Value>>) {
        let other = info
            .map(|info| info.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        self.hub.configure_scope(|scope| {
            scope.set_user(Some(User {
                id: Some(user_id.to_string()),
                other,
                ..Default::default()
            }));
        });
    }

    fn set_tags(&self, tags: &BTreeMap<String, String>) {
        self.hub.configure_scope(|scope| {
            for (key, value) in tags {
                scope.set_tag(key, value);
            }
        });
    }
}
