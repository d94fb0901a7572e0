use crate::exporters::remote::SendResult;
use arcu_common::types::ErrorRecord;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A delivery target for error records.
///
/// Deliveries run as detached tasks; a sink owns its own retry policy and
/// reports the final outcome only.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, record: &ErrorRecord) -> SendResult<()>;

    /// Called after the user context changed.
    fn identify(&self, _user_id: &str, _info: Option<&Map<String, Value>>) {}

    /// Called after the tags changed.
    fn set_tags(&self, _tags: &BTreeMap<String, String>) {}
}
