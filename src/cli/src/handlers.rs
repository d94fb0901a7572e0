use crate::commands::ReportArgs;
use anyhow::{bail, Context, Result};
use arcu_client::{ErrorMonitor, MonitorDeps};
use arcu_common::config::MonitorConfig;
use arcu_common::constants::{TAGS_KEY, USER_ID_KEY};
use arcu_common::environment::ProcessEnvironment;
use arcu_common::store::{FileStore, KeyValueStore, MemoryStore};
use arcu_common::types::CapturedError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const APPLICATION_NAME: &str = "arcu-monitor";

/// Directory of the file-backed local store.
pub fn state_dir(config: &MonitorConfig) -> PathBuf {
    config.state_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("arcu")
    })
}

/// Monitor backed by the persistent local store and a store for this
/// process only as the session store.
pub fn build_monitor(config: MonitorConfig) -> Result<ErrorMonitor> {
    let local = Arc::new(FileStore::in_dir(state_dir(&config)));
    monitor_with_store(config, local)
}

fn monitor_with_store(config: MonitorConfig, local: Arc<FileStore>) -> Result<ErrorMonitor> {
    info!("Using local store at {:?}", local.path());

    let deps = MonitorDeps::builder()
        .environment(Arc::new(
            ProcessEnvironment::new(config.production).with_application(APPLICATION_NAME),
        ))
        .local_store(local)
        .session_store(Arc::new(MemoryStore::new()))
        .build();

    ErrorMonitor::new(config, deps)
}

pub fn captured_error(args: &ReportArgs) -> CapturedError {
    let error = match &args.kind {
        Some(kind) => CapturedError::structured(kind.clone(), args.message.clone()),
        None => CapturedError::from(args.message.clone()),
    };
    match &args.stack {
        Some(stack) => error.with_stack(stack.clone()),
        None => error,
    }
}

pub fn context_map(pairs: &[(String, String)]) -> Option<Map<String, Value>> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

pub async fn report(mut config: MonitorConfig, args: ReportArgs) -> Result<()> {
    if let Some(endpoint) = &args.endpoint {
        config.remote_endpoint = Some(endpoint.clone());
    }
    if !config.remote_delivery_enabled() {
        println!("No remote endpoint configured, the error is only logged locally.");
    }

    let monitor = build_monitor(config)?;
    monitor.report_error(captured_error(&args), context_map(&args.context));

    monitor.destroy();
    monitor.drain().await;

    println!("Error reported.");
    Ok(())
}

pub fn set_user(config: MonitorConfig, user_id: &str, info: Option<&str>) -> Result<()> {
    let info: Option<Map<String, Value>> = match info {
        Some(raw) => match serde_json::from_str(raw).context("--info must be valid JSON")? {
            Value::Object(map) => Some(map),
            _ => bail!("--info must be a JSON object"),
        },
        None => None,
    };

    let local = Arc::new(FileStore::in_dir(state_dir(&config)));
    let monitor = monitor_with_store(config, Arc::clone(&local))?;
    monitor.set_user_context(user_id, info.as_ref());
    monitor.destroy();

    let stored = local
        .get(USER_ID_KEY)
        .with_context(|| format!("Failed to read back {:?}", local.path()))?;
    if stored.as_deref() != Some(user_id) {
        bail!("User context was not stored in {:?}", local.path());
    }

    println!("User context set to {}.", user_id);
    Ok(())
}

pub fn set_tags(config: MonitorConfig, tags: Vec<(String, String)>) -> Result<()> {
    let tags: BTreeMap<String, String> = tags.into_iter().collect();

    let local = Arc::new(FileStore::in_dir(state_dir(&config)));
    let monitor = monitor_with_store(config, Arc::clone(&local))?;
    monitor.set_tags(&tags);
    monitor.destroy();

    let stored: Option<BTreeMap<String, String>> = local
        .get(TAGS_KEY)
        .with_context(|| format!("Failed to read back {:?}", local.path()))?
        .and_then(|raw| serde_json::from_str(&raw).ok());
    if stored.as_ref() != Some(&tags) {
        bail!("Tags were not stored in {:?}", local.path());
    }

    println!("Stored {} tag(s).", tags.len());
    Ok(())
}

pub fn print_config(config: &MonitorConfig, json: bool) -> Result<()> {
    let rendered = if json {
        serde_json::to_string_pretty(config)?
    } else {
        toml::to_string_pretty(config)?
    };
    println!("{}", rendered);
    println!("# local store: {:?}", state_dir(config));
    Ok(())
}
