//! Error telemetry buffer.
//!
//! Application code hands errors to [`ErrorMonitor::report_error`]. Each error
//! is normalised into an [`ErrorRecord`], queued, and delivered to every
//! configured sink either when the queue reaches the batch size, when the
//! periodic flush timer fires, or immediately for critical errors. Nothing in
//! here ever fails the caller: problems end in a log line.

#[cfg(test)]
mod tests;

use crate::context::ContextStore;
use crate::exporters::{HttpTransport, RemoteSink, SentrySink, Sink, Transport};
use anyhow::{Context, Result};
use arcu_common::config::MonitorConfig;
use arcu_common::environment::{EnvironmentProvider, ProcessEnvironment};
use arcu_common::store::{KeyValueStore, MemoryStore};
use arcu_common::types::{fingerprint, iso_timestamp, CapturedError, ErrorRecord, Severity};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

const DIAGNOSTIC_TARGET: &str = "arcu::monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

/// Collaborators of the monitor. Anything left unset gets the process
/// default: [`ProcessEnvironment`], in-memory stores and an HTTP transport.
#[derive(Default, TypedBuilder)]
pub struct MonitorDeps {
    #[builder(default, setter(strip_option))]
    environment: Option<Arc<dyn EnvironmentProvider>>,
    #[builder(default, setter(strip_option))]
    local_store: Option<Arc<dyn KeyValueStore>>,
    #[builder(default, setter(strip_option))]
    session_store: Option<Arc<dyn KeyValueStore>>,
    #[builder(default, setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,
    #[builder(default)]
    extra_sinks: Vec<Arc<dyn Sink>>,
}

struct Buffer {
    queue: Vec<ErrorRecord>,
    state: MonitorState,
}

enum Enqueued {
    Queued,
    BatchFull(Vec<ErrorRecord>),
    Stopped,
}

struct Inner {
    config: MonitorConfig,
    environment: Arc<dyn EnvironmentProvider>,
    context: ContextStore,
    sinks: Vec<Arc<dyn Sink>>,
    // queue and lifecycle state
    buffer: Mutex<Buffer>,
    flush_timer: Mutex<Option<CancellationToken>>,
    deliveries: TaskTracker,
    // one drain at a time; each closes and reopens the tracker
    drain_lock: tokio::sync::Mutex<()>,
    runtime: Handle,
}

/// Cheaply cloneable handle to the error telemetry buffer.
#[derive(Clone)]
pub struct ErrorMonitor {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ErrorMonitor {
    /// Builds a running monitor and arms the periodic flush timer.
    ///
    /// Must be called from within a tokio runtime; deliveries and timers are
    /// spawned on it.
    pub fn new(config: MonitorConfig, deps: MonitorDeps) -> Result<Self> {
        let runtime =
            Handle::try_current().context("ErrorMonitor must be created inside a tokio runtime")?;

        let mut config = config;
        if config.batch_size == 0 {
            warn!("batch_size of 0 is not allowed, using 1");
            config.batch_size = 1;
        }

        let environment: Arc<dyn EnvironmentProvider> = match deps.environment {
            Some(environment) => environment,
            None => Arc::new(ProcessEnvironment::new(config.production)),
        };
        let local_store: Arc<dyn KeyValueStore> = match deps.local_store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let session_store: Arc<dyn KeyValueStore> = match deps.session_store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
        if let Some(endpoint) = &config.remote_endpoint {
            let transport: Arc<dyn Transport> = match deps.transport {
                Some(transport) => transport,
                None => Arc::new(HttpTransport::new(Duration::from_millis(
                    config.request_timeout_ms,
                ))?),
            };
            sinks.push(Arc::new(RemoteSink::new(
                endpoint.clone(),
                transport,
                config.max_retries,
                config.enable_console_logging,
            )));
        }
        if config.sentry_dsn.is_some() {
            sinks.push(Arc::new(SentrySink::new(config.enable_console_logging)));
        }
        sinks.extend(deps.extra_sinks);

        let inner = Arc::new(Inner {
            context: ContextStore::new(local_store, session_store),
            environment,
            sinks,
            buffer: Mutex::new(Buffer {
                queue: Vec::with_capacity(config.batch_size),
                state: MonitorState::Running,
            }),
            flush_timer: Mutex::new(None),
            deliveries: TaskTracker::new(),
            drain_lock: tokio::sync::Mutex::new(()),
            runtime,
            config,
        });

        Inner::arm_flush_timer(&inner);

        info!(
            sinks = inner.sinks.len(),
            remote = inner.config.remote_delivery_enabled(),
            "Error monitoring initialized"
        );

        Ok(Self { inner })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn state(&self) -> MonitorState {
        lock(&self.inner.buffer).state
    }

    /// Number of records waiting for the next flush.
    pub fn queued(&self) -> usize {
        lock(&self.inner.buffer).queue.len()
    }

    /// Snapshot of the records waiting for the next flush.
    pub fn queued_records(&self) -> Vec<ErrorRecord> {
        lock(&self.inner.buffer).queue.clone()
    }

    /// Deliveries dispatched but not finished yet, retries included.
    pub fn in_flight(&self) -> usize {
        self.inner.deliveries.len()
    }

    /// Records an error. Critical errors are sent right away; everything is
    /// queued and the queue is flushed once it reaches the batch size.
    pub fn report_error(
        &self,
        error: impl Into<CapturedError>,
        context: Option<Map<String, Value>>,
    ) {
        if self.state() == MonitorState::Stopped {
            debug!("Error monitoring is stopped, dropping report");
            return;
        }

        let record = self.inner.prepare_record(&error.into(), context);

        if self.inner.config.enable_console_logging {
            let rendered =
                serde_json::to_string(&record).unwrap_or_else(|_| record.message.clone());
            error!(
                target: DIAGNOSTIC_TARGET,
                fingerprint = %record.fingerprint,
                severity = %record.severity,
                "Error reported: {}",
                rendered
            );
        }

        let immediate = (record.severity == Severity::Critical).then(|| record.clone());

        match self.inner.enqueue(record) {
            Enqueued::Stopped => {
                debug!("Error monitoring is stopped, dropping report");
            }
            Enqueued::Queued => {
                if let Some(record) = immediate {
                    self.inner.dispatch(record);
                }
            }
            Enqueued::BatchFull(batch) => {
                if let Some(record) = immediate {
                    self.inner.dispatch(record);
                }
                debug!("Queue reached batch size of {}, flushing", batch.len());
                self.inner.dispatch_all(batch);
            }
        }
    }

    /// Persists the user id (and optional details) for subsequent records.
    pub fn set_user_context(&self, user_id: &str, info: Option<&Map<String, Value>>) {
        if let Err(e) = self.inner.context.set_user_context(user_id, info) {
            warn!("Failed to set user context: {}", e);
            return;
        }
        for sink in &self.inner.sinks {
            sink.identify(user_id, info);
        }
    }

    /// Persists tags merged into every subsequent record.
    pub fn set_tags(&self, tags: &BTreeMap<String, String>) {
        if let Err(e) = self.inner.context.set_tags(tags) {
            warn!("Failed to set tags: {}", e);
            return;
        }
        for sink in &self.inner.sinks {
            sink.set_tags(tags);
        }
    }

    /// Drains the queue and dispatches every record to every sink.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Cancels any running flush timer and starts a fresh one.
    pub fn rearm_flush_timer(&self) {
        if self.state() == MonitorState::Stopped {
            debug!("Not re-arming flush timer on a stopped monitor");
            return;
        }
        Inner::arm_flush_timer(&self.inner);
    }

    /// Stops the monitor: cancels the flush timer and flushes what is left.
    /// Deliveries already dispatched keep running. Calling it again is a no-op.
    pub fn destroy(&self) {
        let remaining = {
            let mut buffer = lock(&self.inner.buffer);
            if buffer.state == MonitorState::Stopped {
                debug!("Error monitoring already stopped");
                return;
            }
            buffer.state = MonitorState::Stopped;
            std::mem::take(&mut buffer.queue)
        };

        self.inner.cancel_flush_timer();
        self.inner.dispatch_all(remaining);

        info!("Error monitoring stopped");
    }

    /// Waits until every dispatched delivery, retries included, has finished.
    /// Concurrent callers are served one after another.
    pub async fn drain(&self) {
        let _draining = self.inner.drain_lock.lock().await;
        let deliveries = &self.inner.deliveries;
        deliveries.close();
        deliveries.wait().await;
        deliveries.reopen();
    }
}

impl Inner {
    fn prepare_record(
        &self,
        error: &CapturedError,
        context: Option<Map<String, Value>>,
    ) -> ErrorRecord {
        let message = error.message();
        let kind = error.kind();

        ErrorRecord {
            stack_trace: error.stack(),
            timestamp: iso_timestamp(self.environment.now()),
            source_url: self.environment.current_url(),
            client_info: self.environment.user_agent(),
            user_id: Some(self.context.user_id()),
            session_id: self.context.session_id(),
            build_version: self.environment.build_version(),
            severity: Severity::classify(&message),
            fingerprint: fingerprint(&kind, &message),
            error_kind: kind,
            context,
            tags: self.context.tags(),
            message,
        }
    }

    fn enqueue(&self, record: ErrorRecord) -> Enqueued {
        let mut buffer = lock(&self.buffer);
        if buffer.state == MonitorState::Stopped {
            return Enqueued::Stopped;
        }

        buffer.queue.push(record);
        if buffer.queue.len() >= self.config.batch_size {
            Enqueued::BatchFull(std::mem::take(&mut buffer.queue))
        } else {
            Enqueued::Queued
        }
    }

    fn flush(&self) {
        let records = std::mem::take(&mut lock(&self.buffer).queue);
        if records.is_empty() {
            return;
        }
        debug!("Flushing {} queued error records", records.len());
        self.dispatch_all(records);
    }

    fn dispatch_all(&self, records: Vec<ErrorRecord>) {
        for record in records {
            self.dispatch(record);
        }
    }

    /// Spawns one independent delivery per sink and returns immediately.
    fn dispatch(&self, record: ErrorRecord) {
        if !self.config.enable_remote_logging || self.sinks.is_empty() {
            return;
        }

        let record = Arc::new(record);
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let record = Arc::clone(&record);

            self.deliveries.spawn_on(
                async move {
                    if let Err(e) = sink.deliver(&record).await {
                        warn!(
                            sink = sink.name(),
                            fingerprint = %record.fingerprint,
                            category = e.error_category().as_str(),
                            "Dropping error record: {}",
                            e.user_message()
                        );
                    }
                },
                &self.runtime,
            );
        }
    }

    fn arm_flush_timer(inner: &Arc<Self>) {
        let mut slot = lock(&inner.flush_timer);
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        if inner.config.flush_interval_ms == 0 {
            debug!("Periodic flush disabled");
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());

        let period = Duration::from_millis(inner.config.flush_interval_ms);
        let weak: Weak<Self> = Arc::downgrade(inner);

        inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Periodic flush cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match weak.upgrade() {
                            Some(inner) => inner.flush(),
                            None => break,
                        }
                    }
                }
            }
        });
    }

    fn cancel_flush_timer(&self) {
        if let Some(token) = lock(&self.flush_timer).take() {
            token.cancel();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self
            .flush_timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = slot.take() {
            token.cancel();
        }
    }
}
