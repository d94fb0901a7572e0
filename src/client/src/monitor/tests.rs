use super::*;
use crate::exporters::remote::{MockTransport, SendError, SendResult};
use arcu_common::config::MonitorOverrides;
use arcu_common::environment::FixedEnvironment;
use arcu_common::store::MemoryStore;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const ENDPOINT: &str = "http://test/errors";

#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<(String, ErrorRecord, Instant)>>,
    failures_left: AtomicUsize,
}

impl RecordingTransport {
    fn failing_first(failures: usize) -> Self {
        Self {
            calls: Mutex::default(),
            failures_left: AtomicUsize::new(failures),
        }
    }

    fn calls(&self) -> Vec<(String, ErrorRecord, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, url: &str, record: &ErrorRecord) -> SendResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), record.clone(), Instant::now()));

        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(SendError::server_error(503, "unavailable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<ErrorRecord>>,
    identities: Mutex<Vec<String>>,
    tags: Mutex<Vec<BTreeMap<String, String>>>,
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, record: &ErrorRecord) -> SendResult<()> {
        self.delivered.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn identify(&self, user_id: &str, _info: Option<&Map<String, Value>>) {
        self.identities.lock().unwrap().push(user_id.to_string());
    }

    fn set_tags(&self, tags: &BTreeMap<String, String>) {
        self.tags.lock().unwrap().push(tags.clone());
    }
}

fn test_config() -> MonitorConfig {
    MonitorConfig::merged(
        MonitorOverrides::builder()
            .enable_console_logging(true)
            .max_retries(2)
            .batch_size(5)
            .flush_interval_ms(0)
            .remote_endpoint(ENDPOINT)
            .build(),
    )
}

fn monitor_with(config: MonitorConfig, transport: Arc<dyn Transport>) -> ErrorMonitor {
    ErrorMonitor::new(
        config,
        MonitorDeps::builder()
            .environment(Arc::new(FixedEnvironment::default()))
            .transport(transport)
            .build(),
    )
    .unwrap()
}

fn test_error(message: &str) -> CapturedError {
    CapturedError::structured("Error", message)
}

#[tokio::test(start_paused = true)]
async fn critical_error_is_posted_immediately() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        flush_interval_ms: 1000,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ENDPOINT);
    assert_eq!(calls[0].1.severity, Severity::Critical);

    let body = serde_json::to_value(&calls[0].1).unwrap();
    assert_eq!(body["severity"], json!("critical"));
    assert_eq!(body["errorType"], json!("Error"));
    assert_eq!(body["url"], json!("http://localhost:4200/test"));
    assert_eq!(body["userAgent"], json!("Test User Agent"));

    // the critical record also stays queued for the next flush
    assert_eq!(monitor.queued(), 1);
    monitor.destroy();
}

#[tokio::test(start_paused = true)]
async fn non_critical_errors_wait_for_the_batch() {
    let transport = Arc::new(RecordingTransport::default());
    let monitor = monitor_with(test_config(), transport.clone());

    monitor.report_error(test_error("Network timeout occurred"), None);
    monitor.report_error(test_error("Unauthorized access"), None);
    monitor.report_error(test_error("Resource not found"), None);
    monitor.drain().await;

    assert_eq!(transport.count(), 0);
    assert_eq!(monitor.queued(), 3);

    let severities: Vec<Severity> = monitor
        .queued_records()
        .iter()
        .map(|record| record.severity)
        .collect();
    assert_eq!(
        severities,
        vec![Severity::Warning, Severity::Error, Severity::Info]
    );
}

#[tokio::test(start_paused = true)]
async fn reaching_batch_size_flushes_the_queue() {
    let transport = Arc::new(RecordingTransport::default());
    let monitor = monitor_with(test_config(), transport.clone());

    for i in 0..4 {
        monitor.report_error(test_error(&format!("network glitch {i}")), None);
    }
    assert_eq!(monitor.queued(), 4);

    monitor.report_error(test_error("network glitch 4"), None);
    assert_eq!(monitor.queued(), 0);

    monitor.drain().await;
    assert_eq!(transport.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn flush_on_empty_queue_is_a_no_op() {
    let transport = Arc::new(RecordingTransport::default());
    let monitor = monitor_with(test_config(), transport.clone());

    monitor.flush();
    monitor.drain().await;

    assert_eq!(transport.count(), 0);
    assert_eq!(monitor.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_is_retried_with_exponential_backoff() {
    let transport = Arc::new(RecordingTransport::failing_first(usize::MAX));
    let monitor = monitor_with(test_config(), transport.clone());

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].2 - calls[0].2, Duration::from_secs(1));
    assert_eq!(calls[2].2 - calls[1].2, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn retry_stops_after_first_success() {
    let transport = Arc::new(RecordingTransport::failing_first(1));
    let monitor = monitor_with(test_config(), transport.clone());

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_make_exactly_max_retries_plus_one_attempts() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let mut transport = MockTransport::new();
    transport
        .expect_post()
        .times(4)
        .returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SendError::server_error(500, "boom".to_string()))
        });

    let config = MonitorConfig {
        max_retries: 3,
        ..test_config()
    };
    let monitor = monitor_with(config, Arc::new(transport));

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_a_single_attempt() {
    let transport = Arc::new(RecordingTransport::failing_first(usize::MAX));
    let config = MonitorConfig {
        max_retries: 0,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(transport.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn periodic_timer_flushes_the_queue() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        flush_interval_ms: 1000,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    monitor.report_error(test_error("network down"), None);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(monitor.queued(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.queued(), 0);

    monitor.drain().await;
    assert_eq!(transport.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rearming_replaces_the_previous_timer() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        flush_interval_ms: 1000,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    tokio::time::sleep(Duration::from_millis(600)).await;
    monitor.rearm_flush_timer();
    monitor.report_error(test_error("network down"), None);

    // the first timer would have fired at 1000ms
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(monitor.queued(), 1);

    // the re-armed timer fires at 1600ms
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(monitor.queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn destroy_flushes_once_and_is_idempotent() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        flush_interval_ms: 1000,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    monitor.report_error(test_error("network down"), None);
    monitor.report_error(test_error("timeout on save"), None);

    monitor.destroy();
    monitor.destroy();
    monitor.drain().await;

    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert_eq!(monitor.queued(), 0);
    assert_eq!(transport.count(), 2);

    // no timer is left to fire
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn reports_after_destroy_are_ignored() {
    let transport = Arc::new(RecordingTransport::default());
    let monitor = monitor_with(test_config(), transport.clone());

    monitor.destroy();
    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(monitor.queued(), 0);
    assert_eq!(transport.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_logging_disabled_sends_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        enable_remote_logging: false,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());

    monitor.report_error(test_error("Test error"), None);
    monitor.flush();
    monitor.drain().await;

    assert_eq!(transport.count(), 0);
    assert_eq!(monitor.queued(), 0);
}

#[tokio::test]
async fn missing_endpoint_skips_remote_delivery() {
    let config = MonitorConfig {
        remote_endpoint: None,
        ..test_config()
    };
    let monitor = ErrorMonitor::new(config, MonitorDeps::default()).unwrap();

    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(monitor.in_flight(), 0);
}

#[tokio::test]
async fn user_context_is_attached_to_later_records() {
    let transport = Arc::new(RecordingTransport::default());
    let monitor = monitor_with(test_config(), transport);

    let info = json!({ "name": "John" });
    monitor.set_user_context("user123", info.as_object());
    monitor.set_tags(&BTreeMap::from([("tenant".to_string(), "acme".to_string())]));
    monitor.report_error(test_error("network x"), None);

    let record = &monitor.queued_records()[0];
    assert_eq!(record.user_id.as_deref(), Some("user123"));
    assert_eq!(record.tags.get("tenant").map(String::as_str), Some("acme"));
}

#[tokio::test]
async fn anonymous_user_by_default() {
    let monitor = monitor_with(test_config(), Arc::new(RecordingTransport::default()));
    monitor.report_error(test_error("network x"), None);

    assert_eq!(
        monitor.queued_records()[0].user_id.as_deref(),
        Some("anonymous")
    );
}

#[tokio::test]
async fn absent_and_string_errors_are_normalised() {
    let monitor = monitor_with(test_config(), Arc::new(RecordingTransport::default()));

    monitor.report_error(CapturedError::Absent, None);
    monitor.report_error(Option::<String>::None, None);
    monitor.report_error("plain string error", None);

    let records = monitor.queued_records();
    assert_eq!(records[0].message, "Unknown error occurred");
    assert_eq!(records[0].stack_trace, "No stack trace available");
    assert_eq!(records[1].message, "Unknown error occurred");
    assert_eq!(records[2].message, "plain string error");
    assert_eq!(records[2].error_kind, "Unknown");
    assert_eq!(records[2].fingerprint, "Unknown-plain_string_error");
}

#[tokio::test]
async fn fingerprint_ignores_context_and_time() {
    let monitor = monitor_with(test_config(), Arc::new(RecordingTransport::default()));

    monitor.report_error(test_error("network lost"), None);
    monitor.report_error(
        test_error("network lost"),
        json!({ "action": "button-click" }).as_object().cloned(),
    );

    let records = monitor.queued_records();
    assert_eq!(records[0].fingerprint, records[1].fingerprint);
    assert_eq!(records[1].context.as_ref().unwrap()["action"], json!("button-click"));
}

#[tokio::test]
async fn session_id_is_shared_by_all_records() {
    let monitor = monitor_with(test_config(), Arc::new(RecordingTransport::default()));

    monitor.report_error(test_error("network a"), None);
    monitor.report_error(test_error("network b"), None);

    let records = monitor.queued_records();
    assert!(records[0].session_id.starts_with("session_"));
    assert_eq!(records[0].session_id, records[1].session_id);
}

#[tokio::test]
async fn broken_storage_never_reaches_the_caller() {
    let monitor = ErrorMonitor::new(
        test_config(),
        MonitorDeps::builder()
            .environment(Arc::new(FixedEnvironment::default()))
            .local_store(Arc::new(MemoryStore::disabled()))
            .session_store(Arc::new(MemoryStore::disabled()))
            .transport(Arc::new(RecordingTransport::default()))
            .build(),
    )
    .unwrap();

    monitor.set_user_context("user123", None);
    monitor.set_tags(&BTreeMap::new());
    monitor.report_error(test_error("network x"), None);

    let record = &monitor.queued_records()[0];
    assert_eq!(record.user_id.as_deref(), Some("anonymous"));
    assert!(record.tags.is_empty());
}

#[tokio::test]
async fn extra_sinks_receive_records_and_identity() {
    let sink = Arc::new(RecordingSink::default());
    let config = MonitorConfig {
        remote_endpoint: None,
        ..test_config()
    };
    let monitor = ErrorMonitor::new(
        config,
        MonitorDeps::builder()
            .extra_sinks(vec![sink.clone() as Arc<dyn Sink>])
            .build(),
    )
    .unwrap();

    monitor.set_user_context("user123", None);
    monitor.set_tags(&BTreeMap::from([("env".to_string(), "qa".to_string())]));
    monitor.report_error(test_error("Test error"), None);
    monitor.drain().await;

    assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    assert_eq!(*sink.identities.lock().unwrap(), vec!["user123".to_string()]);
    assert_eq!(sink.tags.lock().unwrap()[0]["env"], "qa");
}

#[tokio::test]
async fn zero_batch_size_is_clamped() {
    let transport = Arc::new(RecordingTransport::default());
    let config = MonitorConfig {
        batch_size: 0,
        ..test_config()
    };
    let monitor = monitor_with(config, transport.clone());
    assert_eq!(monitor.config().batch_size, 1);

    monitor.report_error(test_error("network x"), None);
    monitor.drain().await;

    assert_eq!(monitor.queued(), 0);
    assert_eq!(transport.count(), 1);
}

#[test]
fn construction_requires_a_runtime() {
    let result = ErrorMonitor::new(test_config(), MonitorDeps::default());
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn overlapping_drains_both_complete() {
    let transport = Arc::new(RecordingTransport::failing_first(2));
    let monitor = monitor_with(test_config(), transport.clone());
    let other = monitor.clone();

    monitor.report_error(test_error("Test error"), None);

    let (first, second) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(60), monitor.drain()),
        tokio::time::timeout(Duration::from_secs(60), other.drain()),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(transport.count(), 3);
    assert_eq!(monitor.in_flight(), 0);
}
