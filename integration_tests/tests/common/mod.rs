use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const ERRORS_PATH: &str = "/api/errors";

#[derive(Clone, Default)]
struct ReceiverState {
    received: Arc<Mutex<Vec<Value>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
}

/// Collector endpoint accepting error records on an ephemeral port.
pub struct Receiver {
    addr: SocketAddr,
    state: ReceiverState,
    handle: JoinHandle<()>,
}

impl Receiver {
    pub async fn launch() -> anyhow::Result<Self> {
        Self::launch_failing(0).await
    }

    /// Answers the first `failures` requests with 503.
    pub async fn launch_failing(failures: usize) -> anyhow::Result<Self> {
        let state = ReceiverState {
            failures_left: Arc::new(AtomicUsize::new(failures)),
            ..Default::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .route(ERRORS_PATH, post(receive))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.addr, ERRORS_PATH)
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn receive(State(state): State<ReceiverState>, Json(body): Json<Value>) -> StatusCode {
    state.attempts.fetch_add(1, Ordering::SeqCst);

    let failing = state
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if failing {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    state.received.lock().unwrap().push(body);
    StatusCode::CREATED
}
