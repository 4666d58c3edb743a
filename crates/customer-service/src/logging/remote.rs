//! Best-effort batched export of log events to a remote HTTP sink

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Target of the sink's own diagnostics; these stay on the console
pub const SINK_TARGET: &str = "log_sink";

/// Remote sink configuration
#[derive(Debug, Clone)]
pub struct RemoteSinkConfig {
    /// Endpoint receiving a JSON array of events per POST
    pub endpoint: String,

    /// Events per batch
    pub batch_size: usize,

    /// Maximum time an event waits for its batch
    pub flush_interval: Duration,

    /// Events buffered between request tasks and the exporter
    pub queue_capacity: usize,

    /// Per-delivery HTTP timeout
    pub request_timeout: Duration,
}

impl RemoteSinkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            batch_size: 50,
            flush_interval: Duration::from_secs(2),
            queue_capacity: 10_000,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the background exporter.
///
/// `send` never blocks and never fails: when the queue is full the event is
/// dropped and counted. Delivery is at-most-once; a batch that cannot be
/// delivered is discarded.
#[derive(Clone)]
pub struct RemoteSink {
    tx: mpsc::Sender<Map<String, Value>>,
    dropped: Arc<AtomicU64>,
}

impl RemoteSink {
    /// Spawn the exporter task. Must be called from within a Tokio runtime.
    pub fn spawn(config: RemoteSinkConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        tokio::spawn(run(rx, client, config, dropped.clone()));

        Self { tx, dropped }
    }

    /// Queue an event for export
    pub fn send(&self, event: Map<String, Value>) {
        if self.tx.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events dropped so far because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn run(
    mut rx: mpsc::Receiver<Map<String, Value>>,
    client: reqwest::Client,
    config: RemoteSinkConfig,
    dropped: Arc<AtomicU64>,
) {
    let batch_size = config.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut reported_drops = 0;

    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(event) => {
                    batch.push(Value::Object(event));
                    if batch.len() >= batch_size {
                        flush(&client, &config.endpoint, &mut batch).await;
                    }
                }
                None => {
                    flush(&client, &config.endpoint, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                let total = dropped.load(Ordering::Relaxed);
                if total > reported_drops {
                    warn!(
                        target: SINK_TARGET,
                        dropped = total - reported_drops,
                        "Log sink queue full; events dropped"
                    );
                    reported_drops = total;
                }
                flush(&client, &config.endpoint, &mut batch).await;
            }
        }
    }
}

async fn flush(client: &reqwest::Client, endpoint: &str, batch: &mut Vec<Value>) {
    if batch.is_empty() {
        return;
    }

    let events = std::mem::take(batch);
    let count = events.len();

    match client.post(endpoint).json(&events).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(target: SINK_TARGET, count, "Delivered log batch");
        }
        Ok(response) => {
            warn!(
                target: SINK_TARGET,
                count,
                status = response.status().as_u16(),
                "Log sink rejected batch; dropping it"
            );
        }
        Err(e) => {
            warn!(
                target: SINK_TARGET,
                count,
                error = %e,
                "Log sink unreachable; dropping batch"
            );
        }
    }
}
