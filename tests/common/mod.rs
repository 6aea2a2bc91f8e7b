//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batch_scorer::config::{BreakerConfig, OrchestratorConfig};
use batch_scorer::resilience::CircuitBreaker;
use batch_scorer::scoring::{
    BatchOrchestrator, NoopSink, PersistBatch, PersistenceSink, ResultCache, Score, ScoreItem,
    ScoreRequest, Scorer, ScorerError, SinkError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What the scripted scorer does for one item id.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(f64),
    Fail(String),
    Hang,
    Delay(Duration, f64),
}

/// Scorer whose answer per item id is scripted; everything else scores `default`.
pub struct ScriptedScorer {
    behaviors: Mutex<HashMap<String, Behavior>>,
    default: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl ScriptedScorer {
    pub fn new(default: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            default: Mutex::new(default),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(Behavior::Succeed(75.0))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::new(Behavior::Fail(message.to_string()))
    }

    pub fn script(&self, id: &str, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(id.to_string(), behavior);
    }

    pub fn set_default(&self, behavior: Behavior) {
        *self.default.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<Score, ScorerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&request.item.id)
            .cloned()
            .unwrap_or_else(|| self.default.lock().unwrap().clone());

        match behavior {
            Behavior::Succeed(score) => Ok(score_of(score)),
            Behavior::Fail(message) => Err(ScorerError::Other(message)),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(delay, score) => {
                tokio::time::sleep(delay).await;
                Ok(score_of(score))
            }
        }
    }
}

fn score_of(score: f64) -> Score {
    Score {
        score,
        reasons: vec!["matches budget".to_string(), "close to campus".to_string()],
        compromises: vec![],
    }
}

/// Sink that forwards every batch to a channel.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<PersistBatch>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PersistBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn persist(&self, batch: &PersistBatch) -> Result<(), SinkError> {
        let _ = self.tx.send(batch.clone());
        Ok(())
    }
}

/// Sink that reports every call and then fails.
pub struct FailingSink {
    tx: mpsc::UnboundedSender<usize>,
}

impl FailingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn persist(&self, batch: &PersistBatch) -> Result<(), SinkError> {
        let _ = self.tx.send(batch.items.len());
        Err(SinkError::Io(std::io::Error::other("database unavailable")))
    }
}

pub fn breaker_config(failure_threshold: u32, success_threshold: u32, cooldown_ms: u64) -> BreakerConfig {
    BreakerConfig {
        failure_threshold,
        success_threshold,
        cooldown_ms,
    }
}

pub fn orchestrator_with(
    config: OrchestratorConfig,
    breaker: BreakerConfig,
    scorer: Arc<dyn Scorer>,
    sink: Arc<dyn PersistenceSink>,
) -> BatchOrchestrator {
    BatchOrchestrator::new(
        config,
        CircuitBreaker::new(breaker).unwrap(),
        ResultCache::new(Duration::from_secs(3600)),
        scorer,
        sink,
    )
    .unwrap()
}

pub fn orchestrator(scorer: Arc<dyn Scorer>) -> BatchOrchestrator {
    orchestrator_with(
        OrchestratorConfig::default(),
        BreakerConfig::default(),
        scorer,
        Arc::new(NoopSink),
    )
}

pub fn items(ids: &[&str]) -> Vec<ScoreItem> {
    ids.iter()
        .map(|id| ScoreItem::new(*id).with_field("title", format!("Listing {id}")).with_field("price", 1200))
        .collect()
}

pub fn numbered_items(prefix: &str, n: usize) -> Vec<ScoreItem> {
    (0..n).map(|i| ScoreItem::new(format!("{prefix}-{i}"))).collect()
}

/// Read one HTTP/1.1 request (headers plus Content-Length body).
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a programmable scorer backend on an ephemeral port.
///
/// `f` receives the raw request text and returns (status, JSON body).
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
