//! Test utilities & fixtures.
//! Provides a scripted in-process queue server so client and poller tests
//! never touch the network beyond loopback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use smsgate::config::UpstreamConfig;

/// One scripted HTTP response.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl ScriptedResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    #[allow(dead_code)] // Not every test file exercises error statuses.
    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    #[allow(dead_code)]
    pub fn delayed(body: &str, delay: Duration) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: Some(delay),
        }
    }
}

/// Handle to a running scripted queue server.
pub struct QueueServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl QueueServer {
    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.base_url.clone(),
            path: "/getSMS".to_string(),
            timeout_seconds: 0,
        }
    }
}

/// Spawn a loopback HTTP server that answers each request with the next
/// scripted response, then repeats the last one once the script runs dry
/// (an empty script answers `{}` forever).
pub async fn spawn_queue_server(script: Vec<ScriptedResponse>) -> QueueServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let script = Arc::new(Mutex::new(VecDeque::from(script)));

    let hits_inner = hits.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let response = {
                let mut guard = script.lock().unwrap();
                if guard.len() > 1 {
                    guard.pop_front().unwrap()
                } else {
                    guard
                        .front()
                        .cloned()
                        .unwrap_or_else(|| ScriptedResponse::ok("{}"))
                }
            };
            hits_inner.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                // Drain the request head; we answer everything the same way.
                let mut buf = [0u8; 1024];
                let mut head = Vec::new();
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) => return,
                        Ok(n) => {
                            head.extend_from_slice(&buf[..n]);
                            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }
                if let Some(delay) = response.delay {
                    tokio::time::sleep(delay).await;
                }
                let reason = if response.status == 200 { "OK" } else { "Error" };
                let payload = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    reason,
                    response.body.len(),
                    response.body
                );
                let _ = socket.write_all(payload.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    QueueServer {
        base_url: format!("http://{}", addr),
        hits,
    }
}
