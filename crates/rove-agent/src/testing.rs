//! Test doubles for code that talks to an LLM or the web
//!
//! [`ScriptedModel`] replays canned replies and records every request it
//! receives. [`StubServer`] is a tiny HTTP/1.1 server on a random local port
//! whose responses are chosen per request.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rove_core::{AssistantReply, ChatRequest, Result, RoveError, ToolCall};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::model::ChatModel;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`ChatModel`] that replays a script
///
/// Replies are returned in order. Once the script runs out the fallback reply
/// is returned forever, or an error if no fallback was set.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<AssistantReply>>>,
    fallback: Option<AssistantReply>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<AssistantReply>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    /// Script that may include failures
    pub fn with_results(results: Vec<Result<AssistantReply>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply used once the script is exhausted
    pub fn with_fallback(mut self, reply: AssistantReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply> {
        lock(&self.requests).push(request.clone());

        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }

        self.fallback
            .clone()
            .ok_or_else(|| RoveError::Other("scripted model has no more replies".to_string()))
    }
}

/// Assistant reply requesting one tool call
pub fn tool_call_reply(id: &str, name: &str, arguments: serde_json::Value) -> AssistantReply {
    AssistantReply::with_calls(vec![ToolCall::new(id, name, arguments.to_string())])
}

/// A request as seen by [`StubServer`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string
    pub path: String,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path without the query string
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

/// What [`StubServer`] does with one request
#[derive(Debug, Clone)]
pub enum StubResponse {
    Reply {
        status: u16,
        content_type: String,
        body: String,
    },
    /// Accept the request and never answer
    Hang,
}

impl StubResponse {
    pub fn status(status: u16) -> Self {
        Self::Reply {
            status,
            content_type: "text/plain".to_string(),
            body: String::new(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::Reply {
            status: 200,
            content_type: "text/plain".to_string(),
            body: body.into(),
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::Reply {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Reply {
            status,
            content_type: "application/json".to_string(),
            body: body.to_string(),
        }
    }
}

type Responder = dyn Fn(&RecordedRequest) -> StubResponse + Send + Sync;

/// Local HTTP server for exercising real clients
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start a server that answers each request with `responder`
    pub async fn start<F>(responder: F) -> std::io::Result<Self>
    where
        F: Fn(&RecordedRequest) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(socket, recorded, responder).await {
                        tracing::debug!("stub server connection error: {}", e);
                    }
                });
            }
        });

        Ok(Self {
            addr,
            requests,
            handle,
        })
    }

    /// Start a server that plays `responses` in order, repeating the last one
    pub async fn scripted(responses: Vec<StubResponse>) -> std::io::Result<Self> {
        let counter = AtomicUsize::new(0);
        let last = responses.len().saturating_sub(1);
        Self::start(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst).min(last);
            responses
                .get(n)
                .cloned()
                .unwrap_or_else(|| StubResponse::status(404))
        })
        .await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn hits(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Arc<Responder>,
) -> std::io::Result<()> {
    let Some(request) = read_request(&mut socket).await? else {
        return Ok(());
    };
    let response = responder(&request);
    let is_head = request.method.eq_ignore_ascii_case("HEAD");
    lock(&recorded).push(request);

    match response {
        StubResponse::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        StubResponse::Reply {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason_phrase(status),
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await?;
            if !is_head {
                socket.write_all(body.as_bytes()).await?;
            }
            socket.shutdown().await
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    }))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
