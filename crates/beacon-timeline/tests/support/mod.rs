// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 beacon contributors

//! Minimal recording HTTP backend for pipeline tests.
//!
//! Accepts connections on an ephemeral port, parses one request at a
//! time (keep-alive supported), records it, and answers every request
//! with the configured status and an empty body.

use beacon_timeline::Backend;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One request as received by the backend.
#[derive(Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// A test HTTP server recording everything it receives.
pub struct TestBackend {
    port: u16,
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
    accept_task: JoinHandle<()>,
}

impl TestBackend {
    /// Bind an ephemeral port and answer every request with `status`.
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
        let port = listener.local_addr().expect("local addr").port();
        let (tx, requests) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, status, tx).await;
                });
            }
        });

        Self {
            port,
            requests,
            accept_task,
        }
    }

    /// Backend address for a pipeline manager.
    pub fn backend(&self) -> Backend {
        Backend::new("127.0.0.1", self.port)
    }

    /// Wait up to `wait` for the next recorded request.
    pub async fn next_request(&mut self, wait: Duration) -> Option<RecordedRequest> {
        tokio::time::timeout(wait, self.requests.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn stop(self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    stream: TcpStream,
    status: u16,
    tx: mpsc::UnboundedSender<RecordedRequest>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().to_string();
                if name == "content-length" {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.insert(name, value);
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;

        let _ = tx.send(RecordedRequest {
            method,
            path,
            headers,
            body,
        });

        let response = format!("HTTP/1.1 {status} OK\r\ncontent-length: 0\r\n\r\n");
        reader.get_mut().write_all(response.as_bytes()).await?;
    }
}
