//! Server-sent events subscription to the recent-changes feed.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Incremental decoder: feed raw body chunks, get complete events back.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(position) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..position + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..position])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_block(&String::from_utf8_lossy(&rest))
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut seen_field = false;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data_lines.push(value),
            "event" => event.event = Some(value.to_string()),
            "id" => event.id = Some(value.to_string()),
            "retry" => event.retry = value.trim().parse().ok(),
            _ => continue,
        }
        seen_field = true;
    }

    if !seen_field {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

#[derive(Debug, Clone)]
pub struct StreamWatcherConfig {
    pub url: String,
    pub user_agent: String,
    pub reconnect_delay: Duration,
}

/// Long-lived subscription that reconnects on its own, resuming from the
/// last seen event id.
pub struct StreamWatcher {
    http: Client,
    config: StreamWatcherConfig,
    last_event_id: Option<String>,
    /// Floor for server `retry:` hints; the configured delay.
    min_reconnect_delay: Duration,
}

impl StreamWatcher {
    pub fn new(config: StreamWatcherConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("failed to build event stream HTTP client")?;
        Ok(Self {
            http,
            min_reconnect_delay: config.reconnect_delay,
            config,
            last_event_id: None,
        })
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Hand every message's data to `on_message`. Runs until `on_message`
    /// fails; transport errors only cause a reconnect.
    pub async fn run<F, Fut>(&mut self, mut on_message: F) -> Result<()>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        loop {
            info!(url = %self.config.url, "connecting to event stream");
            match self.open().await {
                Ok(response) => {
                    info!("opened connection and watching for changes");
                    self.consume(response, &mut on_message).await?;
                }
                Err(error) => error!(error = %format!("{error:#}"), "event stream error"),
            }
            debug!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "reconnecting to event stream"
            );
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn open(&self) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .get(&self.config.url)
            .header("Accept", "text/event-stream")
            .header("User-Agent", self.config.user_agent.clone());
        if let Some(id) = &self.last_event_id {
            request = request.header("Last-Event-ID", id.clone());
        }
        let response = request
            .send()
            .await
            .context("event stream request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("event stream returned HTTP {status}");
        }
        Ok(response)
    }

    async fn consume<F, Fut>(&mut self, response: reqwest::Response, on_message: &mut F) -> Result<()>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut decoder = SseDecoder::new();
        let body = response.bytes_stream();
        tokio::pin!(body);

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    error!(error = %error, "event stream error");
                    return Ok(());
                }
            };
            for event in decoder.push(&chunk) {
                self.deliver(event, on_message).await?;
            }
        }
        if let Some(event) = decoder.finish() {
            self.deliver(event, on_message).await?;
        }
        warn!("event stream closed by the server");
        Ok(())
    }

    async fn deliver<F, Fut>(&mut self, event: SseEvent, on_message: &mut F) -> Result<()>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if let Some(id) = event.id {
            self.last_event_id = Some(id);
        }
        if let Some(retry) = event.retry {
            self.config.reconnect_delay =
                Duration::from_millis(retry).max(self.min_reconnect_delay);
        }
        if event.data.is_empty() {
            return Ok(());
        }
        on_message(event.data).await
    }
}
