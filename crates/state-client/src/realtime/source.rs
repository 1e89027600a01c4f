//! Push stream connections.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use state_protocol_types::SESSION_HEADER;
use tracing::debug;
use url::Url;

use super::sse::{SseEvent, SseParser};
use crate::{ClientError, ClientResult};

/// One open push connection.
#[async_trait]
pub trait EventStream: Send {
    /// Next event, or `None` once the server closed the stream.
    async fn next_event(&mut self) -> ClientResult<Option<SseEvent>>;
}

/// Opens push connections for a set of channels.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, channels: &[String]) -> ClientResult<Box<dyn EventStream>>;
}

/// `text/event-stream` over HTTP, with channels in a `channels=a,b` query.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::Client,
    url: Url,
    session_id: Option<String>,
}

impl HttpEventSource {
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Stream URL for the given channels.
    pub fn stream_url(&self, channels: &[String]) -> Url {
        let mut url = self.url.clone();
        if !channels.is_empty() {
            url.query_pairs_mut()
                .append_pair("channels", &channels.join(","));
        }
        url
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self, channels: &[String]) -> ClientResult<Box<dyn EventStream>> {
        let url = self.stream_url(channels);
        debug!(url = %url, "Opening event stream");

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "Event stream returned HTTP {}",
                status
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(Box::new(HttpEventStream {
            body,
            parser: SseParser::new(),
            ready: VecDeque::new(),
        }))
    }
}

struct HttpEventStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: SseParser,
    ready: VecDeque<SseEvent>,
}

#[async_trait]
impl EventStream for HttpEventStream {
    async fn next_event(&mut self) -> ClientResult<Option<SseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.parser.push(&chunk)?),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}
