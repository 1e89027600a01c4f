//! Action dispatch transport.

use async_trait::async_trait;
use state_protocol_types::{ActionRequest, ActionResponse, CSRF_HEADER, SESSION_HEADER};
use tracing::debug;
use url::Url;

use crate::{ClientError, ClientResult};

/// Sends one action request and returns the server's response.
#[async_trait]
pub trait ActionTransport: Send + Sync {
    async fn send(&self, request: &ActionRequest) -> ClientResult<ActionResponse>;
}

/// JSON POST to the action endpoint with CSRF and session headers.
///
/// Timeouts are whatever the supplied `reqwest::Client` enforces.
#[derive(Debug, Clone)]
pub struct HttpActionTransport {
    client: reqwest::Client,
    endpoint: Url,
    csrf_token: String,
    session_id: String,
}

impl HttpActionTransport {
    pub fn new(
        endpoint: Url,
        csrf_token: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, csrf_token, session_id)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: Url,
        csrf_token: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            csrf_token: csrf_token.into(),
            session_id: session_id.into(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ActionTransport for HttpActionTransport {
    async fn send(&self, request: &ActionRequest) -> ClientResult<ActionResponse> {
        debug!(state = %request.state, action = %request.action, "Dispatching action");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CSRF_HEADER, &self.csrf_token)
            .header(SESSION_HEADER, &self.session_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Error statuses still carry a usable `{success:false, error}` body.
        match serde_json::from_str::<ActionResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                Err(ClientError::Transport(format!("HTTP {}", status)))
            }
            Err(e) => Err(ClientError::Parse(e.to_string())),
        }
    }
}
