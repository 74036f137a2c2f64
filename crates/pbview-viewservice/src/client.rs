//! HTTP client for the view service

use crate::http::{PingArgs, ViewReply};
use pbview_core::{ClientConfig, PbViewError, Result, ServerId, View, ViewNumber};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;

/// Client used by replicas and by the replicated service's clients
#[derive(Clone, Debug)]
pub struct ViewClient {
    client: Client,
    server_addr: SocketAddr,
}

impl ViewClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PbViewError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            server_addr: config.server_addr,
        })
    }

    /// Connect to `server_addr` with default settings
    pub fn connect(server_addr: SocketAddr) -> Result<Self> {
        Self::new(&ClientConfig {
            server_addr,
            ..Default::default()
        })
    }

    /// Build URL for an endpoint
    fn url(&self, endpoint: &str) -> String {
        format!("http://{}/{}", self.server_addr, endpoint)
    }

    /// Report liveness as `me`, running `viewnum`
    pub async fn ping(&self, me: &ServerId, viewnum: ViewNumber) -> Result<View> {
        let args = PingArgs {
            me: me.clone(),
            viewnum,
        };
        let request = self.client.post(self.url("ping")).json(&args);
        let reply: ViewReply = self.send(request).await?;
        Ok(reply.view)
    }

    /// Fetch the current view
    pub async fn get(&self) -> Result<View> {
        let request = self.client.get(self.url("view"));
        let reply: ViewReply = self.send(request).await?;
        Ok(reply.view)
    }

    /// Current primary, or `None` if there is none or the service is unreachable
    pub async fn primary(&self) -> Option<ServerId> {
        match self.get().await {
            Ok(view) => view.primary,
            Err(e) => {
                tracing::debug!(error = %e, "could not fetch view");
                None
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PbViewError::UnexpectedStatus { status, body });
        }

        response.json().await.map_err(|e| self.map_error(e))
    }

    fn map_error(&self, err: reqwest::Error) -> PbViewError {
        if err.is_timeout() {
            PbViewError::Timeout
        } else if err.is_decode() {
            PbViewError::Serialization(err.to_string())
        } else {
            PbViewError::ConnectionFailed(format!("{}: {err}", self.server_addr))
        }
    }
}
