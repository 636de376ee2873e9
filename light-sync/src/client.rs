#![doc = "HTTP client for the Light server: bridges the core's Authenticator and RemoteSink traits to the JSON-RPC style endpoint."]
//
//! # Light server client (CLI <-> Core)
//!
//! Every call is a `POST {url}/api/rs` carrying an envelope
//! `{category, name, readOnly, data}`. [`LightClient`] signs in with
//! `user/signInUser`; the returned [`LightSession`] carries the bearer token
//! and implements [`RemoteSink`] with `getPageMap`/`getRuleMap` for reads and
//! `impPage`/`impRule` for upserts.
//!
//! Status mapping: 401 and 403 are [`SinkError::Unauthorized`], any other
//! non-2xx is [`SinkError::Status`], transport failures and timeouts are
//! [`SinkError::Network`], and undecodable bodies are [`SinkError::Parse`].

use std::time::Duration;

use async_trait::async_trait;
use light_sync_core::remote::{Authenticator, ContentMap, RemoteSink, Token};
use light_sync_core::{ArtifactKind, SinkError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SERVICE_PATH: &str = "/api/rs";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    category: &'a str,
    name: &'a str,
    read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LightClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LightClient {
    /// Build a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Network(e.to_string()))?;
        let endpoint = format!("{}{SERVICE_PATH}", base_url.trim_end_matches('/'));
        tracing::info!(
            endpoint = %endpoint,
            timeout_ms = timeout.as_millis() as u64,
            "Initialized LightClient"
        );
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        envelope: &Envelope<'_>,
        token: Option<&Token>,
    ) -> Result<String, SinkError> {
        let mut request = self.http.post(&self.endpoint).json(envelope);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, service = envelope.name, "Request to Light server failed");
            SinkError::Network(e.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::error!(
                status = status.as_u16(),
                service = envelope.name,
                "Light server rejected credentials"
            );
            return Err(SinkError::Unauthorized(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                service = envelope.name,
                body = %body,
                "Light server returned an error status"
            );
            return Err(SinkError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Authenticator for LightClient {
    async fn login(
        &self,
        user: &str,
        password: &str,
        client_id: &str,
    ) -> Result<Token, SinkError> {
        tracing::info!(user, client_id, "Signing in to Light server");
        let envelope = Envelope {
            category: "user",
            name: "signInUser",
            read_only: false,
            data: Some(json!({
                "userIdEmail": user,
                "password": password,
                "rememberMe": true,
                "clientId": client_id,
            })),
        };
        let body = self.call(&envelope, None).await?;
        let parsed: SignInResponse =
            serde_json::from_str(&body).map_err(|e| SinkError::Parse(e.to_string()))?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                tracing::info!(user, "Signed in");
                Ok(Token::new(token))
            }
            _ => Err(SinkError::Unauthorized(
                "sign-in response carried no accessToken".to_string(),
            )),
        }
    }
}

/// A signed-in client. One session serves the whole run; the token is never refreshed.
#[derive(Debug, Clone)]
pub struct LightSession {
    client: LightClient,
    token: Token,
}

impl LightSession {
    pub fn new(client: LightClient, token: Token) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl RemoteSink for LightSession {
    async fn fetch_content_map(&self, kind: ArtifactKind) -> Result<ContentMap, SinkError> {
        let envelope = Envelope {
            category: kind.category(),
            name: kind.map_operation(),
            read_only: true,
            data: None,
        };
        let body = self.client.call(&envelope, Some(&self.token)).await?;
        let map: ContentMap =
            serde_json::from_str(&body).map_err(|e| SinkError::Parse(e.to_string()))?;
        tracing::debug!(%kind, entries = map.len(), "Fetched remote content map");
        Ok(map)
    }

    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        content: &str,
    ) -> Result<(), SinkError> {
        let (id_field, content_field) = kind.payload_fields();
        let mut data = serde_json::Map::new();
        data.insert(id_field.to_string(), Value::from(id));
        data.insert(content_field.to_string(), Value::from(content));
        let envelope = Envelope {
            category: kind.category(),
            name: kind.upsert_operation(),
            read_only: false,
            data: Some(Value::Object(data)),
        };
        self.client.call(&envelope, Some(&self.token)).await?;
        Ok(())
    }
}
