use std::future::Future;
use std::pin::Pin;

use snafu::{ResultExt, Snafu};

use crate::api::{ChatAnswer, ChatRequest, ChatTurn, SourceData, SourcePayload, SourceRef};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("chat request failed on `{stage}`: {source}"))]
    ChatTransport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat endpoint returned status {status}: {body}"))]
    ChatStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode chat response on `{stage}`: {source}"))]
    ChatDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("source request for '{object_id}' failed on `{stage}`: {source}"))]
    SourceTransport {
        stage: &'static str,
        object_id: String,
        source: reqwest::Error,
    },
    #[snafu(display("source endpoint returned status {status} for '{object_id}': {body}"))]
    SourceStatus {
        stage: &'static str,
        object_id: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode source payload for '{object_id}' on `{stage}`: {source}"))]
    SourceDecode {
        stage: &'static str,
        object_id: String,
        source: serde_json::Error,
    },
    #[snafu(display("source payload for '{object_id}' failed validation: {source}"))]
    SourceSchema {
        stage: &'static str,
        object_id: String,
        source: crate::api::SourceSchemaError,
    },
}

/// Where the QA backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    base_url: String,
}

impl BackendConfig {
    /// Normalizes the base URL so endpoint joining stays deterministic.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins an absolute endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        debug_assert!(path.starts_with('/'));
        format!("{}{}", self.base_url, path)
    }
}

/// Seam between the UI and the remote QA collaborator.
///
/// The production adapter is [`HttpBackend`]; tests substitute fakes.
pub trait QaBackend: Send + Sync {
    /// Sends the full ordered history and returns the assistant's answer.
    fn ask<'a>(&'a self, turns: Vec<ChatTurn>) -> BoxFuture<'a, BackendResult<ChatAnswer>>;

    /// Resolves one source reference into validated display data.
    fn resolve_source<'a>(&'a self, source: SourceRef) -> BoxFuture<'a, BackendResult<SourceData>>;
}

/// Reqwest-backed adapter for the two QA endpoints.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn post_chat(&self, turns: Vec<ChatTurn>) -> BackendResult<ChatAnswer> {
        let request = ChatRequest { messages: turns };
        let response = self
            .client
            .post(self.config.endpoint("/api/chat"))
            .json(&request)
            .send()
            .await
            .context(ChatTransportSnafu {
                stage: "send-chat-request",
            })?;

        let status = response.status();
        let body = response.text().await.context(ChatTransportSnafu {
            stage: "read-chat-response",
        })?;

        if !status.is_success() {
            return ChatStatusSnafu {
                stage: "chat-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        serde_json::from_str(&body).context(ChatDecodeSnafu {
            stage: "parse-chat-response",
        })
    }

    async fn post_source(&self, source: SourceRef) -> BackendResult<SourceData> {
        let response = self
            .client
            .post(self.config.endpoint("/api/sources"))
            .json(&source)
            .send()
            .await
            .context(SourceTransportSnafu {
                stage: "send-source-request",
                object_id: source.object_id.clone(),
            })?;

        let status = response.status();
        let body = response.text().await.context(SourceTransportSnafu {
            stage: "read-source-response",
            object_id: source.object_id.clone(),
        })?;

        if !status.is_success() {
            return SourceStatusSnafu {
                stage: "source-http-status",
                object_id: source.object_id,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let payload: SourcePayload = serde_json::from_str(&body).context(SourceDecodeSnafu {
            stage: "parse-source-payload",
            object_id: source.object_id.clone(),
        })?;

        SourceData::from_payload(&source.collection, payload).context(SourceSchemaSnafu {
            stage: "validate-source-payload",
            object_id: source.object_id,
        })
    }
}

impl QaBackend for HttpBackend {
    fn ask<'a>(&'a self, turns: Vec<ChatTurn>) -> BoxFuture<'a, BackendResult<ChatAnswer>> {
        Box::pin(async move {
            let turn_count = turns.len();
            let result = self.post_chat(turns).await;

            if let Err(error) = &result {
                tracing::warn!(turn_count, error = %error, "chat request failed");
            }

            result
        })
    }

    fn resolve_source<'a>(&'a self, source: SourceRef) -> BoxFuture<'a, BackendResult<SourceData>> {
        Box::pin(async move {
            let object_id = source.object_id.clone();
            let collection = source.collection.clone();
            let result = self.post_source(source).await;

            if let Err(error) = &result {
                tracing::warn!(
                    object_id = %object_id,
                    collection = %collection,
                    error = %error,
                    "source resolution failed"
                );
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_normalizes_trailing_slashes() {
        let config = BackendConfig::new("http://127.0.0.1:8000/");
        assert_eq!(config.base_url(), "http://127.0.0.1:8000");
        assert_eq!(
            config.endpoint("/api/chat"),
            "http://127.0.0.1:8000/api/chat"
        );

        let config = BackendConfig::new("  http://127.0.0.1:8000  ");
        assert_eq!(
            config.endpoint("/api/sources"),
            "http://127.0.0.1:8000/api/sources"
        );
    }
}
