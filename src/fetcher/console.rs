//! HTTP fetcher for the console backend's `/api/chat*` routes.

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::types::{Conversation, ConversationId, Message};

use super::http::{build_client, status_to_error};
use super::SnapshotFetcher;

pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct ChatListResponse {
    #[serde(default)]
    chats: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
struct ChatDetailResponse {
    #[serde(rename = "ai_enabled")]
    enabled: Option<bool>,
    #[serde(default)]
    history: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ToggleResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    ai_enabled: Option<bool>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default = "default_ok")]
    ok: bool,
    error: Option<String>,
}

fn default_ok() -> bool {
    true
}

impl HttpFetcher {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SyncError::Configuration(format!("invalid base url '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Configuration(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url,
        })
    }

    /// Build `{base}/api/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    fn chat_url(&self, id: &ConversationId, action: Option<&str>) -> Url {
        match action {
            Some(action) => self.endpoint(&["chat", id.as_str(), action]),
            None => self.endpoint(&["chat", id.as_str()]),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        debug!(%url, "console GET");
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, SyncError> {
        debug!(%url, "console POST");
        let resp = self.client.post(url).json(body).send().await?;
        decode(resp).await
    }

    async fn chat_detail(&self, id: &ConversationId) -> Result<ChatDetailResponse, SyncError> {
        self.get_json(self.chat_url(id, None)).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SyncError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(status_to_error(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn ack_to_result(id: &ConversationId, ack: Ack) -> Result<(), SyncError> {
    if ack.ok {
        Ok(())
    } else {
        Err(SyncError::stale_write(
            id,
            ack.error.unwrap_or_else(|| "backend reported ok=false".into()),
        ))
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        let resp: ChatListResponse = self
            .get_json(self.endpoint(&["chats"]))
            .await
            .map_err(|e| e.into_fetch("conversation list"))?;
        Ok(resp.chats)
    }

    async fn get_history(&self, id: &ConversationId) -> Result<Vec<Message>, SyncError> {
        let detail = self
            .chat_detail(id)
            .await
            .map_err(|e| e.into_fetch(format!("history of {id}")))?;
        Ok(detail.history)
    }

    async fn get_flag(&self, id: &ConversationId) -> Result<bool, SyncError> {
        let detail = self
            .chat_detail(id)
            .await
            .map_err(|e| e.into_fetch(format!("flag of {id}")))?;
        detail
            .enabled
            .ok_or_else(|| SyncError::fetch(format!("flag of {id}"), "response has no ai_enabled"))
    }

    /// `/toggle` flips the stored value and ignores any body, so the current
    /// value is read first and the flip is only posted when it differs.
    async fn set_flag(&self, id: &ConversationId, enabled: bool) -> Result<(), SyncError> {
        let current = self
            .chat_detail(id)
            .await
            .map_err(|e| e.into_stale_write(id))?
            .enabled;
        if current == Some(enabled) {
            debug!(conversation = %id, enabled, "flag already at requested value");
            return Ok(());
        }

        let resp: ToggleResponse = self
            .post_json(self.chat_url(id, Some("toggle")), &serde_json::json!({}))
            .await
            .map_err(|e| e.into_stale_write(id))?;
        if !resp.ok {
            return Err(SyncError::stale_write(
                id,
                resp.error.unwrap_or_else(|| "backend reported ok=false".into()),
            ));
        }
        match resp.ai_enabled {
            Some(acknowledged) if acknowledged == enabled => Ok(()),
            Some(acknowledged) => Err(SyncError::stale_write(
                id,
                format!("requested ai_enabled={enabled}, backend now has {acknowledged}"),
            )),
            None => Err(SyncError::stale_write(id, "toggle response has no ai_enabled")),
        }
    }

    async fn append_outbound(&self, id: &ConversationId, text: &str) -> Result<(), SyncError> {
        let ack: Ack = self
            .post_json(self.chat_url(id, Some("send")), &SendRequest { text })
            .await
            .map_err(|e| e.into_stale_write(id))?;
        ack_to_result(id, ack)
    }

    async fn clear_history(&self, id: &ConversationId) -> Result<(), SyncError> {
        let ack: Ack = self
            .post_json(self.chat_url(id, Some("clear")), &serde_json::json!({}))
            .await
            .map_err(|e| e.into_stale_write(id))?;
        ack_to_result(id, ack)
    }
}
