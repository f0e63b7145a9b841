//! Reference [`Transport`] implementation: every send primitive becomes
//! one JSON action POSTed to the connector webhook.  The connector owns
//! actual delivery, media resolution, and markup rendering.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use ir_domain::error::{Error, Result};
use ir_domain::transport::{Keyboard, MediaRef, MessageRef, PartyId, Transport};

pub struct WebhookTransport {
    http: reqwest::Client,
    url: String,
    credential: String,
}

impl WebhookTransport {
    pub fn new(url: String, credential: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            url,
            credential,
        })
    }

    /// One bounded call per send; never retried here.
    async fn post(&self, action: Value) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.credential)
            .json(&action)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "connector returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn media_action(
        action: &str,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Value {
        json!({
            "action": action,
            "to": to,
            "media": media,
            "caption": caption,
            "keyboard": keyboard,
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send_text(
        &self,
        to: PartyId,
        body: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.post(json!({
            "action": "send_text",
            "to": to,
            "body": body,
            "keyboard": keyboard,
        }))
        .await
    }

    async fn send_photo(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.post(Self::media_action("send_photo", to, media, caption, keyboard))
            .await
    }

    async fn send_video(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.post(Self::media_action("send_video", to, media, caption, keyboard))
            .await
    }

    async fn send_round_video(&self, to: PartyId, media: &MediaRef) -> Result<()> {
        self.post(json!({
            "action": "send_round_video",
            "to": to,
            "media": media,
        }))
        .await
    }

    async fn send_document(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.post(Self::media_action("send_document", to, media, caption, keyboard))
            .await
    }

    async fn send_voice(
        &self,
        to: PartyId,
        media: &MediaRef,
        caption: Option<&str>,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.post(Self::media_action("send_voice", to, media, caption, keyboard))
            .await
    }

    async fn clear_markup(&self, source: &MessageRef) -> Result<()> {
        self.post(json!({
            "action": "clear_markup",
            "scope": source.scope,
            "message_id": source.message_id,
        }))
        .await
    }
}
