//! Discussion collaborator notifications
//!
//! Community discussion threads live outside this crate. They are told when
//! a topic first gets a title and when a topic is merged away. Calls are
//! submitted as tracked background tasks, never awaited inline.

use crate::backend::{BackendClient, BackendKind};
use crate::config::DiscussionConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Topic events sent to the discussion collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiscussionEvent {
    TopicTitled {
        topic_id: String,
        category: String,
        title: String,
        summary: Option<String>,
    },
    TopicMerged {
        kept_topic_id: String,
        removed_topic_id: String,
        removed_discussion_id: Option<String>,
    },
}

/// Trait for discussion collaborators
#[async_trait]
pub trait DiscussionCollaborator: Send + Sync {
    /// A topic got its first title; may return the id of a new thread
    async fn topic_titled(&self, event: DiscussionEvent) -> Result<Option<String>>;

    /// A topic was merged into another; its thread should move or go away
    async fn topic_merged(&self, event: DiscussionEvent) -> Result<()>;
}

/// Collaborator that only logs events
pub struct LoggingDiscussions;

#[async_trait]
impl DiscussionCollaborator for LoggingDiscussions {
    async fn topic_titled(&self, event: DiscussionEvent) -> Result<Option<String>> {
        info!(?event, "Topic titled");
        Ok(None)
    }

    async fn topic_merged(&self, event: DiscussionEvent) -> Result<()> {
        info!(?event, "Topic merged");
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    discussion_id: Option<String>,
}

/// Collaborator that POSTs each event as JSON to a webhook
pub struct WebhookDiscussions {
    client: BackendClient,
}

impl WebhookDiscussions {
    pub fn new(url: &str) -> Result<Self> {
        let client = BackendClient::new(BackendKind::Discussion, url, Duration::from_secs(15))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DiscussionCollaborator for WebhookDiscussions {
    async fn topic_titled(&self, event: DiscussionEvent) -> Result<Option<String>> {
        let reply: WebhookReply = self.client.post_json("", &event).await?;
        Ok(reply.discussion_id)
    }

    async fn topic_merged(&self, event: DiscussionEvent) -> Result<()> {
        self.client.post("", &event).await
    }
}

/// Create the discussion collaborator based on configuration
pub fn create_discussions(config: &DiscussionConfig) -> Result<Arc<dyn DiscussionCollaborator>> {
    match config.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookDiscussions::new(url)?)),
        None => Ok(Arc::new(LoggingDiscussions)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_event_wire_format() {
        let event = DiscussionEvent::TopicMerged {
            kept_topic_id: "a".to_string(),
            removed_topic_id: "b".to_string(),
            removed_discussion_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "topic_merged");
        assert_eq!(json["kept_topic_id"], "a");
    }

    #[tokio::test]
    async fn test_webhook_returns_discussion_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/storyline"))
            .and(body_partial_json(serde_json::json!({"event": "topic_titled", "topic_id": "t1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"discussion_id": "d-42"})))
            .mount(&server)
            .await;

        let hooks = WebhookDiscussions::new(&format!("{}/hooks/storyline", server.uri())).unwrap();
        let id = hooks
            .topic_titled(DiscussionEvent::TopicTitled {
                topic_id: "t1".to_string(),
                category: "tech".to_string(),
                title: "Chips are back".to_string(),
                summary: None,
            })
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("d-42"));
    }

    #[tokio::test]
    async fn test_logging_collaborator_is_noop() {
        let id = LoggingDiscussions
            .topic_titled(DiscussionEvent::TopicTitled {
                topic_id: "t1".to_string(),
                category: "tech".to_string(),
                title: "x".to_string(),
                summary: None,
            })
            .await
            .unwrap();
        assert!(id.is_none());
    }
}
