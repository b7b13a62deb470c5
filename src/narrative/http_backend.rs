use super::{build_prompt, parse_narrative_response, NarrativeProvider, NarrativeResult, TopicContext};
use crate::backend::{BackendClient, BackendKind};
use crate::config::NarrativeConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Text { text: String },
    Output { output: String },
    Content { content: String },
}

impl GenerateResponse {
    fn into_text(self) -> String {
        match self {
            GenerateResponse::Text { text } => text,
            GenerateResponse::Output { output } => output,
            GenerateResponse::Content { content } => content,
        }
    }
}

/// Narrative provider served over HTTP (`POST /v1/generate`)
pub struct HttpNarrator {
    client: BackendClient,
    model_id: String,
}

impl HttpNarrator {
    pub fn new(config: &NarrativeConfig) -> Result<Self> {
        let client = BackendClient::new(
            BackendKind::Narrative,
            &config.url,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            model_id: config.model.clone(),
        })
    }
}

#[async_trait]
impl NarrativeProvider for HttpNarrator {
    async fn generate(&self, context: &TopicContext) -> Result<NarrativeResult> {
        let request = GenerateRequest {
            model: &self.model_id,
            prompt: build_prompt(context),
        };
        debug!(topic_id = %context.topic_id, "Requesting narrative");

        let response: GenerateResponse = self.client.post_json("/v1/generate", &request).await?;
        let text = response.into_text();
        if text.trim().is_empty() {
            return Err(Error::MalformedResponse("Narrative backend returned no text".to_string()));
        }
        parse_narrative_response(&text)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context() -> TopicContext {
        TopicContext {
            topic_id: "t1".to_string(),
            category: "tech".to_string(),
            article_count: 2,
            sources: vec!["Wire".to_string()],
            articles: vec![crate::narrative::ArticleDigest {
                title: "Chip shortage eases".to_string(),
                source: "Wire".to_string(),
                published_at: Utc::now(),
                description: Some("Supply recovers".to_string()),
            }],
            update: None,
        }
    }

    fn narrator(url: String) -> HttpNarrator {
        HttpNarrator::new(&NarrativeConfig {
            url,
            ..NarrativeConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "```json\n{\"title\": \"Chip supply recovers\", \"summary\": \"s\", \"key_insights\": [], \"confidence_score\": 90}\n```"
            })))
            .mount(&server)
            .await;

        let result = narrator(server.uri()).generate(&context()).await.unwrap();
        assert_eq!(result.title, "Chip supply recovers");
        assert_eq!(result.confidence_score, 90.0);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "no json here"})))
            .mount(&server)
            .await;

        let err = narrator(server.uri()).generate(&context()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
