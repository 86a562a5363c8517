//! Transformer NER integration for the local analyzer.
//!
//! Talks to a GLiNER-style model server running locally. The server owns the
//! model weights and loads them on its first prediction, so the first call
//! through this client pays the model-load latency.

use crate::config::{EntitySpan, NerConfig};
use crate::error::ProviderError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
    labels: Vec<String>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    entities: Vec<PredictedEntity>,
}

#[derive(Debug, Deserialize)]
struct PredictedEntity {
    label: String,
    text: String,
    #[serde(default)]
    start: usize,
    #[serde(default)]
    end: usize,
    #[serde(default = "default_score")]
    score: f64,
}

fn default_score() -> f64 {
    0.8
}

#[derive(Clone)]
pub struct NerClient {
    client: Client,
    config: NerConfig,
}

impl NerClient {
    pub fn new(config: NerConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Entity types the model covers, i.e. the mapped side of the label map.
    pub fn covered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.config.entity_mapping.values().cloned().collect();
        types.sort();
        types.dedup();
        types
    }

    pub async fn extract_entities(&self, text: &str) -> Result<Vec<EntitySpan>, ProviderError> {
        let mut labels: Vec<String> = self.config.entity_mapping.keys().cloned().collect();
        labels.sort();

        debug!(
            "Sending {} characters to NER server at {} (labels: {:?})",
            text.len(),
            self.config.endpoint,
            labels
        );

        let request = PredictRequest {
            text,
            labels,
            model: &self.config.model,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.config.endpoint))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: "ner",
                status,
                message,
            });
        }

        let predicted: PredictResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: "ner",
                    detail: e.to_string(),
                })?;

        let spans = self.to_spans(predicted.entities, text);
        info!("NER server returned {} usable entities", spans.len());
        Ok(spans)
    }

    fn to_spans(&self, entities: Vec<PredictedEntity>, original_text: &str) -> Vec<EntitySpan> {
        let mut spans = Vec::new();

        for entity in entities {
            let Some(entity_type) = self.config.entity_mapping.get(&entity.label) else {
                warn!("Skipping unmapped NER label '{}'", entity.label);
                continue;
            };

            let range = if span_matches(original_text, entity.start, entity.end, &entity.text) {
                Some((entity.start, entity.end))
            } else {
                // Model offsets drift for some tokenizers; fall back to the
                // first occurrence of the reported surface text.
                find_entity_position(original_text, &entity.text)
            };

            let Some((start, end)) = range else {
                warn!("Could not locate NER entity '{}' in text", entity.text);
                continue;
            };

            spans.push(EntitySpan {
                entity_type: entity_type.clone(),
                start,
                end,
                confidence: entity.score,
            });
        }

        spans
    }

    pub async fn health_check(&self) -> Result<bool, ProviderError> {
        debug!("Probing NER server at {}", self.config.endpoint);

        let response = self
            .client
            .get(format!("{}/health", self.config.endpoint))
            .send()
            .await?;

        let is_healthy = response.status().is_success();
        if is_healthy {
            info!("NER server health check passed");
        } else {
            warn!("NER server health check failed: {}", response.status());
        }

        Ok(is_healthy)
    }
}

fn span_matches(text: &str, start: usize, end: usize, expected: &str) -> bool {
    start < end
        && end <= text.len()
        && text.is_char_boundary(start)
        && text.is_char_boundary(end)
        && &text[start..end] == expected
}

fn find_entity_position(text: &str, entity_value: &str) -> Option<(usize, usize)> {
    if entity_value.is_empty() {
        return None;
    }
    text.find(entity_value)
        .map(|start| (start, start + entity_value.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn create_test_config() -> NerConfig {
        Config::default().ner
    }

    fn predicted(label: &str, text: &str, start: usize, end: usize, score: f64) -> PredictedEntity {
        PredictedEntity {
            label: label.to_string(),
            text: text.to_string(),
            start,
            end,
            score,
        }
    }

    #[test]
    fn test_covered_types() {
        let client = NerClient::new(create_test_config()).unwrap();
        let types = client.covered_types();
        assert_eq!(types, vec!["LOCATION", "ORGANIZATION", "PERSON"]);
    }

    #[test]
    fn test_to_spans_maps_labels() {
        let client = NerClient::new(create_test_config()).unwrap();
        let text = "Rafi Mor works at Microsoft";

        let spans = client.to_spans(
            vec![
                predicted("person", "Rafi Mor", 0, 8, 0.97),
                predicted("organization", "Microsoft", 18, 27, 0.92),
            ],
            text,
        );

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].entity_type, "PERSON");
        assert_eq!((spans[0].start, spans[0].end), (0, 8));
        assert_eq!(spans[1].entity_type, "ORGANIZATION");
        assert_eq!(spans[1].confidence, 0.92);
    }

    #[test]
    fn test_to_spans_skips_unmapped_label() {
        let client = NerClient::new(create_test_config()).unwrap();
        let spans = client.to_spans(vec![predicted("vehicle", "truck", 0, 5, 0.9)], "truck");
        assert!(spans.is_empty());
    }

    #[test]
    fn test_to_spans_recovers_bad_offsets() {
        let client = NerClient::new(create_test_config()).unwrap();
        let text = "I work with Rafi Mor daily";

        let spans = client.to_spans(vec![predicted("person", "Rafi Mor", 3, 9, 0.9)], text);

        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (12, 20));
    }

    #[test]
    fn test_to_spans_drops_unlocatable_entity() {
        let client = NerClient::new(create_test_config()).unwrap();
        let spans = client.to_spans(
            vec![predicted("person", "Nobody Here", 0, 0, 0.9)],
            "unrelated text",
        );
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_extract_entities_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "entities": [
                {"label": "person", "text": "Jane Doe", "start": 8, "end": 16, "score": 0.95}
            ]
        });
        let mock = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let mut config = create_test_config();
        config.endpoint = server.url();
        let client = NerClient::new(config).unwrap();

        let spans = client
            .extract_entities("Contact Jane Doe at jane@example.com")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].entity_type, "PERSON");
        assert_eq!((spans[0].start, spans[0].end), (8, 16));
    }

    #[tokio::test]
    async fn test_extract_entities_propagates_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict")
            .with_status(503)
            .with_body("model is still loading")
            .create_async()
            .await;

        let mut config = create_test_config();
        config.endpoint = server.url();
        let client = NerClient::new(config).unwrap();

        let err = client.extract_entities("some text").await.unwrap_err();
        match err {
            ProviderError::Api { provider, status, .. } => {
                assert_eq!(provider, "ner");
                assert_eq!(status, 503);
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let mut config = create_test_config();
        config.endpoint = server.url();
        let client = NerClient::new(config).unwrap();

        assert!(client.health_check().await.unwrap());
    }
}
