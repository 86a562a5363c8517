//! AWS Comprehend `DetectPiiEntities` redaction.
//!
//! Comprehend returns entity offsets rather than transformed text, so the
//! adapter signs the request itself (SigV4 over the standard `AWS_*`
//! environment credentials) and substitutes the reported spans locally.

use crate::config::{ComprehendConfig, EntitySpan, PlaceholderStyle};
use crate::error::ProviderError;
use crate::redactor::{apply_placeholders, Redactor};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "comprehend";
const TARGET: &str = "Comprehend_20171127.DetectPiiEntities";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Standard AWS environment credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self, ProviderError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ProviderError::MissingCredentials("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ProviderError::MissingCredentials("AWS_SECRET_ACCESS_KEY"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

#[derive(Debug, Serialize)]
struct DetectPiiRequest<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
    #[serde(rename = "LanguageCode")]
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectPiiResponse {
    #[serde(rename = "Entities", default)]
    entities: Vec<PiiEntity>,
}

#[derive(Debug, Deserialize)]
struct PiiEntity {
    #[serde(rename = "BeginOffset")]
    begin_offset: usize,
    #[serde(rename = "EndOffset")]
    end_offset: usize,
    #[serde(rename = "Type")]
    entity_type: String,
    #[serde(rename = "Score", default)]
    score: f64,
}

pub struct ComprehendRedactor {
    client: Client,
    config: ComprehendConfig,
    credentials: AwsCredentials,
    region: String,
    style: PlaceholderStyle,
}

impl ComprehendRedactor {
    pub fn new(
        config: ComprehendConfig,
        credentials: AwsCredentials,
        style: PlaceholderStyle,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let region = std::env::var("AWS_REGION")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| config.region.clone());

        Ok(Self {
            client,
            config,
            credentials,
            region,
            style,
        })
    }

    fn endpoint(&self) -> String {
        self.config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.{}.amazonaws.com", SERVICE, self.region))
    }

    /// SigV4 headers for a POST of `body` to the service root.
    fn signed_headers(
        &self,
        host: &str,
        amz_date: &str,
        date_stamp: &str,
        body: &str,
    ) -> Vec<(String, String)> {
        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        let mut headers = vec![
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), host.to_string()),
            ("x-amz-date".to_string(), amz_date.to_string()),
            ("x-amz-target".to_string(), TARGET.to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();
        let signed_header_names = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "POST\n/\n\n{}\n{}\n{}",
            canonical_headers, signed_header_names, payload_hash
        );

        let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id, credential_scope, signed_header_names, signature
        );

        headers.push(("authorization".to_string(), authorization));
        headers
    }

    fn to_spans(&self, entities: Vec<PiiEntity>, text: &str) -> Vec<EntitySpan> {
        let mut spans = Vec::new();
        for entity in entities {
            // Comprehend counts characters, not bytes
            match char_range_to_byte_range(text, entity.begin_offset, entity.end_offset) {
                Some((start, end)) => spans.push(EntitySpan {
                    entity_type: entity.entity_type,
                    start,
                    end,
                    confidence: entity.score,
                }),
                None => warn!(
                    "Dropping Comprehend entity '{}' with offsets {}..{}",
                    entity.entity_type, entity.begin_offset, entity.end_offset
                ),
            }
        }
        spans
    }
}

#[async_trait]
impl Redactor for ComprehendRedactor {
    fn name(&self) -> &'static str {
        "comprehend"
    }

    async fn redact(&self, text: &str) -> Result<String, ProviderError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        let endpoint = self.endpoint();
        let url: reqwest::Url = endpoint
            .parse()
            .map_err(|e| ProviderError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProviderError::Config(format!(
                    "endpoint '{}' has no host",
                    endpoint
                )))
            }
        };

        let body = serde_json::to_string(&DetectPiiRequest {
            text,
            language_code: &self.config.language_code,
        })
        .map_err(|e| ProviderError::Config(format!("failed to encode request: {}", e)))?;

        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        debug!("Calling Comprehend {} at {}", TARGET, endpoint);

        let mut request = self.client.post(url).body(body.clone());
        for (name, value) in self.signed_headers(&host, &amz_date, &date_stamp, &body) {
            // reqwest supplies Host itself; it must stay out of the
            // explicit header map to avoid duplication
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: "comprehend",
                status,
                message,
            });
        }

        let detected: DetectPiiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: "comprehend",
                    detail: e.to_string(),
                })?;

        let spans = self.to_spans(detected.entities, text);
        info!("Comprehend returned {} PII entities", spans.len());
        Ok(apply_placeholders(text, spans, self.style))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Converts a character (Unicode scalar) range into a byte range.
fn char_range_to_byte_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    if start >= end {
        return None;
    }

    let mut byte_start = None;
    let mut byte_end = None;
    let mut char_count = 0;
    for (char_pos, (byte_pos, _)) in text.char_indices().enumerate() {
        if char_pos == start {
            byte_start = Some(byte_pos);
        }
        if char_pos == end {
            byte_end = Some(byte_pos);
            break;
        }
        char_count = char_pos + 1;
    }
    if byte_end.is_none() && end == char_count {
        byte_end = Some(text.len());
    }

    Some((byte_start?, byte_end?))
}
