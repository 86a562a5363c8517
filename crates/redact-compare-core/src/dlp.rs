//! Google Cloud Sensitive Data Protection (DLP) redaction.
//!
//! Unlike the other variants, the DLP API performs the substitution itself:
//! the request carries a crypto-hash deidentify transformation and the
//! response already contains the redacted text.

use crate::config::DlpConfig;
use crate::error::ProviderError;
use crate::redactor::Redactor;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const TRANSIENT_KEY_NAME: &str = "dlp-generated-key";

/// Environment-provided project and OAuth bearer token
/// (e.g. `gcloud auth print-access-token`).
#[derive(Debug, Clone)]
pub struct DlpCredentials {
    pub project_id: String,
    pub access_token: String,
}

impl DlpCredentials {
    pub fn from_env(config_project: Option<&str>) -> Result<Self, ProviderError> {
        let project_id = config_project
            .map(str::to_string)
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
            .filter(|p| !p.is_empty())
            .ok_or(ProviderError::MissingCredentials("GOOGLE_CLOUD_PROJECT"))?;

        let access_token = std::env::var("GOOGLE_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(ProviderError::MissingCredentials("GOOGLE_ACCESS_TOKEN"))?;

        Ok(Self {
            project_id,
            access_token,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeidentifyRequest {
    inspect_config: InspectConfig,
    deidentify_config: DeidentifyConfig,
    item: ContentItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectConfig {
    info_types: Vec<InfoType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rule_set: Vec<InspectionRuleSet>,
}

#[derive(Debug, Clone, Serialize)]
struct InfoType {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectionRuleSet {
    info_types: Vec<InfoType>,
    rules: Vec<InspectionRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectionRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    hotword_rule: Option<HotwordRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclusion_rule: Option<ExclusionRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HotwordRule {
    hotword_regex: RegexPattern,
    likelihood_adjustment: LikelihoodAdjustment,
    proximity: Proximity,
}

#[derive(Debug, Serialize)]
struct RegexPattern {
    pattern: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LikelihoodAdjustment {
    fixed_likelihood: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Proximity {
    window_before: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionRule {
    exclude_info_types: ExcludeInfoTypes,
    matching_type: String,
    regex: RegexPattern,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExcludeInfoTypes {
    info_types: Vec<InfoType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeidentifyConfig {
    info_type_transformations: InfoTypeTransformations,
}

#[derive(Debug, Serialize)]
struct InfoTypeTransformations {
    transformations: Vec<Transformation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Transformation {
    primitive_transformation: PrimitiveTransformation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimitiveTransformation {
    crypto_hash_config: CryptoHashConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CryptoHashConfig {
    crypto_key: CryptoKey,
}

#[derive(Debug, Serialize)]
struct CryptoKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    transient: Option<TransientKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unwrapped: Option<UnwrappedKey>,
}

#[derive(Debug, Serialize)]
struct TransientKey {
    name: String,
}

#[derive(Debug, Serialize)]
struct UnwrappedKey {
    key: String,
}

#[derive(Debug, Serialize)]
struct ContentItem {
    value: String,
}

#[derive(Debug, Deserialize)]
struct DeidentifyResponse {
    item: ResponseItem,
}

#[derive(Debug, Deserialize)]
struct ResponseItem {
    #[serde(default)]
    value: String,
}

pub struct DlpRedactor {
    client: Client,
    config: DlpConfig,
    credentials: DlpCredentials,
    hotwords: Vec<String>,
    exclusions: Vec<String>,
    unwrapped_key: Option<Vec<u8>>,
}

impl DlpRedactor {
    pub fn new(config: DlpConfig, credentials: DlpCredentials) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            credentials,
            hotwords: Vec::new(),
            exclusions: Vec::new(),
            unwrapped_key: None,
        })
    }

    /// Hotwords whose proximity marks a finding as very unlikely PII.
    pub fn with_hotwords(mut self, hotwords: Vec<String>) -> Self {
        self.hotwords = hotwords;
        self
    }

    /// Full-match patterns excluded from detection entirely.
    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Uses a caller-supplied hash key instead of a DLP-generated transient
    /// one. The API accepts 32- or 64-byte keys only.
    pub fn with_unwrapped_key(mut self, key: Vec<u8>) -> Result<Self, ProviderError> {
        if key.len() != 32 && key.len() != 64 {
            return Err(ProviderError::Config(format!(
                "crypto hash key must be 32 or 64 bytes (got {})",
                key.len()
            )));
        }
        self.unwrapped_key = Some(key);
        Ok(self)
    }

    fn info_types(&self) -> Vec<InfoType> {
        self.config
            .info_types
            .iter()
            .map(|name| InfoType { name: name.clone() })
            .collect()
    }

    fn build_request(&self, text: &str) -> DeidentifyRequest {
        let info_types = self.info_types();
        let mut rules = Vec::new();

        if !self.hotwords.is_empty() {
            let pattern = format!("(?i)({})(?-i)", self.hotwords.join("|"));
            rules.push(InspectionRule {
                hotword_rule: Some(HotwordRule {
                    hotword_regex: RegexPattern { pattern },
                    likelihood_adjustment: LikelihoodAdjustment {
                        fixed_likelihood: "VERY_UNLIKELY".to_string(),
                    },
                    proximity: Proximity { window_before: 1 },
                }),
                exclusion_rule: None,
            });
        }

        if !self.exclusions.is_empty() {
            let pattern = format!("(?i)({})(?-i)", self.exclusions.join("|"));
            rules.push(InspectionRule {
                hotword_rule: None,
                exclusion_rule: Some(ExclusionRule {
                    exclude_info_types: ExcludeInfoTypes {
                        info_types: info_types.clone(),
                    },
                    matching_type: "MATCHING_TYPE_FULL_MATCH".to_string(),
                    regex: RegexPattern { pattern },
                }),
            });
        }

        let rule_set = if rules.is_empty() {
            Vec::new()
        } else {
            vec![InspectionRuleSet {
                info_types: info_types.clone(),
                rules,
            }]
        };

        let crypto_key = match &self.unwrapped_key {
            Some(key) => CryptoKey {
                transient: None,
                unwrapped: Some(UnwrappedKey {
                    key: STANDARD.encode(key),
                }),
            },
            None => CryptoKey {
                transient: Some(TransientKey {
                    name: TRANSIENT_KEY_NAME.to_string(),
                }),
                unwrapped: None,
            },
        };

        DeidentifyRequest {
            inspect_config: InspectConfig {
                info_types,
                rule_set,
            },
            deidentify_config: DeidentifyConfig {
                info_type_transformations: InfoTypeTransformations {
                    transformations: vec![Transformation {
                        primitive_transformation: PrimitiveTransformation {
                            crypto_hash_config: CryptoHashConfig { crypto_key },
                        },
                    }],
                },
            },
            item: ContentItem {
                value: text.to_string(),
            },
        }
    }
}

#[async_trait]
impl Redactor for DlpRedactor {
    fn name(&self) -> &'static str {
        "dlp"
    }

    async fn redact(&self, text: &str) -> Result<String, ProviderError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        let url = format!(
            "{}/v2/projects/{}/locations/global/content:deidentify",
            self.config.endpoint, self.credentials.project_id
        );
        debug!("Calling DLP deidentify at {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.access_token)
            .json(&self.build_request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: "dlp",
                status,
                message,
            });
        }

        let deidentified: DeidentifyResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: "dlp",
                    detail: e.to_string(),
                })?;

        info!(
            "DLP returned {} characters of deidentified text",
            deidentified.item.value.len()
        );
        Ok(deidentified.item.value)
    }
}
