//! Configuration management for redact-compare

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dlp: DlpConfig,
    pub comprehend: ComprehendConfig,
    pub analyzer: AnalyzerConfig,
    pub ner: NerConfig,
    pub redaction: RedactionConfig,
}

/// Google Cloud Sensitive Data Protection (`content:deidentify`) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlpConfig {
    pub endpoint: String,
    /// Overrides the GOOGLE_CLOUD_PROJECT environment variable when set.
    pub project_id: Option<String>,
    pub info_types: Vec<String>,
    pub timeout_seconds: u64,
}

/// AWS Comprehend `DetectPiiEntities` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehendConfig {
    pub region: String,
    /// Overrides the regional endpoint, mainly for tests.
    pub endpoint: Option<String>,
    pub language_code: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Active recognizers: entity type -> regex pattern.
    pub patterns: HashMap<String, String>,
    pub confidence_threshold: f64,
}

/// Local GLiNER-style inference server settings for the transformer variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerConfig {
    pub endpoint: String,
    pub model: String,
    /// Model label -> entity type, e.g. "person" -> "PERSON". The keys double
    /// as the label list sent with each prediction request.
    pub entity_mapping: HashMap<String, String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    pub style: PlaceholderStyle,
}

/// How a detected span is rendered in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceholderStyle {
    /// `[EMAIL_ADDRESS]`
    Label,
    /// `[EMAIL_ADDRESS:1f2e3d4c]` - first 8 hex chars of the span's SHA-256
    HashedLabel,
    /// URL-safe base64 SHA-256 digest of the span text
    Hash,
}

impl Default for Config {
    fn default() -> Self {
        let mut patterns = HashMap::new();
        patterns.insert(
            "EMAIL_ADDRESS".to_string(),
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b".to_string(),
        );
        patterns.insert(
            "PHONE_NUMBER".to_string(),
            r"(?:\(\d{3}\)\s?|\b\d{3}[-.])\d{3}[-.]\d{4}\b".to_string(),
        );
        patterns.insert("US_SSN".to_string(), r"\b\d{3}-\d{2}-\d{4}\b".to_string());
        patterns.insert(
            "CREDIT_CARD".to_string(),
            r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b".to_string(),
        );
        patterns.insert(
            "IP_ADDRESS".to_string(),
            r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b"
                .to_string(),
        );
        patterns.insert("URL".to_string(), r"\bhttps?://[^\s<>]+[^\s<>.,)]".to_string());
        patterns.insert(
            "PERSON".to_string(),
            r"\b[A-Z][a-z]+(?: [A-Z][a-z]+){1,2}\b".to_string(),
        );
        patterns.insert(
            "IBAN_CODE".to_string(),
            r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b".to_string(),
        );

        let mut entity_mapping = HashMap::new();
        entity_mapping.insert("person".to_string(), "PERSON".to_string());
        entity_mapping.insert("name".to_string(), "PERSON".to_string());
        entity_mapping.insert("organization".to_string(), "ORGANIZATION".to_string());
        entity_mapping.insert("location".to_string(), "LOCATION".to_string());

        Self {
            dlp: DlpConfig {
                endpoint: "https://dlp.googleapis.com".to_string(),
                project_id: None,
                info_types: vec![
                    "PERSON_NAME".to_string(),
                    "EMAIL_ADDRESS".to_string(),
                    "PHONE_NUMBER".to_string(),
                    "CREDIT_CARD_NUMBER".to_string(),
                    "ORGANIZATION_NAME".to_string(),
                    "FINANCIAL_ACCOUNT_NUMBER".to_string(),
                    "STREET_ADDRESS".to_string(),
                ],
                timeout_seconds: 30,
            },
            comprehend: ComprehendConfig {
                region: "us-east-1".to_string(),
                endpoint: None,
                language_code: "en".to_string(),
                timeout_seconds: 30,
            },
            analyzer: AnalyzerConfig {
                patterns,
                confidence_threshold: 0.8,
            },
            ner: NerConfig {
                endpoint: "http://localhost:8080".to_string(),
                model: "urchade/gliner_multi_pii-v1".to_string(),
                entity_mapping,
                timeout_seconds: 60,
            },
            redaction: RedactionConfig {
                style: PlaceholderStyle::Label,
            },
        }
    }
}

impl Config {
    pub fn get_app_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "redact-compare", "redact-compare")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine application directories"))
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn get_default_config_path() -> Result<PathBuf> {
        let project_dirs = Self::get_app_dirs()?;
        let config_dir = project_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.join("redact-compare.toml"))
    }

    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, pattern) in &self.analyzer.patterns {
            regex::Regex::new(pattern)
                .map_err(|e| anyhow::anyhow!("Invalid regex pattern for '{}': {}", name, e))?;
        }

        if !(0.0..=1.0).contains(&self.analyzer.confidence_threshold) {
            return Err(anyhow::anyhow!("Confidence threshold must be between 0.0 and 1.0"));
        }

        if self.dlp.info_types.is_empty() {
            return Err(anyhow::anyhow!("At least one DLP info type must be configured"));
        }

        if self.ner.entity_mapping.is_empty() {
            return Err(anyhow::anyhow!("NER entity mapping must not be empty"));
        }

        Ok(())
    }
}

/// One detected occurrence of sensitive content. Offsets are byte offsets
/// into the text passed to the provider; spans live for a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}
