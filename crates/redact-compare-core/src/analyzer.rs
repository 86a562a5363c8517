//! In-process PII analyzer built on a regex recognizer registry.
//!
//! This is the local, no-network variant: each active recognizer is a named
//! pattern with a confidence heuristic. The transformer variant reuses the
//! same registry with the model-covered recognizers swapped out for a
//! [`NerClient`].

use crate::config::{AnalyzerConfig, EntitySpan, PlaceholderStyle};
use crate::error::ProviderError;
use crate::ner::NerClient;
use crate::redactor::{apply_placeholders, Redactor};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Public entity-category vocabulary accepted by the demo CLI, mapped to
/// the recognizer entity types used internally.
const ENTITY_CATEGORIES: &[(&str, &str)] = &[
    ("EMAIL", "EMAIL_ADDRESS"),
    ("PHONE", "PHONE_NUMBER"),
    ("CREDIT_CARD", "CREDIT_CARD"),
    ("SSN", "US_SSN"),
    ("NAME", "PERSON"),
    ("ADDRESS", "ADDRESS"),
    ("URL", "URL"),
    ("IP", "IP_ADDRESS"),
    ("DATE", "DATE_TIME"),
    ("NRP", "NRP"),
    ("LOCATION", "LOCATION"),
    ("BANK", "IBAN_CODE"),
];

/// Maps CLI categories like `NAME EMAIL` onto recognizer entity types.
pub fn resolve_entity_filter(categories: &[String]) -> Result<Vec<String>, ProviderError> {
    categories
        .iter()
        .map(|category| {
            ENTITY_CATEGORIES
                .iter()
                .find(|(name, _)| *name == category.as_str())
                .map(|(_, entity_type)| (*entity_type).to_string())
                .ok_or_else(|| {
                    let valid: Vec<&str> =
                        ENTITY_CATEGORIES.iter().map(|(name, _)| *name).collect();
                    ProviderError::Config(format!(
                        "unknown entity category '{}' (expected one of {})",
                        category,
                        valid.join(", ")
                    ))
                })
        })
        .collect()
}

#[derive(Clone)]
pub struct AnalyzerEngine {
    recognizers: HashMap<String, Regex>,
    confidence_threshold: f64,
}

impl AnalyzerEngine {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, ProviderError> {
        let mut recognizers = HashMap::new();

        for (entity_type, pattern) in &config.patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                ProviderError::Config(format!("invalid pattern for '{}': {}", entity_type, e))
            })?;
            debug!("Loaded recognizer '{}': {}", entity_type, pattern);
            recognizers.insert(entity_type.clone(), regex);
        }

        Ok(Self {
            recognizers,
            confidence_threshold: config.confidence_threshold,
        })
    }

    /// Deactivates recognizers for the given entity types. Used by the
    /// transformer variant so the model owns those categories.
    pub fn remove_recognizers(&mut self, entity_types: &[String]) {
        for entity_type in entity_types {
            if self.recognizers.remove(entity_type).is_some() {
                debug!("Removed recognizer '{}'", entity_type);
            }
        }
    }

    pub fn recognizer_count(&self) -> usize {
        self.recognizers.len()
    }

    pub fn analyze(&self, text: &str) -> Vec<EntitySpan> {
        let mut spans = Vec::new();

        for (entity_type, regex) in &self.recognizers {
            for mat in regex.find_iter(text) {
                let confidence = confidence_for(entity_type, mat.as_str());
                if confidence >= self.confidence_threshold {
                    spans.push(EntitySpan {
                        entity_type: entity_type.clone(),
                        start: mat.start(),
                        end: mat.end(),
                        confidence,
                    });
                }
            }
        }

        spans.sort_by_key(|span| span.start);
        spans
    }
}

// Per-recognizer plausibility heuristic. A match below the configured
// threshold is discarded rather than redacted.
fn confidence_for(entity_type: &str, text: &str) -> f64 {
    match entity_type {
        "EMAIL_ADDRESS" => {
            if text.contains('@') && text.contains('.') {
                0.95
            } else {
                0.7
            }
        }
        "PHONE_NUMBER" => {
            let digit_count = text.chars().filter(|c| c.is_ascii_digit()).count();
            if digit_count >= 10 {
                0.9
            } else {
                0.6
            }
        }
        "US_SSN" => {
            if text.matches('-').count() == 2 {
                0.95
            } else {
                0.8
            }
        }
        "CREDIT_CARD" => {
            let digit_count = text.chars().filter(|c| c.is_ascii_digit()).count();
            if digit_count == 16 {
                0.85
            } else {
                0.7
            }
        }
        "IP_ADDRESS" => {
            let parts: Vec<&str> = text.split('.').collect();
            if parts.len() == 4 && parts.iter().all(|&p| p.parse::<u8>().is_ok()) {
                0.95
            } else {
                0.7
            }
        }
        "URL" => {
            if text.starts_with("http://") || text.starts_with("https://") {
                0.9
            } else {
                0.7
            }
        }
        "PERSON" => {
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.len() >= 2
                && words
                    .iter()
                    .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
            {
                0.85
            } else {
                0.6
            }
        }
        _ => 0.8,
    }
}

/// Local analyzer redactor; optionally backed by a transformer NER model
/// for the categories regexes are weakest at.
pub struct AnalyzerRedactor {
    engine: AnalyzerEngine,
    ner: Option<NerClient>,
    entity_filter: Option<Vec<String>>,
    style: PlaceholderStyle,
}

impl AnalyzerRedactor {
    pub fn new(config: &AnalyzerConfig, style: PlaceholderStyle) -> Result<Self, ProviderError> {
        Ok(Self {
            engine: AnalyzerEngine::new(config)?,
            ner: None,
            entity_filter: None,
            style,
        })
    }

    /// Builds the transformer variant: the NER model takes over its covered
    /// entity types and the corresponding regex recognizers are dropped so
    /// both never compete for the same span.
    pub fn with_transformer(
        config: &AnalyzerConfig,
        style: PlaceholderStyle,
        ner: NerClient,
    ) -> Result<Self, ProviderError> {
        let mut engine = AnalyzerEngine::new(config)?;
        engine.remove_recognizers(&ner.covered_types());

        Ok(Self {
            engine,
            ner: Some(ner),
            entity_filter: None,
            style,
        })
    }

    /// Restricts detection to the given recognizer entity types.
    pub fn with_entity_filter(mut self, entity_types: Vec<String>) -> Self {
        self.entity_filter = Some(entity_types);
        self
    }

    fn merge_spans(regex_spans: Vec<EntitySpan>, ner_spans: Vec<EntitySpan>) -> Vec<EntitySpan> {
        let mut combined = HashMap::new();

        for span in regex_spans {
            let key = format!("{}:{}:{}", span.entity_type, span.start, span.end);
            combined.insert(key, span);
        }

        // Model detections win over regex matches of the same span
        for span in ner_spans {
            let key = format!("{}:{}:{}", span.entity_type, span.start, span.end);
            combined.insert(key, span);
        }

        combined.into_values().collect()
    }
}

#[async_trait]
impl Redactor for AnalyzerRedactor {
    fn name(&self) -> &'static str {
        if self.ner.is_some() {
            "analyzer+transformer"
        } else {
            "analyzer"
        }
    }

    async fn redact(&self, text: &str) -> Result<String, ProviderError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        let mut spans = self.engine.analyze(text);

        if let Some(ner) = &self.ner {
            let ner_spans = ner.extract_entities(text).await?;
            spans = Self::merge_spans(spans, ner_spans);
        }

        if let Some(filter) = &self.entity_filter {
            spans.retain(|span| filter.contains(&span.entity_type));
        }

        info!("{} detected {} spans", self.name(), spans.len());
        Ok(apply_placeholders(text, spans, self.style))
    }
}
