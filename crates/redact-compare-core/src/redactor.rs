//! Shared redactor contract and span substitution.
//!
//! Every provider variant implements [`Redactor`]: one call in, redacted
//! text or a provider error out. Providers that return detected spans
//! (rather than already-transformed text) funnel through
//! [`apply_placeholders`] so substitution behaves identically everywhere.

use crate::config::{EntitySpan, PlaceholderStyle};
use crate::error::ProviderError;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::warn;

/// A single text-in, text-out redaction capability backed by one provider.
#[async_trait]
pub trait Redactor {
    /// Short provider name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Redacts detected sensitive spans in `text`. Empty input returns
    /// empty output without touching the provider.
    async fn redact(&self, text: &str) -> Result<String, ProviderError>;
}

/// Renders the replacement token for one span.
pub fn placeholder(style: PlaceholderStyle, entity_type: &str, span_text: &str) -> String {
    match style {
        PlaceholderStyle::Label => format!("[{}]", entity_type),
        PlaceholderStyle::HashedLabel => {
            let digest = Sha256::digest(span_text.as_bytes());
            format!("[{}:{}]", entity_type, &hex::encode(digest)[..8])
        }
        PlaceholderStyle::Hash => {
            let digest = Sha256::digest(span_text.as_bytes());
            URL_SAFE.encode(digest)
        }
    }
}

/// Drops invalid and overlapping spans and orders the rest by start offset.
///
/// Providers are expected to hand back non-overlapping spans already; when
/// they do not, the earlier-starting span wins and, at equal starts, the
/// longer one.
pub fn normalize_spans(text: &str, spans: Vec<EntitySpan>) -> Vec<EntitySpan> {
    let mut spans: Vec<EntitySpan> = spans
        .into_iter()
        .filter(|span| {
            let valid = span.start < span.end
                && span.end <= text.len()
                && text.is_char_boundary(span.start)
                && text.is_char_boundary(span.end);
            if !valid {
                warn!(
                    "Dropping invalid span {}..{} for entity type '{}'",
                    span.start, span.end, span.entity_type
                );
            }
            valid
        })
        .collect();

    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<EntitySpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match kept.last() {
            Some(prev) if span.start < prev.end => {
                warn!(
                    "Dropping span {}..{} ('{}') overlapping {}..{} ('{}')",
                    span.start, span.end, span.entity_type, prev.start, prev.end, prev.entity_type
                );
            }
            _ => kept.push(span),
        }
    }
    kept
}

/// Replaces every span with its placeholder. Splicing runs from the last
/// span backwards so earlier offsets stay valid while the string shrinks
/// and grows.
pub fn apply_placeholders(text: &str, spans: Vec<EntitySpan>, style: PlaceholderStyle) -> String {
    let spans = normalize_spans(text, spans);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut result = text.to_string();
    for span in spans.iter().rev() {
        let token = placeholder(style, &span.entity_type, &text[span.start..span.end]);
        result.replace_range(span.start..span.end, &token);
    }
    result
}
