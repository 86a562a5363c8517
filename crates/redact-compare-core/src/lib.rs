pub mod analyzer;
pub mod comprehend;
pub mod config;
pub mod dlp;
pub mod error;
pub mod ner;
pub mod redactor;


pub use analyzer::{resolve_entity_filter, AnalyzerEngine, AnalyzerRedactor};
pub use comprehend::{AwsCredentials, ComprehendRedactor};
pub use config::{
    AnalyzerConfig, ComprehendConfig, Config, DlpConfig, EntitySpan, NerConfig, PlaceholderStyle,
    RedactionConfig,
};
pub use dlp::{DlpCredentials, DlpRedactor};
pub use error::ProviderError;
pub use ner::NerClient;
pub use redactor::{apply_placeholders, normalize_spans, placeholder, Redactor};
