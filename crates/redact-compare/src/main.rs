//! redact-compare command-line interface

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, ValueEnum};
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::PathBuf;
use tracing::{info, warn};

use redact_compare_core::{
    resolve_entity_filter, AnalyzerRedactor, AwsCredentials, ComprehendRedactor, Config,
    DlpCredentials, DlpRedactor, NerClient, Redactor,
};

const DEFAULT_TEXT: &str = "My name is John Doe and my email is john.doe@example.com.";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Provider {
    /// Google Cloud Sensitive Data Protection
    Dlp,
    /// AWS Comprehend PII detection
    Comprehend,
    /// Local regex analyzer
    Analyzer,
    /// Local analyzer backed by a transformer NER model
    Transformer,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the same text through cloud and local PII redaction providers", long_about = None)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = Provider::Analyzer, help = "Redaction provider to run")]
    provider: Provider,

    #[arg(long, short, help = "Path to a file containing text to redact. If not provided, a default example will be used")]
    file: Option<PathBuf>,

    #[arg(long, short, num_args = 1.., help = "Entity categories to detect, space separated (e.g. NAME EMAIL); analyzer variants only")]
    entities: Vec<String>,

    #[arg(long, short, help = "Base64-encoded 32 or 64 byte key for the dlp crypto hash. A transient key is used if not provided")]
    key: Option<String>,

    #[arg(long, short = 'g', help = "Generate and print a random 32-byte key encoded as base64")]
    generate_key: bool,

    #[arg(long, num_args = 1.., help = "Hotwords that mark nearby findings as unlikely PII (dlp provider)")]
    hotwords: Vec<String>,

    #[arg(long, short = 'x', num_args = 1.., help = "Text patterns to exclude from detection (dlp provider)")]
    exclusions: Vec<String>,

    #[arg(long, short, help = "Store the redacted text to <file>.redact instead of printing to stdout")]
    store: bool,

    #[arg(long, short, help = "Write both source and redacted content, with source wrapped in <source></source> tags and redacted content wrapped in <redacted></redacted> tags")]
    combined: bool,

    #[arg(long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info", help = "Log level (error, warn, info, debug, trace)")]
    log_level: String,
}

fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    let key = STANDARD
        .decode(encoded)
        .context("Failed to decode key as base64")?;
    if key.len() != 32 && key.len() != 64 {
        bail!("Key must be 32 or 64 bytes (got {})", key.len());
    }
    Ok(key)
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(config_path) => {
            info!("Loading configuration from: {}", config_path.display());
            Config::from_file(config_path)?
        }
        None => {
            // Try to load from default location, fallback to default config
            match Config::get_default_config_path() {
                Ok(default_path) if default_path.exists() => {
                    info!(
                        "Loading configuration from default location: {}",
                        default_path.display()
                    );
                    Config::from_file(&default_path)?
                }
                Ok(default_path) => {
                    info!("Creating default configuration at: {}", default_path.display());
                    let config = Config::default();
                    config.to_file(&default_path)?;
                    config
                }
                Err(_) => {
                    info!("Using default configuration (could not determine config directory)");
                    Config::default()
                }
            }
        }
    };

    config.validate()?;
    Ok(config)
}

fn build_redactor(args: &Args, config: &Config) -> Result<Box<dyn Redactor>> {
    let entity_filter = if args.entities.is_empty() {
        None
    } else {
        Some(resolve_entity_filter(&args.entities)?)
    };

    if entity_filter.is_some()
        && matches!(args.provider, Provider::Dlp | Provider::Comprehend)
    {
        warn!("--entities only applies to the analyzer variants, ignoring");
    }

    let redactor: Box<dyn Redactor> = match args.provider {
        Provider::Dlp => {
            let credentials = DlpCredentials::from_env(config.dlp.project_id.as_deref())?;
            let mut redactor = DlpRedactor::new(config.dlp.clone(), credentials)?
                .with_hotwords(args.hotwords.clone())
                .with_exclusions(args.exclusions.clone());
            if let Some(encoded) = &args.key {
                redactor = redactor.with_unwrapped_key(decode_key(encoded)?)?;
            }
            Box::new(redactor)
        }
        Provider::Comprehend => {
            let credentials = AwsCredentials::from_env()?;
            Box::new(ComprehendRedactor::new(
                config.comprehend.clone(),
                credentials,
                config.redaction.style,
            )?)
        }
        Provider::Analyzer => {
            let mut redactor =
                AnalyzerRedactor::new(&config.analyzer, config.redaction.style)?;
            if let Some(filter) = entity_filter {
                redactor = redactor.with_entity_filter(filter);
            }
            Box::new(redactor)
        }
        Provider::Transformer => {
            let ner = NerClient::new(config.ner.clone())?;
            let mut redactor = AnalyzerRedactor::with_transformer(
                &config.analyzer,
                config.redaction.style,
                ner,
            )?;
            if let Some(filter) = entity_filter {
                redactor = redactor.with_entity_filter(filter);
            }
            Box::new(redactor)
        }
    };

    Ok(redactor)
}

fn write_output(args: &Args, text: &str, redacted: &str) -> Result<()> {
    // --store only makes sense with an input file; fall through to stdout otherwise
    if let (true, Some(input_file)) = (args.store, &args.file) {
        let output_file = format!("{}.redact", input_file.display());
        std::fs::write(&output_file, redacted)
            .with_context(|| format!("Failed to write {}", output_file))?;
        info!("Redacted text written to: {}", output_file);

        if args.combined {
            let combined_file = format!("{}.redact.combined", input_file.display());
            std::fs::write(
                &combined_file,
                format!("<source>{}</source>\n<redacted>{}</redacted>", text, redacted),
            )
            .with_context(|| format!("Failed to write {}", combined_file))?;
            info!("Combined text written to: {}", combined_file);
        }
    } else if args.combined {
        println!("<source>{}</source>\n<redacted>{}</redacted>", text, redacted);
    } else {
        println!("{}", redacted);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", args.log_level);
        tracing::Level::INFO
    });

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.generate_key {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        eprintln!("Generated key (base64): {}", STANDARD.encode(key));
        if args.file.is_none() && args.key.is_none() {
            // Only generating a key, nothing to redact
            return Ok(());
        }
    }

    let config = load_config(args.config.as_ref())?;
    info!("Configuration validated successfully");

    let text = match &args.file {
        Some(path) => {
            info!("Reading text from file: {}", path.display());
            std::fs::read_to_string(path)
                .with_context(|| format!("Error reading file {}", path.display()))?
        }
        None => DEFAULT_TEXT.to_string(),
    };

    let redactor = build_redactor(&args, &config)?;
    info!("Redacting with provider: {}", redactor.name());

    let redacted = redactor
        .redact(&text)
        .await
        .with_context(|| format!("Redaction via {} failed", redactor.name()))?;

    write_output(&args, &text, &redacted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv.iter().copied()).unwrap()
    }

    #[test]
    fn test_default_args() {
        let args = parse(&["redact-compare"]);

        assert_eq!(args.provider, Provider::Analyzer);
        assert!(args.file.is_none());
        assert!(args.entities.is_empty());
        assert!(!args.store);
        assert!(!args.combined);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_provider_selection() {
        let args = parse(&["redact-compare", "--provider", "comprehend"]);
        assert_eq!(args.provider, Provider::Comprehend);

        let args = parse(&["redact-compare", "--provider", "transformer"]);
        assert_eq!(args.provider, Provider::Transformer);

        assert!(Args::try_parse_from(["redact-compare", "--provider", "nope"]).is_err());
    }

    #[test]
    fn test_entities_accept_multiple_values() {
        let args = parse(&["redact-compare", "-e", "NAME", "EMAIL", "--provider", "analyzer"]);
        assert_eq!(args.entities, vec!["NAME", "EMAIL"]);
    }

    #[test]
    fn test_dlp_rule_flags() {
        let args = parse(&[
            "redact-compare",
            "--provider",
            "dlp",
            "--hotwords",
            "foo",
            "bar",
            "-x",
            "example\\.com",
        ]);
        assert_eq!(args.hotwords, vec!["foo", "bar"]);
        assert_eq!(args.exclusions, vec!["example\\.com"]);
    }

    #[test]
    fn test_decode_key_validates_length() {
        let key32 = STANDARD.encode([1u8; 32]);
        assert_eq!(decode_key(&key32).unwrap().len(), 32);

        let key64 = STANDARD.encode([2u8; 64]);
        assert_eq!(decode_key(&key64).unwrap().len(), 64);

        let short = STANDARD.encode([3u8; 16]);
        assert!(decode_key(&short).is_err());

        assert!(decode_key("not-base64!").is_err());
    }

    #[test]
    fn test_build_analyzer_redactor_with_filter() {
        let args = parse(&["redact-compare", "-e", "EMAIL"]);
        let config = Config::default();

        let redactor = build_redactor(&args, &config).unwrap();
        assert_eq!(redactor.name(), "analyzer");
    }

    #[test]
    fn test_build_redactor_rejects_unknown_entity_category() {
        let args = parse(&["redact-compare", "-e", "PASSPORT"]);
        let config = Config::default();

        assert!(build_redactor(&args, &config).is_err());
    }

    #[test]
    fn test_build_transformer_redactor() {
        let args = parse(&["redact-compare", "--provider", "transformer"]);
        let config = Config::default();

        let redactor = build_redactor(&args, &config).unwrap();
        assert_eq!(redactor.name(), "analyzer+transformer");
    }
}
