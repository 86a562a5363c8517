//! Cross-provider checks: every redactor variant upholds the same contract.

use redact_compare_core::{
    AnalyzerRedactor, AwsCredentials, ComprehendRedactor, Config, DlpCredentials, DlpRedactor,
    NerClient, PlaceholderStyle, ProviderError, Redactor,
};

fn dlp_redactor(endpoint: String) -> DlpRedactor {
    let mut config = Config::default().dlp;
    config.endpoint = endpoint;
    let credentials = DlpCredentials {
        project_id: "demo-project".to_string(),
        access_token: "token".to_string(),
    };
    DlpRedactor::new(config, credentials).unwrap()
}

fn comprehend_redactor(endpoint: String) -> ComprehendRedactor {
    let mut config = Config::default().comprehend;
    config.endpoint = Some(endpoint);
    let credentials = AwsCredentials {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
    };
    ComprehendRedactor::new(config, credentials, PlaceholderStyle::Label).unwrap()
}

#[tokio::test]
async fn test_sample_scenario_through_analyzer() {
    let config = Config::default();
    let redactor = AnalyzerRedactor::new(&config.analyzer, PlaceholderStyle::Label).unwrap();

    let redacted = redactor
        .redact("Contact Jane Doe at jane@example.com")
        .await
        .unwrap();

    assert!(!redacted.contains("jane@example.com"));
    assert!(!redacted.contains("Jane Doe"));
    assert!(redacted.contains("[EMAIL_ADDRESS]"));
    assert!(redacted.contains("[PERSON]"));
}

#[tokio::test]
async fn test_sample_scenario_through_comprehend() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "Entities": [
                    {"BeginOffset": 8, "EndOffset": 16, "Type": "NAME", "Score": 0.99},
                    {"BeginOffset": 20, "EndOffset": 36, "Type": "EMAIL", "Score": 0.99}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let redactor = comprehend_redactor(server.url());
    let redacted = redactor
        .redact("Contact Jane Doe at jane@example.com")
        .await
        .unwrap();

    assert_eq!(redacted, "Contact [NAME] at [EMAIL]");
}

#[tokio::test]
async fn test_sample_scenario_through_transformer() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/predict")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "entities": [
                    {"label": "person", "text": "Jane Doe", "start": 8, "end": 16, "score": 0.96}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let config = Config::default();
    let mut ner_config = config.ner.clone();
    ner_config.endpoint = server.url();
    let ner = NerClient::new(ner_config).unwrap();

    let redactor =
        AnalyzerRedactor::with_transformer(&config.analyzer, PlaceholderStyle::Label, ner)
            .unwrap();
    let redacted = redactor
        .redact("Contact Jane Doe at jane@example.com")
        .await
        .unwrap();

    assert!(!redacted.contains("jane@example.com"));
    assert!(!redacted.contains("Jane Doe"));
    assert!(redacted.contains("[PERSON]"));
    assert!(redacted.contains("[EMAIL_ADDRESS]"));
}

#[tokio::test]
async fn test_sample_scenario_through_dlp() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "POST",
            "/v2/projects/demo-project/locations/global/content:deidentify",
        )
        .with_status(200)
        .with_body(r#"{"item": {"value": "Contact 2Fo0eP1vRQ at x9bLw0Qjem"}}"#)
        .create_async()
        .await;

    let redactor = dlp_redactor(server.url());
    let redacted = redactor
        .redact("Contact Jane Doe at jane@example.com")
        .await
        .unwrap();

    assert!(!redacted.contains("jane@example.com"));
    assert!(!redacted.contains("Jane Doe"));
}

#[tokio::test]
async fn test_empty_input_is_empty_for_every_variant() {
    let config = Config::default();

    let analyzer = AnalyzerRedactor::new(&config.analyzer, PlaceholderStyle::Label).unwrap();
    assert_eq!(analyzer.redact("").await.unwrap(), "");

    // Unroutable endpoints prove no call is attempted for empty input
    let dlp = dlp_redactor("http://127.0.0.1:1".to_string());
    assert_eq!(dlp.redact("").await.unwrap(), "");

    let comprehend = comprehend_redactor("http://127.0.0.1:1".to_string());
    assert_eq!(comprehend.redact("").await.unwrap(), "");
}

#[tokio::test]
async fn test_transport_failure_propagates() {
    let comprehend = comprehend_redactor("http://127.0.0.1:1".to_string());
    let err = comprehend.redact("some text").await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));

    let dlp = dlp_redactor("http://127.0.0.1:1".to_string());
    let err = dlp.redact("some text").await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[test]
fn test_module_exports() {
    use redact_compare_core::{AnalyzerEngine, EntitySpan};

    let config = Config::default();
    config.validate().unwrap();

    let engine = AnalyzerEngine::new(&config.analyzer);
    assert!(engine.is_ok());

    let span = EntitySpan {
        entity_type: "EMAIL_ADDRESS".to_string(),
        start: 0,
        end: 5,
        confidence: 0.9,
    };
    assert_eq!(span.entity_type, "EMAIL_ADDRESS");
}
