//! Writer and reader configuration loaded from JSON.

use pdf_forge::parser_config::ReaderOptions;
use pdf_forge::writer::{ComplianceMode, WriterConfig};

#[test]
fn test_writer_config_partial_json_uses_defaults() {
    let config: WriterConfig = serde_json::from_str(
        r#"{ "title": "From JSON", "compress": false, "compliance": "PdfUa1" }"#,
    )
    .unwrap();
    assert_eq!(config.title.as_deref(), Some("From JSON"));
    assert!(!config.compress);
    assert_eq!(config.compliance, ComplianceMode::PdfUa1);
    assert_eq!(config.language, "en-US");
    assert_eq!(config.creator.as_deref(), Some("pdf_forge"));
    assert!(config.creation_date.is_none());
}

#[test]
fn test_writer_config_survives_json() {
    let config = WriterConfig::default()
        .with_author("Someone")
        .with_compliance(ComplianceMode::PdfA2a)
        .with_icc_profile(vec![0, 1, 2, 3])
        .with_creation_date("2024-05-06T07:08:09Z".parse().unwrap());
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"2024-05-06T07:08:09Z\""));
    let back: WriterConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_reader_options_from_json() {
    let options: ReaderOptions = serde_json::from_str(r#"{ "strict": true, "max_prev_chain": 4 }"#).unwrap();
    assert!(options.strict);
    assert_eq!(options.max_prev_chain, 4);
    // Unspecified fields fall back to the lenient defaults
    assert_eq!(options.max_decompressed_size, ReaderOptions::lenient().max_decompressed_size);
    assert!(options.allow_missing_endobj);

    let empty: ReaderOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, ReaderOptions::default());
}
