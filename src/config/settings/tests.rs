use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.generation_model, "llama3.1:8b");
    assert_eq!(config.store.collection, "kb_global");
    assert_eq!(config.chunking.chunk_size, 900);
    assert_eq!(config.chunking.chunk_overlap, 150);
    assert_eq!(config.retrieval.top_k, 8);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.generation_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.store.collection = "has spaces".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = invalid_config.chunking.chunk_size;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(..))
    ));

    let mut invalid_config = config;
    invalid_config.retrieval.threshold_strict = 0.95;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidThresholds(..))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_config_uses_defaults() {
    let parsed: Config = toml::from_str(
        r#"
            [ollama]
            host = "gpu-box"

            [retrieval]
            threshold_strict = 0.5
        "#,
    )
    .expect("partial config should parse");

    assert_eq!(parsed.ollama.host, "gpu-box");
    assert_eq!(parsed.ollama.port, 11434);
    assert!((parsed.retrieval.threshold_strict - 0.5).abs() < f32::EPSILON);
    assert!((parsed.retrieval.threshold_weak - 0.9).abs() < f32::EPSILON);
    assert_eq!(parsed.retrieval.vocabularies.len(), 2);
    assert_eq!(parsed.store.collection, "kb_global");
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("missing config should load");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
    assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
    assert_eq!(config.profiles_path(), temp_dir.path().join("profiles.toml"));
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.store.collection = "docs_v2".to_string();
    config.ollama.set_port(8080).expect("port is valid");
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(config, reloaded);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn store_path_override() {
    let config = Config {
        store: StoreConfig {
            path: Some(PathBuf::from("/data/vectors")),
            ..StoreConfig::default()
        },
        ..Config::default()
    };
    assert_eq!(config.vector_database_path(), PathBuf::from("/data/vectors"));
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_port(1).is_ok());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model("  ".to_string()).is_err());
    assert!(config.set_generation_model("qwen2.5:7b".to_string()).is_ok());
    assert_eq!(config.generation_model, "qwen2.5:7b");
    assert!(config.set_temperature(2.5).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_protocol("https".to_string()).is_ok());
}

#[test]
fn collection_names() {
    assert!(validate_collection_name("kb_global").is_ok());
    assert!(validate_collection_name("nextjs-15.docs").is_ok());
    assert!(validate_collection_name("").is_err());
    assert!(validate_collection_name("drop table").is_err());
    assert!(validate_collection_name("a'b").is_err());
}

#[test]
#[serial]
fn base_dir_from_environment() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    // SAFETY: serialized with other environment-mutating tests
    unsafe { std::env::set_var(HOME_ENV_VAR, temp_dir.path()) };
    let resolved = Config::default_base_dir();
    // SAFETY: serialized with other environment-mutating tests
    unsafe { std::env::remove_var(HOME_ENV_VAR) };

    assert_eq!(
        resolved.expect("base dir should resolve"),
        temp_dir.path().to_path_buf()
    );
}
