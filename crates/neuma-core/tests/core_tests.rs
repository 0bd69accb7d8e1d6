use neuma_core::config::Settings;
use neuma_core::format::preprocess;
use neuma_core::*;
use tempfile::TempDir;

// ========================================================================
// Settings Tests (config/mod.rs)
// ========================================================================

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.openai.model, "gpt-4o");
    assert_eq!(settings.openai.api_key_env, "OPENAI_API_KEY");
    assert_eq!(settings.openai.temperature, 1.0);
    assert!(settings.openai.base_url.is_none());
    assert!(!settings.debug.logging);

    // Built-in modes
    for mode in ["normal", "table", "code", "csv"] {
        assert!(settings.modes.contains_key(mode), "missing mode {}", mode);
    }
    assert!(settings.modes["normal"].is_empty());
    assert!(settings.modes["code"].contains('#'));
}

#[test]
fn test_settings_partial_toml_keeps_defaults() {
    let settings = Settings::from_toml_str(
        r#"
[openai]
model = "gpt-4o-mini"

[debug]
logging = true
"#,
    )
    .unwrap();

    assert_eq!(settings.openai.model, "gpt-4o-mini");
    assert_eq!(settings.openai.max_tokens, 1024);
    assert!(settings.debug.logging);
    assert_eq!(settings.mode_registry().len(), 4);
}

#[test]
fn test_settings_custom_modes_replace_defaults() {
    let settings = Settings::from_toml_str(
        r#"
[modes]
normal = ""
haiku = "Answer only in haiku."
"#,
    )
    .unwrap();

    let modes = settings.mode_registry();
    assert_eq!(modes.names(), vec!["haiku", "normal"]);
}

#[test]
fn test_settings_invalid_toml_is_config_error() {
    assert!(matches!(
        Settings::from_toml_str("[openai\nmodel = 1"),
        Err(NeumaError::Config(_))
    ));
}

#[test]
fn test_settings_save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("neuma").join("config.toml");

    let mut settings = Settings::default();
    settings.openai.model = "test-model".to_string();
    settings.openai.max_tokens = 4096;
    settings.personae_path = Some(temp_dir.path().join("personae.toml"));
    settings.save_to(&config_path).unwrap();

    let loaded = Settings::load_from(&config_path).unwrap();
    assert_eq!(loaded.openai.model, "test-model");
    assert_eq!(loaded.openai.max_tokens, 4096);
    assert_eq!(loaded.personae_path, settings.personae_path);
}

#[test]
fn test_session_defaults_follow_settings() {
    let mut settings = Settings::default();
    settings.openai.temperature = 0.3;

    let config = settings.session_defaults();
    assert_eq!(config.current_mode, "normal");
    assert_eq!(config.current_persona, "default");
    assert!(!config.uses_retrieval());
    assert_eq!(config.temperature, 0.3);
}

// ========================================================================
// Persona Tests (catalog/persona.rs)
// ========================================================================

#[test]
fn test_persona_store_loads_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("personae.toml");
    std::fs::write(
        &path,
        r#"
[[persona]]
name = "default"
temp = 0.5

[[persona.messages]]
role = "system"
content = "You are terse."

[[persona]]
name = "poet"
temp = 1.6

[[persona.messages]]
content = "You answer in verse."
"#,
    )
    .unwrap();

    let store = PersonaStore::load(&path).unwrap();
    assert_eq!(store.names(), vec!["default", "poet"]);

    let poet = store.get("poet").unwrap();
    assert_eq!(poet.temperature, 1.6);
    assert_eq!(poet.identity_messages[0].role, Role::System);
}

#[test]
fn test_persona_store_missing_file_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let store = PersonaStore::load_or_default(&temp_dir.path().join("nope.toml"));
    assert!(store.contains("default"));
    assert_eq!(store.len(), 1);
}

// ========================================================================
// Conversation persistence (context/persistence.rs)
// ========================================================================

#[test]
fn test_conversation_store_save_list_open_trash() {
    let temp_dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(temp_dir.path().join("conversations")).unwrap();

    let mut state = ConversationState::new();
    state.add_system_message("You are Neuma.");
    state.add_user_message("hello.");
    state.add_assistant_message("Hi!");

    store.save("greeting", &state).unwrap();
    store.save("another", &ConversationState::new()).unwrap();
    assert_eq!(store.list().unwrap(), vec!["another", "greeting"]);

    let loaded = store.load("greeting").unwrap();
    assert_eq!(loaded.messages(), state.messages());

    store.delete("greeting").unwrap();
    assert_eq!(store.list().unwrap(), vec!["another"]);
    assert!(store.load("greeting").is_err());
}

// ========================================================================
// Formatter (format/mod.rs)
// ========================================================================

#[test]
fn test_formatting_is_stable_when_repeated() {
    let samples = [
        "plain\n\n\ntext",
        "intro\n```\nfn main() {}\n```\noutro",
        "a|b\n---\n1|2",
    ];
    for raw in samples {
        let once = preprocess(raw);
        assert_eq!(preprocess(&once), once, "unstable for {:?}", raw);
    }
}

#[test]
fn test_ragged_table_reports_fallback() {
    let formatted = ResponseFormatter::format("a|b|c\n1|2", ModeKind::Table, None);

    assert!(matches!(formatted.artifact, DisplayArtifact::Table(_)));
    assert_eq!(
        formatted.fallback,
        Some(FormatFallback::RaggedTable { header_cells: 3 })
    );
}

#[test]
fn test_table_without_lines_falls_back_to_text() {
    let formatted = ResponseFormatter::format("---", ModeKind::Table, None);

    assert_eq!(formatted.artifact, DisplayArtifact::PlainText("---".into()));
    assert_eq!(formatted.fallback, Some(FormatFallback::EmptyTable));
}

#[test]
fn test_csv_without_hashtag_is_plain_text() {
    let formatted = ResponseFormatter::format("1,2", ModeKind::Csv, None);

    assert_eq!(formatted.artifact, DisplayArtifact::PlainText("1,2".into()));
    assert!(matches!(
        formatted.fallback,
        Some(FormatFallback::MissingArgument { mode: ModeKind::Csv })
    ));
}

#[test]
fn test_code_language_drops_terminator() {
    let formatted = ResponseFormatter::format("x = 1", ModeKind::Code, Some("python."));

    assert_eq!(
        formatted.artifact,
        DisplayArtifact::CodeBlock {
            language: Some("python".into()),
            code: "x = 1".into(),
        }
    );
}
