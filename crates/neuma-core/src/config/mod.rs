use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::{ModeRegistry, PersonaStore};
use crate::constants::{defaults, endpoints};
use crate::error::NeumaError;
use crate::llm::OpenAIClient;
use crate::session::ActiveSessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai: OpenAISettings,
    #[serde(default)]
    pub embeddings: EmbeddingSettings,
    #[serde(default)]
    pub vector_db: VectorDbSettings,
    #[serde(default)]
    pub conversations: ConversationSettings,
    #[serde(default)]
    pub debug: DebugSettings,
    #[serde(default = "default_modes")]
    pub modes: BTreeMap<String, String>,
    #[serde(default)]
    pub personae_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub api_key_env: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbSettings {
    pub persist_folder: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub data_folder: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    pub logging: bool,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            model: defaults::MODEL.to_string(),
            temperature: defaults::TEMPERATURE,
            top_p: defaults::TOP_P,
            max_tokens: defaults::MAX_TOKENS,
            api_key_env: defaults::API_KEY_ENV.to_string(),
            base_url: None,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: defaults::EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Default for VectorDbSettings {
    fn default() -> Self {
        Self {
            persist_folder: data_dir().join("vector_db"),
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            data_folder: data_dir().join("conversations"),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neuma")
}

fn default_modes() -> BTreeMap<String, String> {
    let mut modes = BTreeMap::new();
    modes.insert("normal".to_string(), String::new());
    modes.insert(
        "table".to_string(),
        "Answer only with a markdown table, one header row, cells separated by |. No prose."
            .to_string(),
    );
    modes.insert(
        "code".to_string(),
        "Answer only with # code inside a single fenced code block. No explanations."
            .to_string(),
    );
    modes.insert(
        "csv".to_string(),
        "Answer only with CSV data, comma separated, first line is the header.".to_string(),
    );
    modes
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai: OpenAISettings::default(),
            embeddings: EmbeddingSettings::default(),
            vector_db: VectorDbSettings::default(),
            conversations: ConversationSettings::default(),
            debug: DebugSettings::default(),
            modes: default_modes(),
            personae_path: None,
        }
    }
}

impl Settings {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("neuma")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the user config, falling back to defaults when it is missing or broken.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(settings) => return settings,
                Err(e) => tracing::warn!(error = %e, "using default settings"),
            }
        }
        Self::default()
    }

    /// Load an explicit config file; errors are reported, not defaulted.
    pub fn load_from(path: &Path) -> Result<Self, NeumaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, NeumaError> {
        toml::from_str(content).map_err(|e| NeumaError::Config(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), NeumaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NeumaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the API key from the environment variable specified in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.openai.api_key_env).ok()
    }

    pub fn personae_path(&self) -> PathBuf {
        self.personae_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("personae.toml"))
    }

    pub fn mode_registry(&self) -> ModeRegistry {
        ModeRegistry::from_table(&self.modes)
    }

    pub fn persona_store(&self) -> PersonaStore {
        PersonaStore::load_or_default(&self.personae_path())
    }

    /// Session defaults: normal mode, default persona, direct completion.
    pub fn session_defaults(&self) -> ActiveSessionConfig {
        ActiveSessionConfig {
            current_mode: defaults::MODE.to_string(),
            current_persona: defaults::PERSONA.to_string(),
            active_vector_store: String::new(),
            model: self.openai.model.clone(),
            temperature: self.openai.temperature,
            top_p: self.openai.top_p,
            max_tokens: self.openai.max_tokens,
        }
    }

    /// Build the OpenAI client from the current settings.
    pub fn build_llm_client(&self) -> Result<OpenAIClient, NeumaError> {
        let api_key = self.api_key().ok_or_else(|| {
            NeumaError::Config(format!(
                "API key not found in environment variable {}",
                self.openai.api_key_env
            ))
        })?;
        let base_url = self
            .openai
            .base_url
            .clone()
            .unwrap_or_else(|| endpoints::OPENAI_BASE_URL.to_string());
        Ok(OpenAIClient::new(api_key).with_base_url(base_url))
    }
}
