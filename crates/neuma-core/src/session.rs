use crate::constants::limits;
use crate::context::ConversationState;
use crate::error::NeumaError;
use crate::llm::SamplingParams;

/// Scalar settings for one running session. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSessionConfig {
    pub current_mode: String,
    /// Empty means no persona.
    pub current_persona: String,
    /// Empty means direct completion; otherwise the name of the store to query.
    pub active_vector_store: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl ActiveSessionConfig {
    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), NeumaError> {
        if !(limits::MIN_TEMPERATURE..=limits::MAX_TEMPERATURE).contains(&temperature) {
            return Err(NeumaError::invalid_setting(
                "temperature",
                format!(
                    "must be between {} and {}",
                    limits::MIN_TEMPERATURE,
                    limits::MAX_TEMPERATURE
                ),
            ));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn set_top_p(&mut self, top_p: f32) -> Result<(), NeumaError> {
        if !(limits::MIN_TOP_P..=limits::MAX_TOP_P).contains(&top_p) {
            return Err(NeumaError::invalid_setting(
                "top_p",
                format!("must be between {} and {}", limits::MIN_TOP_P, limits::MAX_TOP_P),
            ));
        }
        self.top_p = top_p;
        Ok(())
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) -> Result<(), NeumaError> {
        if max_tokens == 0 {
            return Err(NeumaError::invalid_setting(
                "max_tokens",
                "must be greater than 0",
            ));
        }
        self.max_tokens = max_tokens;
        Ok(())
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> Result<(), NeumaError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(NeumaError::invalid_setting("model", "must not be empty"));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_vector_store(&mut self, name: impl Into<String>) {
        self.active_vector_store = name.into();
    }

    pub fn clear_vector_store(&mut self) {
        self.active_vector_store.clear();
    }

    pub fn uses_retrieval(&self) -> bool {
        !self.active_vector_store.is_empty()
    }

    pub fn has_persona(&self) -> bool {
        !self.current_persona.is_empty()
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }
}

/// Everything one pipeline instance owns exclusively for a running session.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: ActiveSessionConfig,
    pub conversation: ConversationState,
}

impl Session {
    pub fn new(config: ActiveSessionConfig) -> Self {
        Self {
            config,
            conversation: ConversationState::new(),
        }
    }
}
