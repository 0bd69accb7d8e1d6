use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::context::ConversationState;
use crate::error::NeumaError;
use crate::llm::{Message, Role};

const CONVERSATION_EXTENSION: &str = "json";

/// A single persisted `{role, content}` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedMessage {
    pub role: Role,
    pub content: String,
}

/// A complete saved conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConversation {
    pub name: String,
    pub saved_at: String,
    pub messages: Vec<SavedMessage>,
}

impl SavedConversation {
    pub fn from_state(name: impl Into<String>, state: &ConversationState) -> Self {
        Self {
            name: name.into(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            messages: state
                .messages()
                .iter()
                .map(|m| SavedMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }

    pub fn into_state(self) -> ConversationState {
        ConversationState::from_messages(
            self.messages
                .into_iter()
                .map(|m| Message {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
        )
    }
}

/// Saves and restores named conversations under a data folder.
pub struct ConversationStore {
    base_dir: PathBuf,
}

impl ConversationStore {
    /// Create a conversation store rooted at `base_dir`, creating it if needed.
    pub fn with_dir(base_dir: impl Into<PathBuf>) -> Result<Self, NeumaError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            NeumaError::Conversation(format!("Failed to create conversations directory: {}", e))
        })?;

        Ok(Self { base_dir })
    }

    fn conversation_path(&self, name: &str) -> Result<PathBuf, NeumaError> {
        validate_name(name)?;
        Ok(self
            .base_dir
            .join(format!("{}.{}", name, CONVERSATION_EXTENSION)))
    }

    /// Save a conversation to disk, replacing any previous one with the same name.
    pub fn save(&self, name: &str, state: &ConversationState) -> Result<(), NeumaError> {
        let path = self.conversation_path(name)?;
        let saved = SavedConversation::from_state(name, state);
        let contents = serde_json::to_string_pretty(&saved)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|e| {
            NeumaError::Conversation(format!("Failed to write temporary conversation file: {}", e))
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            NeumaError::Conversation(format!("Failed to rename conversation file: {}", e))
        })?;

        tracing::debug!(name, messages = state.len(), "conversation saved");
        Ok(())
    }

    /// Load a conversation from disk
    pub fn load(&self, name: &str) -> Result<ConversationState, NeumaError> {
        let path = self.conversation_path(name)?;
        if !path.exists() {
            return Err(NeumaError::Conversation(format!(
                "Conversation not found: {}",
                name
            )));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            NeumaError::Conversation(format!("Failed to read conversation file: {}", e))
        })?;
        let saved: SavedConversation = serde_json::from_str(&contents).map_err(|e| {
            NeumaError::Conversation(format!("Failed to parse conversation file: {}", e))
        })?;

        Ok(saved.into_state())
    }

    /// Names of all saved conversations, sorted.
    pub fn list(&self) -> Result<Vec<String>, NeumaError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONVERSATION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a conversation
    pub fn delete(&self, name: &str) -> Result<(), NeumaError> {
        let path = self.conversation_path(name)?;
        if !path.exists() {
            return Err(NeumaError::Conversation(format!(
                "Conversation not found: {}",
                name
            )));
        }
        fs::remove_file(&path).map_err(|e| {
            NeumaError::Conversation(format!("Failed to delete conversation file: {}", e))
        })?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), NeumaError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if invalid {
        return Err(NeumaError::Conversation(format!(
            "Invalid conversation name: {:?}",
            name
        )));
    }
    Ok(())
}
