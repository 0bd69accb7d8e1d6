use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::defaults;
use crate::error::NeumaError;
use crate::llm::Message;

/// A named system-level identity with its own sampling temperature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Persona {
    pub name: String,
    #[serde(rename = "temp", alias = "temperature", default = "default_temperature")]
    pub temperature: f32,
    #[serde(rename = "messages", default)]
    pub identity_messages: Vec<Message>,
}

fn default_temperature() -> f32 {
    defaults::TEMPERATURE
}

impl Persona {
    pub fn new(name: impl Into<String>, temperature: f32, identity_messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            temperature,
            identity_messages,
        }
    }

    /// The persona used when no personae file is available.
    pub fn builtin_default() -> Self {
        Self::new(
            defaults::PERSONA,
            defaults::TEMPERATURE,
            vec![Message::system(
                "You are a helpful, concise assistant running in a terminal.",
            )],
        )
    }
}

#[derive(Debug, Deserialize)]
struct PersonaeFile {
    #[serde(default)]
    persona: Vec<Persona>,
}

/// Read-only lookup of personae by unique name.
#[derive(Debug, Clone, Default)]
pub struct PersonaStore {
    personae: BTreeMap<String, Persona>,
}

impl PersonaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list; a later entry with a duplicate name wins.
    pub fn from_personae(personae: impl IntoIterator<Item = Persona>) -> Self {
        let personae = personae
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { personae }
    }

    /// Parse the `[[persona]]` array-of-tables format.
    pub fn from_toml_str(content: &str) -> Result<Self, NeumaError> {
        let file: PersonaeFile = toml::from_str(content)
            .map_err(|e| NeumaError::Config(format!("Failed to parse personae: {e}")))?;
        Ok(Self::from_personae(file.persona))
    }

    pub fn load(path: &Path) -> Result<Self, NeumaError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NeumaError::Config(format!("Failed to read personae file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to the built-in default persona.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(store) if !store.is_empty() => return store,
                Ok(_) => tracing::warn!(path = %path.display(), "personae file is empty"),
                Err(e) => tracing::warn!(error = %e, "falling back to built-in persona"),
            }
        }
        Self::from_personae([Persona::builtin_default()])
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personae.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.personae.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.personae.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.personae.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personae.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    const PERSONAE: &str = r#"
[[persona]]
name = "default"
temp = 0.7
messages = [
    { role = "system", content = "You are Neuma." },
    { content = "Answer briefly." },
]

[[persona]]
name = "poet"
temp = 1.4
messages = [{ role = "system", content = "You answer in verse." }]
"#;

    #[test]
    fn test_parse_personae_file() {
        let store = PersonaStore::from_toml_str(PERSONAE).unwrap();

        assert_eq!(store.names(), vec!["default", "poet"]);
        let default = store.get("default").unwrap();
        assert_eq!(default.temperature, 0.7);
        assert_eq!(default.identity_messages.len(), 2);
        assert_eq!(default.identity_messages[1].role, Role::System);
        assert_eq!(store.get("poet").unwrap().temperature, 1.4);
    }

    #[test]
    fn test_unknown_persona_is_none() {
        let store = PersonaStore::from_toml_str(PERSONAE).unwrap();
        assert!(store.get("pirate").is_none());
        assert!(!store.contains("pirate"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let store = PersonaStore::load_or_default(Path::new("/nonexistent/personae.toml"));
        assert!(store.contains(defaults::PERSONA));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PersonaStore::from_toml_str("[[persona]\nname=").unwrap_err();
        assert!(matches!(err, NeumaError::Config(_)));
    }
}
