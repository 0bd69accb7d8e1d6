use std::collections::BTreeMap;
use std::fmt;

use crate::constants::prompt::MODE_PLACEHOLDER;

/// Response-shaping policy selected by a mode's name.
///
/// Any mode name outside the four built-in shapes formats like `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Normal,
    Table,
    Code,
    Csv,
}

impl ModeKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "table" => ModeKind::Table,
            "code" => ModeKind::Code,
            "csv" => ModeKind::Csv,
            _ => ModeKind::Normal,
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModeKind::Normal => "normal",
            ModeKind::Table => "table",
            ModeKind::Code => "code",
            ModeKind::Csv => "csv",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub name: String,
    pub instruction_template: String,
}

impl Mode {
    pub fn new(name: impl Into<String>, instruction_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction_template: instruction_template.into(),
        }
    }

    pub fn kind(&self) -> ModeKind {
        ModeKind::from_name(&self.name)
    }

    /// Whether the template carries the hashtag placeholder.
    pub fn expects_argument(&self) -> bool {
        self.instruction_template.contains(MODE_PLACEHOLDER)
    }

    /// The system instruction for this mode, or `None` when the template is empty.
    ///
    /// Every placeholder is replaced by `hashtag`; without one the template is
    /// returned verbatim.
    pub fn instruction(&self, hashtag: Option<&str>) -> Option<String> {
        if self.instruction_template.trim().is_empty() {
            return None;
        }
        Some(match hashtag {
            Some(tag) => self.instruction_template.replace(MODE_PLACEHOLDER, tag),
            None => self.instruction_template.clone(),
        })
    }
}

/// Keyed lookup of modes loaded from the `[modes]` table.
#[derive(Debug, Clone, Default)]
pub struct ModeRegistry {
    modes: BTreeMap<String, Mode>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: &BTreeMap<String, String>) -> Self {
        let modes = table
            .iter()
            .map(|(name, template)| (name.clone(), Mode::new(name, template)))
            .collect();
        Self { modes }
    }

    pub fn insert(&mut self, mode: Mode) {
        self.modes.insert(mode.name.clone(), mode);
    }

    pub fn get(&self, name: &str) -> Option<&Mode> {
        self.modes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
