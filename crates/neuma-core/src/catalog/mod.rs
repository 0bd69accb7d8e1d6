pub mod mode;
pub mod persona;

pub use mode::{Mode, ModeKind, ModeRegistry};
pub use persona::{Persona, PersonaStore};
