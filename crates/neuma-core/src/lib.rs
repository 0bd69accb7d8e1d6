pub mod error;
pub mod constants;
pub mod llm;
pub mod context;
pub mod catalog;
pub mod config;
pub mod session;
pub mod prompt;
pub mod store;
pub mod dispatch;
pub mod format;
pub mod pipeline;

// Re-export key types
pub use error::NeumaError;
pub use pipeline::{Pipeline, TurnOutcome, TurnWarning};
pub use llm::{Completion, LlmClient, Message, OpenAIClient, Role, SamplingParams, TokenUsage, UsageTracker};
pub use context::{ConversationState, ConversationStore};
pub use catalog::{Mode, ModeKind, ModeRegistry, Persona, PersonaStore};
pub use config::Settings;
pub use session::{ActiveSessionConfig, Session};
pub use prompt::{AssembledTurn, DirectiveResolver, PromptAssembler};
pub use store::{LocalStoreCatalog, RetrievedChunk, VectorStore, VectorStoreProvider};
pub use dispatch::{DispatchResult, QueryDispatcher, QueryPath};
pub use format::{DisplayArtifact, FormatFallback, ResponseFormatter, Table};
