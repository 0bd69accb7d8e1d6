use std::fmt;
use std::sync::Arc;

use crate::catalog::ModeKind;
use crate::config::Settings;
use crate::context::ConversationState;
use crate::dispatch::{QueryDispatcher, QueryPath};
use crate::error::NeumaError;
use crate::format::{DisplayArtifact, FormatFallback, ResponseFormatter};
use crate::llm::{LlmClient, TokenUsage, UsageTracker};
use crate::prompt::{
    AssemblyWarning, DirectiveResolver, DirectiveUnresolved, FileReader, PromptAssembler,
    WebFetcher,
};
use crate::session::{ActiveSessionConfig, Session};
use crate::store::VectorStoreProvider;

/// Non-fatal conditions collected over one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnWarning {
    MissingHashtag { mode: String },
    DirectiveUnresolved(DirectiveUnresolved),
    FormatFallback(FormatFallback),
}

impl From<AssemblyWarning> for TurnWarning {
    fn from(warning: AssemblyWarning) -> Self {
        match warning {
            AssemblyWarning::MissingHashtag { mode } => TurnWarning::MissingHashtag { mode },
            AssemblyWarning::DirectiveUnresolved(d) => TurnWarning::DirectiveUnresolved(d),
        }
    }
}

impl fmt::Display for TurnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnWarning::MissingHashtag { mode } => {
                write!(f, "mode '{}' expects a #hashtag in the prompt", mode)
            }
            TurnWarning::DirectiveUnresolved(d) => write!(f, "{}", d),
            TurnWarning::FormatFallback(fallback) => write!(f, "{}", fallback),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub artifact: DisplayArtifact,
    /// Response text before formatting, sources included.
    pub raw_text: String,
    pub usage: TokenUsage,
    pub sources: Vec<String>,
    pub path: QueryPath,
    pub warnings: Vec<TurnWarning>,
}

/// One running session: assembles, dispatches and formats turns in strict
/// sequence. `run_turn` takes `&mut self`, so turns never overlap.
pub struct Pipeline {
    assembler: PromptAssembler,
    dispatcher: QueryDispatcher,
    session: Session,
    usage: UsageTracker,
}

impl Pipeline {
    pub fn new(
        assembler: PromptAssembler,
        dispatcher: QueryDispatcher,
        config: ActiveSessionConfig,
    ) -> Self {
        Self {
            assembler,
            dispatcher,
            session: Session::new(config),
            usage: UsageTracker::default(),
        }
    }

    /// Wire a pipeline from settings and the given collaborators, applying the
    /// default persona's temperature.
    pub fn from_settings(
        settings: &Settings,
        llm: Arc<dyn LlmClient>,
        stores: Arc<dyn VectorStoreProvider>,
        files: Arc<dyn FileReader>,
        web: Arc<dyn WebFetcher>,
    ) -> Self {
        let assembler = PromptAssembler::new(
            Arc::new(settings.persona_store()),
            Arc::new(settings.mode_registry()),
            DirectiveResolver::new(files, web),
        );
        let dispatcher = QueryDispatcher::new(llm, stores);
        let mut config = settings.session_defaults();
        if !assembler.personas().contains(&config.current_persona) {
            tracing::warn!(persona = %config.current_persona, "default persona missing, starting without one");
            config.current_persona.clear();
        }
        if !assembler.modes().contains(&config.current_mode) {
            tracing::warn!(mode = %config.current_mode, "default mode missing from [modes]");
        }

        let mut pipeline = Self::new(assembler, dispatcher, config);
        pipeline.apply_persona_temperature();
        pipeline
    }

    /// Run one turn end to end.
    ///
    /// On failure the user message stays in the conversation and no assistant
    /// message is added; the session remains usable.
    pub async fn run_turn(&mut self, raw_user_text: &str) -> Result<TurnOutcome, NeumaError> {
        let assembled = self
            .assembler
            .assemble_turn(raw_user_text, &mut self.session)
            .await?;
        let mut warnings: Vec<TurnWarning> =
            assembled.warnings.into_iter().map(TurnWarning::from).collect();

        let dispatched = match self
            .dispatcher
            .dispatch(&assembled.messages, &mut self.session)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "turn failed");
                return Err(e);
            }
        };
        self.usage.track(&dispatched.usage);

        let formatted = ResponseFormatter::format(
            &dispatched.text,
            self.mode_kind(),
            assembled.hashtag.as_deref(),
        );
        if let Some(fallback) = formatted.fallback {
            warnings.push(TurnWarning::FormatFallback(fallback));
        }

        Ok(TurnOutcome {
            artifact: formatted.artifact,
            raw_text: dispatched.text,
            usage: dispatched.usage,
            sources: dispatched.sources,
            path: dispatched.path,
            warnings,
        })
    }

    pub fn config(&self) -> &ActiveSessionConfig {
        &self.session.config
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.session.conversation
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn mode_names(&self) -> Vec<&str> {
        self.assembler.modes().names()
    }

    pub fn persona_names(&self) -> Vec<&str> {
        self.assembler.personas().names()
    }

    pub fn mode_kind(&self) -> ModeKind {
        ModeKind::from_name(&self.session.config.current_mode)
    }

    pub fn set_mode(&mut self, name: &str) -> Result<(), NeumaError> {
        if !self.assembler.modes().contains(name) {
            return Err(NeumaError::UnknownMode(name.to_string()));
        }
        tracing::info!(mode = name, "mode set");
        self.session.config.current_mode = name.to_string();
        Ok(())
    }

    /// Select a persona and adopt its temperature. An empty name clears it.
    pub fn set_persona(&mut self, name: &str) -> Result<(), NeumaError> {
        if !name.is_empty() && !self.assembler.personas().contains(name) {
            return Err(NeumaError::UnknownPersona(name.to_string()));
        }
        tracing::info!(persona = name, "persona set");
        self.session.config.current_persona = name.to_string();
        self.apply_persona_temperature();
        Ok(())
    }

    fn apply_persona_temperature(&mut self) {
        let Some(persona) = self
            .assembler
            .personas()
            .get(&self.session.config.current_persona)
        else {
            return;
        };
        if let Err(e) = self.session.config.set_temperature(persona.temperature) {
            tracing::warn!(persona = %persona.name, error = %e, "ignoring persona temperature");
        }
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), NeumaError> {
        self.session.config.set_temperature(temperature)
    }

    pub fn set_top_p(&mut self, top_p: f32) -> Result<(), NeumaError> {
        self.session.config.set_top_p(top_p)
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) -> Result<(), NeumaError> {
        self.session.config.set_max_tokens(max_tokens)
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), NeumaError> {
        self.session.config.set_model(model)
    }

    /// Route later turns to the named store; an empty name means direct completion.
    pub fn set_vector_store(&mut self, name: &str) {
        tracing::info!(store = name, "vector store set");
        self.session.config.set_vector_store(name);
    }

    pub fn clear_vector_store(&mut self) {
        self.session.config.clear_vector_store();
    }

    /// Start over: persona and mode messages are injected again on the next turn.
    pub fn new_conversation(&mut self) {
        self.session.conversation.clear();
    }

    pub fn restore_conversation(&mut self, conversation: ConversationState) {
        self.session.conversation = conversation;
    }
}
