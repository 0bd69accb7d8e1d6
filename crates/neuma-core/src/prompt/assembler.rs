use std::sync::Arc;

use crate::catalog::{Mode, ModeRegistry, Persona, PersonaStore};
use crate::error::NeumaError;
use crate::llm::Message;
use crate::prompt::directive::{DirectiveResolver, DirectiveUnresolved};
use crate::prompt::hashtag::{find_hashtag, normalize};
use crate::session::Session;

/// Non-fatal conditions noticed while assembling a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyWarning {
    /// The mode template expects a `#hashtag` argument but the prompt has none.
    MissingHashtag { mode: String },
    DirectiveUnresolved(DirectiveUnresolved),
}

/// The finalized message sequence for one turn.
#[derive(Debug, Clone)]
pub struct AssembledTurn {
    /// The entire conversation, ending with this turn's user message.
    pub messages: Vec<Message>,
    /// Normalized user text before directive resolution.
    pub prompt: String,
    /// First hashtag of `prompt`, if any.
    pub hashtag: Option<String>,
    pub warnings: Vec<AssemblyWarning>,
}

/// Turns raw user text into the message sequence sent to the model.
#[derive(Clone)]
pub struct PromptAssembler {
    personas: Arc<PersonaStore>,
    modes: Arc<ModeRegistry>,
    resolver: DirectiveResolver,
}

impl PromptAssembler {
    pub fn new(
        personas: Arc<PersonaStore>,
        modes: Arc<ModeRegistry>,
        resolver: DirectiveResolver,
    ) -> Self {
        Self {
            personas,
            modes,
            resolver,
        }
    }

    pub fn personas(&self) -> &PersonaStore {
        &self.personas
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    /// Append this turn's messages to the session's conversation and return
    /// the full sequence.
    ///
    /// Persona identity and mode instruction are only injected into an empty
    /// conversation. Unknown persona or mode names fail before anything is
    /// appended.
    pub async fn assemble_turn(
        &self,
        raw_user_text: &str,
        session: &mut Session,
    ) -> Result<AssembledTurn, NeumaError> {
        let mode = self.lookup_mode(&session.config.current_mode)?;
        let persona = self.lookup_persona(&session.config.current_persona)?;

        let prompt = normalize(raw_user_text);
        let hashtag = find_hashtag(&prompt).map(str::to_string);
        let mut warnings = Vec::new();

        let first_turn = session.conversation.is_empty();
        let mut preamble = Vec::new();
        if first_turn {
            if let Some(persona) = persona {
                tracing::debug!(persona = %persona.name, "injecting persona identity");
                preamble.extend(persona.identity_messages.iter().cloned());
            }
            if mode.expects_argument() && hashtag.is_none() {
                warnings.push(AssemblyWarning::MissingHashtag {
                    mode: mode.name.clone(),
                });
            }
            if let Some(instruction) = mode.instruction(hashtag.as_deref()) {
                tracing::debug!(mode = %mode.name, "injecting mode instruction");
                preamble.push(Message::system(instruction));
            }
        }

        let resolution = self.resolver.resolve(&prompt).await;
        warnings.extend(
            resolution
                .unresolved
                .into_iter()
                .map(AssemblyWarning::DirectiveUnresolved),
        );

        for message in preamble {
            session.conversation.push(message);
        }
        session.conversation.add_user_message(resolution.text);

        Ok(AssembledTurn {
            messages: session.conversation.to_vec(),
            prompt,
            hashtag,
            warnings,
        })
    }

    fn lookup_mode(&self, name: &str) -> Result<&Mode, NeumaError> {
        self.modes
            .get(name)
            .ok_or_else(|| NeumaError::UnknownMode(name.to_string()))
    }

    fn lookup_persona(&self, name: &str) -> Result<Option<&Persona>, NeumaError> {
        if name.is_empty() {
            return Ok(None);
        }
        self.personas
            .get(name)
            .map(Some)
            .ok_or_else(|| NeumaError::UnknownPersona(name.to_string()))
    }
}
