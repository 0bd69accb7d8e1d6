use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use neuma_core::config::Settings;
use neuma_core::prompt::{FsFileReader, HttpWebFetcher};
use neuma_core::store::OpenAIEmbedder;
use neuma_core::{ConversationStore, LocalStoreCatalog, OpenAIClient, Pipeline};

use crate::commands::{handle_command, CommandResult};
use crate::render::render_outcome;

/// Selections given on the command line, applied after the pipeline is built.
#[derive(Debug, Default, Clone)]
pub struct StartupOptions {
    pub mode: Option<String>,
    pub persona: Option<String>,
    pub store: Option<String>,
}

/// Everything the front end drives besides the pipeline itself.
struct App {
    pipeline: Pipeline,
    llm: Arc<OpenAIClient>,
    stores: Arc<LocalStoreCatalog>,
    conversations: ConversationStore,
    /// Rendered text of the most recent answer, for `/copy`.
    last_output: Option<String>,
}

impl App {
    fn build(settings: &Settings, options: &StartupOptions) -> Result<Self> {
        let llm = Arc::new(settings.build_llm_client()?);

        let api_key = settings.api_key().unwrap_or_default();
        let mut embedder = OpenAIEmbedder::new(api_key, settings.embeddings.model.clone());
        if let Some(base_url) = &settings.openai.base_url {
            embedder = embedder.with_base_url(base_url.clone());
        }
        let stores = Arc::new(LocalStoreCatalog::new(
            settings.vector_db.persist_folder.clone(),
            Arc::new(embedder),
        ));
        let conversations = ConversationStore::with_dir(settings.conversations.data_folder.clone())?;

        let mut pipeline = Pipeline::from_settings(
            settings,
            llm.clone(),
            stores.clone(),
            Arc::new(FsFileReader),
            Arc::new(HttpWebFetcher::new()),
        );
        if let Some(mode) = &options.mode {
            pipeline.set_mode(mode)?;
        }
        if let Some(persona) = &options.persona {
            pipeline.set_persona(persona)?;
        }
        if let Some(store) = &options.store {
            stores.ensure(store)?;
            pipeline.set_vector_store(store);
        }

        Ok(Self {
            pipeline,
            llm,
            stores,
            conversations,
            last_output: None,
        })
    }

    async fn ask(&mut self, input: &str) {
        match self.pipeline.run_turn(input).await {
            Ok(outcome) => {
                let rendered = render_outcome(&outcome);
                println!("{rendered}");
                self.last_output = Some(outcome.artifact.to_plain_string());
            }
            Err(e) if e.is_turn_local() => eprintln!("Error: {e} (the conversation is kept)"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    /// Apply one command. Returns `false` when the session should end.
    async fn apply(&mut self, command: CommandResult) -> bool {
        let message = match command {
            CommandResult::Quit => return false,
            CommandResult::NotACommand => return true,
            CommandResult::Message(text) => text,
            CommandResult::NewConversation => {
                self.pipeline.new_conversation();
                self.last_output = None;
                "Started a new conversation.".to_string()
            }
            CommandResult::ShowStatus => self.status(),
            CommandResult::Mode(None) => format!("Mode: {}", self.pipeline.config().current_mode),
            CommandResult::Mode(Some(name)) => report(
                self.pipeline.set_mode(&name),
                format!("Mode set to {name}."),
            ),
            CommandResult::ListModes => list("Modes", self.pipeline.mode_names()),
            CommandResult::Persona(None) => {
                let persona = &self.pipeline.config().current_persona;
                if persona.is_empty() {
                    "No persona.".to_string()
                } else {
                    format!("Persona: {persona}")
                }
            }
            CommandResult::Persona(Some(name)) => report(
                self.pipeline.set_persona(&name),
                format!("Persona set to {name}."),
            ),
            CommandResult::ListPersonas => list("Personae", self.pipeline.persona_names()),
            CommandResult::SetTemperature(value) => report(
                self.pipeline.set_temperature(value),
                format!("Temperature set to {value}."),
            ),
            CommandResult::SetTopP(value) => report(
                self.pipeline.set_top_p(value),
                format!("top_p set to {value}."),
            ),
            CommandResult::SetMaxTokens(value) => report(
                self.pipeline.set_max_tokens(value),
                format!("max_tokens set to {value}."),
            ),
            CommandResult::ModelChanged(model) => report(
                self.pipeline.set_model(&model),
                format!("Model set to {model}."),
            ),
            CommandResult::ListModels => match self.llm.list_models().await {
                Ok(models) => list("Models", models.iter().map(String::as_str).collect()),
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::SelectStore(name) => match self.stores.ensure(&name) {
                Ok(_) => {
                    self.pipeline.set_vector_store(&name);
                    format!("Answering from vector store {name}.")
                }
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::DisableStore => {
                self.pipeline.clear_vector_store();
                "Answering directly.".to_string()
            }
            CommandResult::ListStores => match self.stores.list() {
                Ok(names) => list("Vector stores", names.iter().map(String::as_str).collect()),
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::TrashStore(name) => match self.stores.trash(&name) {
                Ok(()) => {
                    if self.pipeline.config().active_vector_store == name {
                        self.pipeline.clear_vector_store();
                    }
                    format!("Vector store {name} deleted.")
                }
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::SaveConversation(name) => report(
                self.conversations.save(&name, self.pipeline.conversation()),
                format!("Conversation saved as {name}."),
            ),
            CommandResult::OpenConversation(name) => match self.conversations.load(&name) {
                Ok(state) => {
                    let count = state.len();
                    self.pipeline.restore_conversation(state);
                    self.last_output = None;
                    format!("Opened {name} ({count} messages).")
                }
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::ListConversations => match self.conversations.list() {
                Ok(names) => list("Conversations", names.iter().map(String::as_str).collect()),
                Err(e) => format!("Error: {e}"),
            },
            CommandResult::TrashConversation(name) => report(
                self.conversations.delete(&name),
                format!("Conversation {name} deleted."),
            ),
            CommandResult::CopyLast => {
                let text = self.last_output.clone().or_else(|| {
                    self.pipeline
                        .conversation()
                        .last_answer()
                        .map(|m| m.content.clone())
                });
                match text {
                    Some(text) => copy_to_clipboard(&text, "Copied the last answer."),
                    None => "Nothing to copy yet.".to_string(),
                }
            }
            CommandResult::CopyAll => copy_to_clipboard(
                &self.pipeline.conversation().transcript(),
                "Copied the conversation.",
            ),
        };
        println!("{message}");
        true
    }

    fn status(&self) -> String {
        let config = self.pipeline.config();
        let usage = self.pipeline.usage();
        let store = if config.uses_retrieval() {
            config.active_vector_store.as_str()
        } else {
            "(direct)"
        };
        let persona = if config.has_persona() {
            config.current_persona.as_str()
        } else {
            "(none)"
        };
        format!(
            "Mode: {}\nPersona: {}\nModel: {}\nTemperature: {}  top_p: {}  max_tokens: {}\nVector store: {}\nMessages: {} (~{} tokens)\nRequests: {}  tokens used: {} ({} prompt, {} completion)",
            config.current_mode,
            persona,
            config.model,
            config.temperature,
            config.top_p,
            config.max_tokens,
            store,
            self.pipeline.conversation().len(),
            self.pipeline.conversation().estimate_tokens(),
            usage.request_count,
            usage.total_tokens(),
            usage.total_prompt_tokens,
            usage.total_completion_tokens,
        )
    }
}

fn report<E: std::fmt::Display>(result: std::result::Result<(), E>, ok: String) -> String {
    match result {
        Ok(()) => ok,
        Err(e) => format!("Error: {e}"),
    }
}

fn list(title: &str, names: Vec<&str>) -> String {
    if names.is_empty() {
        format!("{title}: none")
    } else {
        format!("{title}:\n  {}", names.join("\n  "))
    }
}

fn copy_to_clipboard(text: &str, done: &str) -> String {
    let copied = arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string()));
    match copied {
        Ok(()) => done.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "clipboard unavailable");
            format!("Error: clipboard unavailable: {e}")
        }
    }
}

// ── Single prompt ───────────────────────────────────────────────────────

pub async fn run_single_prompt(
    settings: &Settings,
    options: &StartupOptions,
    input: &str,
) -> Result<()> {
    let mut app = App::build(settings, options)?;
    let outcome = app
        .pipeline
        .run_turn(input)
        .await
        .context("query failed")?;
    println!("{}", render_outcome(&outcome));
    Ok(())
}

// ── Interactive loop ────────────────────────────────────────────────────

pub async fn run_repl(settings: Settings, options: StartupOptions) -> Result<()> {
    let mut app = App::build(&settings, &options)?;
    println!("neuma v{}. Type /help for commands.", env!("CARGO_PKG_VERSION"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match handle_command(input) {
            CommandResult::NotACommand => app.ask(input).await,
            command => {
                if !app.apply(command).await {
                    break;
                }
            }
        }
    }

    Ok(())
}
