/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Quit the application.
    Quit,
    /// Not a command - treat as regular input.
    NotACommand,
    /// Start a fresh conversation.
    NewConversation,
    /// Show status (mode, persona, sampling, tokens).
    ShowStatus,
    /// Show the current mode, or switch to the named one.
    Mode(Option<String>),
    ListModes,
    /// Show the current persona, or switch to the named one.
    Persona(Option<String>),
    ListPersonas,
    SetTemperature(f32),
    SetTopP(f32),
    SetMaxTokens(u32),
    /// Change the model.
    ModelChanged(String),
    /// List models offered by the provider.
    ListModels,
    /// Select a vector store by name.
    SelectStore(String),
    /// Go back to direct completion.
    DisableStore,
    ListStores,
    TrashStore(String),
    /// Save current conversation under a name.
    SaveConversation(String),
    /// Open a saved conversation by name.
    OpenConversation(String),
    /// List saved conversations.
    ListConversations,
    TrashConversation(String),
    /// Copy the last answer to the clipboard.
    CopyLast,
    /// Copy the whole conversation to the clipboard.
    CopyAll,
}

fn usage(text: &str) -> CommandResult {
    CommandResult::Message(format!("Usage: {text}"))
}

fn parse_number<T: std::str::FromStr>(
    arg: &str,
    usage_text: &str,
    build: impl FnOnce(T) -> CommandResult,
) -> CommandResult {
    if arg.is_empty() {
        return usage(usage_text);
    }
    match arg.parse::<T>() {
        Ok(value) => build(value),
        Err(_) => CommandResult::Message(format!("Not a number: {arg}")),
    }
}

fn required(arg: &str, usage_text: &str, build: impl FnOnce(String) -> CommandResult) -> CommandResult {
    if arg.is_empty() {
        usage(usage_text)
    } else {
        build(arg.to_string())
    }
}

fn optional(arg: &str) -> Option<String> {
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

pub fn handle_command(input: &str) -> CommandResult {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/new" => CommandResult::NewConversation,
        "/status" => CommandResult::ShowStatus,

        // Prompt shaping
        "/mode" => CommandResult::Mode(optional(arg)),
        "/modes" => CommandResult::ListModes,
        "/persona" => CommandResult::Persona(optional(arg)),
        "/personas" => CommandResult::ListPersonas,

        // Sampling
        "/temp" | "/temperature" => {
            parse_number(arg, "/temp <0.0-2.0>", CommandResult::SetTemperature)
        }
        "/top-p" => parse_number(arg, "/top-p <0.0-1.0>", CommandResult::SetTopP),
        "/max-tokens" => parse_number(arg, "/max-tokens <n>", CommandResult::SetMaxTokens),
        "/model" => required(arg, "/model <model-name>", CommandResult::ModelChanged),
        "/models" => CommandResult::ListModels,

        // Vector stores
        "/db" => match arg {
            "" => usage("/db <store-name> | /db off"),
            "off" | "none" => CommandResult::DisableStore,
            name => CommandResult::SelectStore(name.to_string()),
        },
        "/dbs" => CommandResult::ListStores,
        "/db-trash" => required(arg, "/db-trash <store-name>", CommandResult::TrashStore),

        // Conversation commands
        "/save" => required(arg, "/save <name>", CommandResult::SaveConversation),
        "/open" | "/load" => required(arg, "/open <name>", CommandResult::OpenConversation),
        "/conversations" | "/history" => CommandResult::ListConversations,
        "/trash" => required(arg, "/trash <name>", CommandResult::TrashConversation),

        // Clipboard
        "/copy" => CommandResult::CopyLast,
        "/copy-all" => CommandResult::CopyAll,

        "/version" => CommandResult::Message(format!("neuma v{}", env!("CARGO_PKG_VERSION"))),

        // Unknown command
        _ => {
            if input.starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
neuma commands

  CONVERSATION
    /new                      Start a fresh conversation
    /save <name>              Save the current conversation
    /open <name>              Open a saved conversation
    /conversations            List saved conversations
    /trash <name>             Delete a saved conversation
    /copy                     Copy the last answer to the clipboard
    /copy-all                 Copy the whole conversation to the clipboard

  PROMPT
    /mode [name]              Show or set the response mode
    /modes                    List modes
    /persona [name]           Show or set the persona
    /personas                 List personae

  MODEL
    /model <name>             Change model
    /models                   List models offered by the provider
    /temp <x>                 Set temperature (0-2)
    /top-p <x>                Set top_p (0-1)
    /max-tokens <n>           Set the completion token limit

  KNOWLEDGE
    /db <name>                Answer from a vector store
    /db off                   Back to direct answers
    /dbs                      List vector stores
    /db-trash <name>          Delete a vector store

  OTHER
    /status                   Show mode, persona, sampling and token usage
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit

  DIRECTIVES
    ~{f:path}~                Insert the contents of a file
    ~{w:url}~                 Insert the text of a web page
    #word                     Argument for code and csv modes";

    CommandResult::Message(help_text.into())
}
