use neuma_core::prompt::{FetchedPage, FileReader, WebFetcher};
use neuma_core::store::{RetrievedChunk, VectorStore, VectorStoreProvider};
use neuma_core::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ========================================================================
// Mock collaborators
// ========================================================================

/// Mock LLM that replays scripted replies and records every request.
struct MockLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlm {
    fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        messages: &[Message],
        _params: &SamplingParams,
    ) -> Result<Completion, NeumaError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Mock response".to_string()));
        match reply {
            Ok(content) => Ok(Completion {
                content,
                usage: Some(TokenUsage::new(10, 5)),
            }),
            Err(message) => Err(NeumaError::Provider(message)),
        }
    }
}

struct MockStore {
    chunks: Vec<RetrievedChunk>,
}

#[async_trait::async_trait]
impl VectorStore for MockStore {
    async fn similarity_search(
        &self,
        _query_text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, NeumaError> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

/// Serves one store per name; unknown names fail like a missing store.
struct MockStores {
    stores: HashMap<String, Vec<RetrievedChunk>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockStores {
    fn empty() -> Self {
        Self {
            stores: HashMap::new(),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_store(name: &str, chunks: Vec<RetrievedChunk>) -> Self {
        let mut stores = Self::empty();
        stores.stores.insert(name.to_string(), chunks);
        stores
    }
}

#[async_trait::async_trait]
impl VectorStoreProvider for MockStores {
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorStore>, NeumaError> {
        self.queries.lock().unwrap().push(name.to_string());
        match self.stores.get(name) {
            Some(chunks) => Ok(Arc::new(MockStore {
                chunks: chunks.clone(),
            })),
            None => Err(NeumaError::Store(format!("Store not found: {}", name))),
        }
    }
}

#[derive(Default)]
struct MockFiles {
    files: HashMap<String, String>,
}

#[async_trait::async_trait]
impl FileReader for MockFiles {
    async fn read(&self, path: &str) -> Result<String, NeumaError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| NeumaError::Other(format!("Not a file: {}", path)))
    }
}

#[derive(Default)]
struct MockWeb {
    pages: HashMap<String, FetchedPage>,
}

#[async_trait::async_trait]
impl WebFetcher for MockWeb {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, NeumaError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| NeumaError::Other(format!("connection refused: {}", url)))
    }
}

// ========================================================================
// Fixtures
// ========================================================================

fn modes() -> ModeRegistry {
    let mut registry = ModeRegistry::new();
    registry.insert(Mode::new("normal", ""));
    registry.insert(Mode::new("table", "Answer only with a table."));
    registry.insert(Mode::new("code", "Answer only with # code."));
    registry.insert(Mode::new("csv", "Answer only with CSV data."));
    registry
}

fn personas() -> PersonaStore {
    PersonaStore::from_personae(vec![
        Persona::new(
            "default",
            0.7,
            vec![
                Message::system("You are Neuma."),
                Message::assistant("Understood."),
            ],
        ),
        Persona::new("pirate", 1.4, vec![Message::system("Talk like a pirate.")]),
    ])
}

fn session_config() -> ActiveSessionConfig {
    ActiveSessionConfig {
        current_mode: "normal".into(),
        current_persona: "default".into(),
        active_vector_store: String::new(),
        model: "gpt-test".into(),
        temperature: 1.0,
        top_p: 1.0,
        max_tokens: 256,
    }
}

struct Harness {
    pipeline: Pipeline,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    store_opens: Arc<Mutex<Vec<String>>>,
}

fn harness_with(llm: MockLlm, stores: MockStores, files: MockFiles, web: MockWeb) -> Harness {
    let requests = llm.requests.clone();
    let store_opens = stores.queries.clone();
    let assembler = PromptAssembler::new(
        Arc::new(personas()),
        Arc::new(modes()),
        DirectiveResolver::new(Arc::new(files), Arc::new(web)),
    );
    let dispatcher = QueryDispatcher::new(Arc::new(llm), Arc::new(stores));
    Harness {
        pipeline: Pipeline::new(assembler, dispatcher, session_config()),
        requests,
        store_opens,
    }
}

fn harness(replies: Vec<Result<&str, &str>>) -> Harness {
    harness_with(
        MockLlm::new(replies),
        MockStores::empty(),
        MockFiles::default(),
        MockWeb::default(),
    )
}

fn chunk(content: &str, source: &str) -> RetrievedChunk {
    RetrievedChunk {
        content: content.into(),
        source: source.into(),
        score: 0.9,
    }
}

// ========================================================================
// Prompt assembly
// ========================================================================

#[tokio::test]
async fn test_prompt_gets_terminal_period() {
    let mut h = harness(vec![Ok("Hi there")]);
    h.pipeline.run_turn("hello").await.unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.last().unwrap(), &Message::user("hello."));
}

#[tokio::test]
async fn test_existing_terminator_is_kept() {
    let mut h = harness(vec![Ok("Fine")]);
    h.pipeline.run_turn("how are you?").await.unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.last().unwrap().content, "how are you?");
}

#[tokio::test]
async fn test_persona_and_mode_injected_once() {
    let mut h = harness(vec![Ok("first"), Ok("second")]);
    h.pipeline.set_mode("table").unwrap();

    h.pipeline.run_turn("list planets").await.unwrap();
    h.pipeline.run_turn("add moons").await.unwrap();

    let conversation = h.pipeline.conversation();
    let contents: Vec<&str> = conversation
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec![
            "You are Neuma.",
            "Understood.",
            "Answer only with a table.",
            "list planets.",
            "first",
            "add moons.",
            "second",
        ]
    );
    assert_eq!(conversation.messages()[1].role, Role::Assistant);
    assert_eq!(conversation.messages()[2].role, Role::System);
}

#[tokio::test]
async fn test_first_turn_sends_preamble_then_user_message() {
    let mut h = harness(vec![Ok("ok")]);
    h.pipeline.run_turn("hi").await.unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].content, "You are Neuma.");
    assert_eq!(sent[2], Message::user("hi."));
}

#[tokio::test]
async fn test_code_mode_substitutes_hashtag() {
    let mut h = harness(vec![Ok("```\nprint(1)\n```")]);
    h.pipeline.set_mode("code").unwrap();

    let outcome = h.pipeline.run_turn("write a #python loop").await.unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert!(sent
        .iter()
        .any(|m| m.role == Role::System && m.content == "Answer only with python code."));
    assert_eq!(
        outcome.artifact,
        DisplayArtifact::CodeBlock {
            language: Some("python".into()),
            code: "\nprint(1)\n".into(),
        }
    );
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_missing_hashtag_warns_and_keeps_template() {
    let mut h = harness(vec![Ok("print(1)")]);
    h.pipeline.set_mode("code").unwrap();

    let outcome = h.pipeline.run_turn("write a loop").await.unwrap();

    assert!(outcome
        .warnings
        .contains(&TurnWarning::MissingHashtag { mode: "code".into() }));
    let sent = &h.requests.lock().unwrap()[0];
    assert!(sent.iter().any(|m| m.content == "Answer only with # code."));
}

#[tokio::test]
async fn test_unknown_persona_fails_before_appending() {
    let mut h = harness(vec![]);
    assert!(matches!(
        h.pipeline.set_persona("ghost"),
        Err(NeumaError::UnknownPersona(_))
    ));
    assert!(h.pipeline.conversation().is_empty());
}

// ========================================================================
// Directives
// ========================================================================

#[tokio::test]
async fn test_file_directive_spliced_in() {
    let mut files = MockFiles::default();
    files
        .files
        .insert("notes.txt".into(), "buy milk".into());
    let mut h = harness_with(
        MockLlm::new(vec![Ok("done")]),
        MockStores::empty(),
        files,
        MockWeb::default(),
    );

    let outcome = h
        .pipeline
        .run_turn("summarize ~{f:notes.txt}~ briefly")
        .await
        .unwrap();

    assert!(outcome.warnings.is_empty());
    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.last().unwrap().content, "summarize buy milk briefly.");
}

#[tokio::test]
async fn test_missing_file_leaves_text_unchanged() {
    let mut h = harness(vec![Ok("done")]);

    let outcome = h
        .pipeline
        .run_turn("summarize ~{f:missing.txt}~ please")
        .await
        .unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(
        sent.last().unwrap().content,
        "summarize ~{f:missing.txt}~ please."
    );
    assert!(matches!(
        &outcome.warnings[..],
        [TurnWarning::DirectiveUnresolved(d)] if d.target == "missing.txt"
    ));
}

#[tokio::test]
async fn test_web_directive_truncated_and_collapsed() {
    let body = "word   \n\t ".repeat(1000);
    let mut web = MockWeb::default();
    web.pages.insert(
        "https://example.com".into(),
        FetchedPage {
            status: 200,
            html: format!(
                "<html><head><script>var x = 1;</script></head><body><p>{}</p></body></html>",
                body
            ),
        },
    );
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        MockStores::empty(),
        MockFiles::default(),
        web,
    );

    h.pipeline
        .run_turn("~{w:https://example.com}~")
        .await
        .unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    let content = &sent.last().unwrap().content;
    // Spliced page text plus the appended period.
    let page_text = content.strip_suffix('.').unwrap();
    assert_eq!(page_text.chars().count(), 3000);
    assert!(page_text.starts_with("word word"));
    assert!(!page_text.contains("  "));
    assert!(!page_text.contains('\n'));
    assert!(!page_text.contains("var x"));
}

#[tokio::test]
async fn test_web_error_status_is_unresolved() {
    let mut web = MockWeb::default();
    web.pages.insert(
        "https://example.com/gone".into(),
        FetchedPage {
            status: 404,
            html: "<p>Not found</p>".into(),
        },
    );
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        MockStores::empty(),
        MockFiles::default(),
        web,
    );

    let outcome = h
        .pipeline
        .run_turn("read ~{w:https://example.com/gone}~")
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(
        sent.last().unwrap().content,
        "read ~{w:https://example.com/gone}~."
    );
}

#[tokio::test]
async fn test_only_first_file_directive_resolved() {
    let mut files = MockFiles::default();
    files.files.insert("a.txt".into(), "AAA".into());
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        MockStores::empty(),
        files,
        MockWeb::default(),
    );

    let outcome = h
        .pipeline
        .run_turn("x ~{f:a.txt}~ y ~{f:a.txt}~ z")
        .await
        .unwrap();

    assert!(outcome.warnings.is_empty());
    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.last().unwrap().content, "x AAA y ~{f:a.txt}~ z.");
}

#[tokio::test]
async fn test_web_directive_between_text_spliced_at_limit() {
    let mut web = MockWeb::default();
    web.pages.insert(
        "http://x".into(),
        FetchedPage {
            status: 200,
            html: format!("<body><div>{}</div></body>", "lorem  \n ipsum ".repeat(500)),
        },
    );
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        MockStores::empty(),
        MockFiles::default(),
        web,
    );

    h.pipeline
        .run_turn("prefix ~{w:http://x}~ suffix")
        .await
        .unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    let content = &sent.last().unwrap().content;
    let spliced = content
        .strip_prefix("prefix ")
        .and_then(|rest| rest.strip_suffix(" suffix."))
        .unwrap();
    assert_eq!(spliced.chars().count(), 3000);
    assert!(spliced.starts_with("lorem ipsum lorem"));
    assert!(!spliced.contains("  "));
    assert!(!spliced.contains('\n'));
}

// ========================================================================
// Dispatch
// ========================================================================

#[tokio::test]
async fn test_direct_path_appends_assistant_message() {
    let mut h = harness(vec![Ok("42")]);

    let outcome = h.pipeline.run_turn("answer").await.unwrap();

    assert_eq!(outcome.path, QueryPath::Direct);
    assert_eq!(
        h.pipeline.conversation().last_message(),
        Some(&Message::assistant("42"))
    );
    assert_eq!(outcome.usage.total_tokens, 15);
    assert_eq!(h.pipeline.usage().request_count, 1);
}

#[tokio::test]
async fn test_retrieval_path_never_appends_assistant_message() {
    let stores = MockStores::with_store(
        "papers",
        vec![
            chunk("alpha", "/docs/papers/alpha.pdf"),
            chunk("beta", "/docs/papers/beta.pdf"),
            chunk("alpha again", "/mirror/alpha.pdf"),
        ],
    );
    let mut h = harness_with(
        MockLlm::new(vec![Ok("The answer")]),
        stores,
        MockFiles::default(),
        MockWeb::default(),
    );
    h.pipeline.set_vector_store("papers");

    let outcome = h.pipeline.run_turn("what do the papers say").await.unwrap();

    assert_eq!(outcome.path, QueryPath::Retrieval);
    assert_eq!(outcome.sources, vec!["alpha.pdf", "beta.pdf"]);
    assert_eq!(outcome.raw_text, "The answer\n\nalpha.pdf\nbeta.pdf");
    assert_eq!(h.pipeline.conversation().count_role(Role::Assistant), 1);
    assert_eq!(
        h.pipeline.conversation().last_message().unwrap().role,
        Role::User
    );
    assert_eq!(*h.store_opens.lock().unwrap(), vec!["papers"]);
}

#[tokio::test]
async fn test_retrieval_query_is_serialized_conversation() {
    let stores = MockStores::with_store("papers", vec![chunk("alpha", "alpha.pdf")]);
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        stores,
        MockFiles::default(),
        MockWeb::default(),
    );
    h.pipeline.set_vector_store("papers");

    h.pipeline.run_turn("question").await.unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].role, Role::User);
    let decoded: Vec<Message> = serde_json::from_str(&sent[0].content).unwrap();
    assert_eq!(decoded.last().unwrap(), &Message::user("question."));
}

#[tokio::test]
async fn test_retrieval_context_placeholder_filled_with_chunks() {
    let stores = MockStores::with_store(
        "papers",
        vec![chunk("alpha", "a.pdf"), chunk("beta", "b.pdf")],
    );
    let mut h = harness_with(
        MockLlm::new(vec![Ok("ok")]),
        stores,
        MockFiles::default(),
        MockWeb::default(),
    );
    h.pipeline.set_vector_store("papers");

    h.pipeline
        .run_turn("Using {context} answer the question")
        .await
        .unwrap();

    let sent = &h.requests.lock().unwrap()[0];
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.contains("Using alpha\n\n---\n\nbeta answer the question."));
    assert!(!sent[0].content.contains("{context}"));
}

#[tokio::test]
async fn test_provider_failure_keeps_session_usable() {
    let mut h = harness(vec![Err("rate limited"), Ok("recovered")]);

    let err = h.pipeline.run_turn("first try").await.unwrap_err();
    assert!(matches!(err, NeumaError::Provider(_)));
    assert!(err.is_turn_local());
    assert_eq!(h.pipeline.conversation().count_role(Role::Assistant), 1);
    assert_eq!(
        h.pipeline.conversation().last_message(),
        Some(&Message::user("first try."))
    );

    let outcome = h.pipeline.run_turn("again").await.unwrap();
    assert_eq!(outcome.raw_text, "recovered");
}

#[tokio::test]
async fn test_store_failure_appends_nothing() {
    let mut h = harness(vec![Ok("never sent")]);
    h.pipeline.set_vector_store("missing");

    let err = h.pipeline.run_turn("question").await.unwrap_err();

    assert!(matches!(err, NeumaError::Store(_)));
    assert!(h.requests.lock().unwrap().is_empty());
    assert_eq!(h.pipeline.conversation().count_role(Role::Assistant), 1);
}

// ========================================================================
// Formatting through the pipeline
// ========================================================================

#[tokio::test]
async fn test_table_mode_builds_table() {
    let mut h = harness(vec![Ok("a|b\n---\n1|2\n3|4")]);
    h.pipeline.set_mode("table").unwrap();

    let outcome = h.pipeline.run_turn("numbers").await.unwrap();

    match outcome.artifact {
        DisplayArtifact::Table(table) => {
            assert_eq!(table.header, vec!["a", "b"]);
            assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
        }
        other => panic!("expected table, got {:?}", other),
    }
}

#[tokio::test]
async fn test_csv_mode_uses_hashtag_delimiter() {
    let mut h = harness(vec![Ok("1,2,3")]);
    h.pipeline.set_mode("csv").unwrap();

    let outcome = h.pipeline.run_turn("give me #; numbers").await.unwrap();

    assert_eq!(outcome.artifact, DisplayArtifact::CsvText("1;2;3".into()));
}

#[tokio::test]
async fn test_normal_mode_collapses_blank_lines() {
    let mut h = harness(vec![Ok("one\n\ntwo")]);

    let outcome = h.pipeline.run_turn("count").await.unwrap();

    assert_eq!(outcome.artifact, DisplayArtifact::PlainText("one\ntwo".into()));
}

// ========================================================================
// Session settings
// ========================================================================

#[test]
fn test_setters_validate_ranges() {
    let h = harness(vec![]);
    let mut pipeline = h.pipeline;

    assert!(pipeline.set_temperature(2.5).is_err());
    assert!(pipeline.set_temperature(-0.1).is_err());
    pipeline.set_temperature(0.2).unwrap();
    assert_eq!(pipeline.config().temperature, 0.2);

    assert!(pipeline.set_top_p(1.5).is_err());
    assert!(pipeline.set_max_tokens(0).is_err());
    assert!(pipeline.set_model("  ").is_err());
    assert!(matches!(
        pipeline.set_mode("poetry"),
        Err(NeumaError::UnknownMode(_))
    ));
    assert_eq!(pipeline.config().current_mode, "normal");
}

#[test]
fn test_persona_switch_applies_temperature() {
    let mut pipeline = harness(vec![]).pipeline;

    pipeline.set_persona("pirate").unwrap();
    assert_eq!(pipeline.config().current_persona, "pirate");
    assert_eq!(pipeline.config().temperature, 1.4);

    pipeline.set_persona("").unwrap();
    assert!(!pipeline.config().has_persona());
}

#[tokio::test]
async fn test_new_conversation_reinjects_preamble() {
    let mut h = harness(vec![Ok("a"), Ok("b")]);

    h.pipeline.run_turn("one").await.unwrap();
    h.pipeline.new_conversation();
    h.pipeline.run_turn("two").await.unwrap();

    let requests = h.requests.lock().unwrap();
    assert_eq!(requests[1][0].content, "You are Neuma.");
    assert_eq!(h.pipeline.conversation().len(), 4);
}
