use super::mocks::*;
use crate::error::ChatError;
use crate::session::SendOutcome;
use axum::http::StatusCode;
use llm::{ApiError, ConversationTurn, OpenAIClient, ProviderId};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use web::{RelayClient, RelayError};

fn openai_frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

fn form_field(name: &str, value: &str) -> Matcher {
    Matcher::Regex(format!(r#"name="{name}"\r\n\r\n{value}\r\n"#))
}

fn no_relay() -> RelayClient {
    RelayClient::new("")
}

#[tokio::test]
async fn openai_answer_is_streamed_and_recorded() {
    let body = [
        openai_frame("Ulán"),
        openai_frame(" Bator"),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();
    let (base_url, requests) =
        create_mock_server(StatusCode::OK, "text/event-stream", body).await;

    let provider = Arc::new(OpenAIClient::new(
        "openai-key".to_string(),
        OpenAIClient::default_model(),
        base_url,
    ));
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::OpenAI,
        provider,
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );

    let observer = RecordingObserver::default();
    let first = session
        .send("hola", &observer, CancellationToken::new())
        .await;
    assert!(matches!(first, SendOutcome::Completed(ref text) if text == "Ulán Bator"));
    assert_eq!(session.history().len(), 2);

    let observer = RecordingObserver::default();
    let outcome = session
        .send("capital of Mongolia", &observer, CancellationToken::new())
        .await;

    match outcome {
        SendOutcome::Completed(text) => assert_eq!(text, "Ulán Bator"),
        other => panic!("Expected completion, got {other:?}"),
    }
    assert_eq!(observer.text(), "Ulán Bator");
    assert_eq!(
        observer.events().last(),
        Some(&Observed::Complete("Ulán Bator".to_string()))
    );

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let request = &requests[1];
    assert_eq!(request.path, "chat/completions");
    assert_eq!(request.authorization.as_deref(), Some("Bearer openai-key"));
    assert_eq!(request.body["model"], "gpt-4o");
    assert_eq!(request.body["stream"], true);
    assert_eq!(
        request.body["messages"],
        json!([
            {"role": "user", "content": "hola"},
            {"role": "assistant", "content": "Ulán Bator"},
            {
                "role": "user",
                "content": format!("System Preamble: Current date is {FIXED_DATE}.\n\ncapital of Mongolia")
            }
        ])
    );

    assert_eq!(
        session.history(),
        &[
            ConversationTurn::user("hola"),
            ConversationTurn::assistant("Ulán Bator"),
            ConversationTurn::user("capital of Mongolia"),
            ConversationTurn::assistant("Ulán Bator"),
        ]
    );
    assert!(!session.is_busy());
}

#[tokio::test]
async fn completed_conversations_are_saved() {
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::Ollama,
        ScriptedProvider::replying(&["Ulán Bator"]),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );

    session
        .send("capital of Mongolia", &RecordingObserver::default(), CancellationToken::new())
        .await;

    let records = session.conversations().list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, session.conversation_id());
    assert_eq!(records[0].title, "capital of Mongolia...");
    assert_eq!(records[0].model, "ollama");
    assert_eq!(records[0].history.len(), 2);
}

#[tokio::test]
async fn empty_prompts_are_ignored() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::replying(&["nada"]);
    let mut session = session_with(
        ProviderId::Gemini,
        provider.clone(),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );

    let outcome = session
        .send("  \n ", &RecordingObserver::default(), CancellationToken::new())
        .await;

    assert!(matches!(outcome, SendOutcome::Ignored));
    assert!(session.history().is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn provider_failure_keeps_the_user_turn() {
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::OpenRouter,
        ScriptedProvider::failing(|| ApiError::Provider {
            provider: "openrouter",
            status: 500,
            message: "upstream error".to_string(),
        }),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );
    let observer = RecordingObserver::default();

    let outcome = session
        .send("hola", &observer, CancellationToken::new())
        .await;

    assert!(matches!(
        outcome,
        SendOutcome::Failed(ChatError::Provider { status: 500, .. })
    ));
    assert_eq!(session.history(), &[ConversationTurn::user("hola")]);
    assert!(!session.is_busy());
    assert!(session.conversations().list().unwrap().is_empty());
    assert_eq!(
        observer.events(),
        vec![Observed::Error(
            "openrouter request failed with status 500: upstream error".to_string()
        )]
    );
}

#[tokio::test]
async fn bodiless_provider_response_reaches_the_observer() {
    let (base_url, requests) =
        create_mock_server(StatusCode::NO_CONTENT, "text/event-stream", String::new()).await;
    let provider = Arc::new(OpenAIClient::new(
        "openai-key".to_string(),
        OpenAIClient::default_model(),
        base_url,
    ));
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::OpenAI,
        provider,
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );
    let observer = RecordingObserver::default();

    let outcome = session
        .send("hola", &observer, CancellationToken::new())
        .await;

    assert!(matches!(outcome, SendOutcome::Failed(ChatError::Protocol(_))));
    assert_eq!(requests.lock().unwrap().len(), 1);
    assert_eq!(session.history(), &[ConversationTurn::user("hola")]);
    assert!(!session.is_busy());
    assert_eq!(
        observer.events(),
        vec![Observed::Error(
            "Protocol error: response does not contain a body to read".to_string()
        )]
    );
}

#[tokio::test]
async fn unregistered_model_reaches_the_observer() {
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::Gemini,
        ScriptedProvider::replying(&["hola"]),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );
    session.set_provider(ProviderId::Ollama);
    let observer = RecordingObserver::default();

    let outcome = session
        .send("hola", &observer, CancellationToken::new())
        .await;

    assert!(matches!(outcome, SendOutcome::Failed(ChatError::Config(_))));
    assert_eq!(
        observer.events(),
        vec![Observed::Error(
            "Configuration error: model 'ollama' not recognized".to_string()
        )]
    );
}

#[tokio::test]
async fn search_mode_is_consumed_by_a_successful_send() {
    let mut server = mockito::Server::new_async().await;
    let relay_mock = server
        .mock("POST", "/")
        .match_body(form_field("query", "xyzzy123"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"success": true, "data": {"count": 0, "results": []}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::replying(&["No encontré nada."]);
    let mut session = session_with(
        ProviderId::Gemini,
        provider.clone(),
        RelayClient::new(server.url()).allow_plain_http(),
        unreachable_rewriter(),
        dir.path(),
    );

    assert!(session.toggle_search());
    let outcome = session
        .send("xyzzy123", &RecordingObserver::default(), CancellationToken::new())
        .await;

    assert!(matches!(outcome, SendOutcome::Completed(_)));
    assert!(!session.search_mode());
    relay_mock.assert_async().await;

    // The rewrite failed, so the original text was the query and reached the model
    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0]
        .prompt
        .contains("Resultados de búsqueda en Internet:\nNo se encontraron resultados para \"xyzzy123\".\n"));
    assert!(calls[0]
        .prompt
        .ends_with("**Pregunta original del usuario:** \"xyzzy123\""));
    assert!(calls[0].history.is_empty());

    // Next send goes out without search
    session
        .send("gracias", &RecordingObserver::default(), CancellationToken::new())
        .await;
    assert!(provider.calls()[1]
        .prompt
        .starts_with("System Preamble: Current date is"));
}

#[tokio::test]
async fn search_failure_aborts_the_send_and_consumes_search_mode() {
    let mut server = mockito::Server::new_async().await;
    let _relay_mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": false,
                "error": {"code": 400, "message": "Para 'websearch', se requiere el parámetro \"query\"."}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::replying(&["no debería llegar"]);
    let mut session = session_with(
        ProviderId::Gemini,
        provider.clone(),
        RelayClient::new(server.url()).allow_plain_http(),
        unreachable_rewriter(),
        dir.path(),
    );
    session.toggle_search();
    let observer = RecordingObserver::default();

    let outcome = session
        .send("busca algo", &observer, CancellationToken::new())
        .await;

    match outcome {
        SendOutcome::Failed(ChatError::Search(RelayError::Rejected { message, .. })) => {
            assert_eq!(message, "Para 'websearch', se requiere el parámetro \"query\".")
        }
        other => panic!("Expected search failure, got {other:?}"),
    }
    assert!(provider.calls().is_empty());
    assert!(!session.search_mode());
    assert!(!session.is_busy());
    assert_eq!(session.history(), &[ConversationTurn::user("busca algo")]);
    assert!(matches!(observer.events().last(), Some(Observed::Error(_))));
}

#[tokio::test]
async fn cancelled_send_does_not_record_an_answer() {
    let dir = TempDir::new().unwrap();
    let chunks: Vec<String> = (0..50).map(|i| format!("parte {i} ")).collect();
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
    let mut session = session_with(
        ProviderId::Gemini,
        ScriptedProvider::slow(&chunk_refs, Duration::from_millis(20)),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    });

    let outcome = session
        .send("cuéntame algo largo", &RecordingObserver::default(), cancel)
        .await;

    assert!(matches!(outcome, SendOutcome::Failed(ChatError::Cancelled)));
    assert_eq!(session.history().len(), 1);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn conversations_can_be_switched() {
    let dir = TempDir::new().unwrap();
    let mut session = session_with(
        ProviderId::Gemini,
        ScriptedProvider::replying(&["Ulán Bator"]),
        no_relay(),
        unreachable_rewriter(),
        dir.path(),
    );

    session
        .send("capital of Mongolia", &RecordingObserver::default(), CancellationToken::new())
        .await;
    let first_id = session.conversation_id().to_string();

    tokio::time::sleep(Duration::from_millis(5)).await;
    session.new_conversation();
    assert!(session.history().is_empty());
    assert_ne!(session.conversation_id(), first_id);

    session.set_provider(ProviderId::Ollama);
    assert!(session.load_conversation(&first_id).unwrap());
    assert_eq!(session.conversation_id(), first_id);
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.provider(), ProviderId::Gemini);

    assert!(!session.load_conversation("does-not-exist").unwrap());
}
