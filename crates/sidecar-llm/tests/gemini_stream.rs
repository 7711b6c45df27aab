use futures::StreamExt;
use sidecar_core::{ModelType, Part, Turn, TurnRole};
use sidecar_llm::{GeminiProvider, GenerationRequest, LLMError, LLMProvider};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn network_tests_disabled() -> bool {
    std::env::var_os("CODEX_SANDBOX_NETWORK_DISABLED").is_some()
}

#[tokio::test]
async fn smart_turn_streams_text_images_and_sources() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"weighing options\",\"thought\":true}],\"role\":\"model\"}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Here is a diagram\"}],\"role\":\"model\"}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"inlineData\":{\"mimeType\":\"image/png\",\"data\":\"UE5H\"}}],\"role\":\"model\"}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[],\"role\":\"model\"},\"groundingMetadata\":{\"groundingChunks\":[{\"web\":{\"uri\":\"https://docs.rs\",\"title\":\"Docs\"}}]}}]}\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-image-preview:streamGenerateContent"))
        .and(body_partial_json(serde_json::json!({
            "tools": [{"googleSearch": {}}],
            "generationConfig": {"thinkingConfig": {"thinkingBudget": 1024}},
            "systemInstruction": {"parts": [{"text": "Be brief"}]}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("key", ModelType::Smart, vec![Part::text("draw it")])
        .with_system_instruction("Be brief")
        .with_history(vec![Turn::new(TurnRole::User, vec![Part::text("context")])])
        .with_search(true);

    let provider = GeminiProvider::new().with_base_url(server.uri());
    let chunks: Vec<_> = provider
        .chat_stream(&request, CancellationToken::new())
        .await
        .expect("stream")
        .collect()
        .await;

    let chunks: Vec<_> = chunks.into_iter().map(|chunk| chunk.expect("chunk")).collect();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text.as_deref(), Some("Here is a diagram"));
    assert_eq!(chunks[1].attachments[0].name, "generated-image-1.png");
    assert!(chunks[2].grounding_metadata.is_some());
}

#[tokio::test]
async fn embedded_error_event_ends_stream_with_api_error() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"partial\"}],\"role\":\"model\"}}]}\n\n",
        "data: {\"error\":{\"code\":429,\"message\":\"Resource exhausted\"}}\n\n",
    );

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let provider = GeminiProvider::new().with_base_url(server.uri());
    let request = GenerationRequest::new("key", ModelType::Fast, vec![Part::text("hi")]);
    let mut stream = provider
        .chat_stream(&request, CancellationToken::new())
        .await
        .expect("stream");

    let first = stream.next().await.expect("first item").expect("chunk");
    assert_eq!(first.text.as_deref(), Some("partial"));

    let second = stream.next().await.expect("second item");
    match second {
        Err(LLMError::Api(message)) => assert_eq!(message, "Resource exhausted"),
        other => panic!("expected an API error, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn cancelling_ends_stream_early() {
    if network_tests_disabled() {
        return;
    }

    let server = MockServer::start().await;
    let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"one\"}],\"role\":\"model\"}}]}\n\n";
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let provider = GeminiProvider::new().with_base_url(server.uri());
    let cancel = CancellationToken::new();
    let request = GenerationRequest::new("key", ModelType::Fast, vec![Part::text("hi")]);
    let mut stream = provider
        .chat_stream(&request, cancel.clone())
        .await
        .expect("stream");

    cancel.cancel();
    assert!(stream.next().await.is_none());
}
