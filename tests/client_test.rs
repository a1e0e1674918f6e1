//! End-to-end tests for client construction and completion flow.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use genai::{
    ChatMessage, ClientError, ClientFactory, GenerationOptions, PromptTemplate, SessionState,
};
use genai_runtime::ScriptedLoader;
use tokio_util::sync::CancellationToken;

fn phi_style_template() -> PromptTemplate {
    PromptTemplate {
        system: Some("<|system|>{{CONTENT}}<|end|>".to_string()),
        user: Some("<|user|>{{CONTENT}}<|end|>".to_string()),
        assistant: Some("<|assistant|>{{CONTENT}}<|end|>".to_string()),
        stop: vec!["<|end|>".to_string()],
    }
}

#[tokio::test]
async fn create_then_stream_completion() {
    let loader = Arc::new(ScriptedLoader::new(["The ", "answer", "."]));
    let factory = ClientFactory::new(loader);
    let client = factory
        .create(
            Path::new("/models/phi-3"),
            Some(phi_style_template()),
            CancellationToken::new(),
        )
        .await
        .expect("client should be created");

    assert!(client.is_ready());
    assert_eq!(
        client.model_dir().unwrap(),
        Path::new("/models/phi-3").to_path_buf()
    );

    let history = vec![
        ChatMessage::system("You are concise."),
        ChatMessage::user("What is the answer?"),
    ];
    let mut stream = client
        .stream_completion(
            &history,
            GenerationOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment);
    }
    assert_eq!(fragments, vec!["The ", "answer", "."]);
    assert_eq!(stream.state(), SessionState::Completed);
}

#[tokio::test]
async fn complete_stops_at_stop_sequence() {
    let loader = Arc::new(ScriptedLoader::new(["The answer", "<|end|>", "extra"]));
    let factory = ClientFactory::new(loader);
    let client = factory
        .create(
            Path::new("/models/phi-3"),
            Some(phi_style_template()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let history = vec![ChatMessage::user("question")];
    let message = client
        .complete(
            &history,
            GenerationOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    // The fragment carrying the stop sequence is included; nothing after.
    assert_eq!(message.text, "The answer<|end|>");
}

#[tokio::test]
async fn load_failure_returns_none() {
    let loader = Arc::new(ScriptedLoader::new(["x"]).failing());
    let factory = ClientFactory::new(loader);
    let client = factory
        .create(Path::new("/models/broken"), None, CancellationToken::new())
        .await;
    assert!(client.is_none());
}

#[tokio::test]
async fn cancelled_before_create_skips_loading() {
    let loader = Arc::new(ScriptedLoader::new(["x"]));
    let windows_probe = Arc::clone(&loader);
    let factory = ClientFactory::new(loader);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = factory.create(Path::new("/models/m"), None, cancel).await;

    assert!(client.is_none());
    assert!(windows_probe.load_windows().is_empty());
}

#[tokio::test]
async fn cancellation_after_load_start_does_not_interrupt() {
    let loader = Arc::new(ScriptedLoader::new(["x"]).with_delay(Duration::from_millis(50)));
    let factory = Arc::new(ClientFactory::new(loader));

    let cancel = CancellationToken::new();
    let create_cancel = cancel.clone();
    let factory_task = Arc::clone(&factory);
    let create = tokio::spawn(async move {
        factory_task
            .create(Path::new("/models/m"), None, create_cancel)
            .await
    });

    // Let the load begin, then cancel. Loading runs to completion.
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();

    let client = create.await.unwrap();
    assert!(client.is_some());
}

#[tokio::test]
async fn concurrent_creates_serialize_initialization() {
    let loader = Arc::new(ScriptedLoader::new(["x"]).with_delay(Duration::from_millis(30)));
    let windows_probe = Arc::clone(&loader);
    let factory = Arc::new(ClientFactory::new(loader));

    let f1 = Arc::clone(&factory);
    let f2 = Arc::clone(&factory);
    let a = tokio::spawn(async move {
        f1.create(Path::new("/models/a"), None, CancellationToken::new())
            .await
    });
    let b = tokio::spawn(async move {
        f2.create(Path::new("/models/b"), None, CancellationToken::new())
            .await
    });

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_some());
    assert!(b.is_some());

    let mut windows = windows_probe.load_windows();
    assert_eq!(windows.len(), 2);
    windows.sort_by_key(|(start, _)| *start);
    // Initialization windows must not overlap.
    assert!(windows[0].1 <= windows[1].0);
}

#[tokio::test]
async fn close_releases_handle_and_rejects_new_sessions() {
    let loader = Arc::new(ScriptedLoader::new(["x"]));
    let factory = ClientFactory::new(loader);
    let client = factory
        .create(Path::new("/models/m"), None, CancellationToken::new())
        .await
        .unwrap();

    client.close().await;
    assert!(!client.is_ready());

    let err = client
        .stream_completion(
            &[ChatMessage::user("hi")],
            GenerationOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotReady));
}

#[tokio::test]
async fn dropped_stream_frees_session_slot() {
    let loader = Arc::new(ScriptedLoader::new(["a", "b", "c"]));
    let factory = ClientFactory::new(loader).with_max_concurrent_sessions(1);
    let client = factory
        .create(Path::new("/models/m"), None, CancellationToken::new())
        .await
        .unwrap();

    let history = vec![ChatMessage::user("hi")];
    let mut stream = client
        .stream_completion(
            &history,
            GenerationOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let _ = stream.next().await;
    assert_eq!(client.tracker().active_count(), 1);

    drop(stream);
    assert_eq!(client.tracker().active_count(), 0);

    // The freed slot admits a new session.
    let second = client
        .stream_completion(
            &history,
            GenerationOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let fragments: Vec<String> = second.collect().await;
    assert_eq!(fragments.len(), 3);
}
