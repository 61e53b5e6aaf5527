//! The client and chat model against a local HTTP server speaking the
//! Gemini wire format.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use geminius::{
    ChatGemini, Content, Error, Gemini, GenerateContentRequest, KnownModel, LanguageModel, Model,
    StreamObserver,
};

/// Serves one canned response and hands back the raw request it received.
async fn serve_once(
    status: &'static str,
    content_type: &'static str,
    body: String,
) -> (String, Arc<Mutex<String>>) {
    serve_in_parts(status, content_type, vec![body], Duration::ZERO).await
}

/// Like [`serve_once`], but writes the body in `parts` with `pause` between
/// them.
async fn serve_in_parts(
    status: &'static str,
    content_type: &'static str,
    parts: Vec<String>,
    pause: Duration,
) -> (String, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(String::new()));
    let record = seen.clone();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }
        *record.lock().unwrap() = String::from_utf8_lossy(&request).into_owned();

        let length: usize = parts.iter().map(String::len).sum();
        let head = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\nconnection: close\r\ncontent-length: {length}\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(pause).await;
            }
            socket.write_all(part.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        }
        socket.shutdown().await.unwrap();
    });

    (format!("http://{addr}/v1beta"), seen)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..split]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    request.len() >= split + 4 + length
}

fn client(base_url: String) -> Gemini {
    Gemini::with_options(Some("loopback-key".to_string()), Some(base_url), None).unwrap()
}

fn sse_chunk(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "index": 0}]
        })
    )
}

#[derive(Default)]
struct Recorder {
    fragments: Vec<String>,
    ended: usize,
    errors: usize,
}

impl StreamObserver for Recorder {
    fn on_fragment(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    fn on_stream_end(&mut self) {
        self.ended += 1;
    }

    fn on_stream_error(&mut self, _: &Error) {
        self.errors += 1;
    }
}

#[tokio::test]
async fn stream_hits_sse_endpoint_with_key_header() {
    let body = format!("{}{}", sse_chunk("Hel"), sse_chunk("lo"));
    let (base, seen) = serve_once("200 OK", "text/event-stream", body).await;

    let request = GenerateContentRequest::new(vec![Content::user("Say hi")]);
    let stream = client(base)
        .stream(&Model::Known(KnownModel::GeminiPro), &request)
        .await
        .unwrap();
    let texts: Vec<String> = stream.map(|chunk| chunk.unwrap().text()).collect().await;
    assert_eq!(texts, vec!["Hel", "lo"]);

    let seen = seen.lock().unwrap().clone();
    assert!(
        seen.starts_with("POST /v1beta/models/gemini-pro:streamGenerateContent?alt=sse HTTP/1.1"),
        "{seen}"
    );
    assert!(seen.to_ascii_lowercase().contains("x-goog-api-key: loopback-key"));
    assert!(seen.contains(r#""contents":[{"role":"user","parts":[{"text":"Say hi"}]}]"#));
}

#[tokio::test]
async fn send_parses_full_response() {
    let body = serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Hi!"}]},
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5},
        "modelVersion": "gemini-pro-001"
    })
    .to_string();
    let (base, seen) = serve_once("200 OK", "application/json", body).await;

    let request = GenerateContentRequest::new(vec![Content::user("Say hi")]);
    let response = client(base)
        .send(&Model::Known(KnownModel::GeminiPro), &request)
        .await
        .unwrap();
    assert_eq!(response.text(), "Hi!");
    assert_eq!(response.usage_metadata.unwrap().total_token_count, 5);
    assert!(
        seen.lock()
            .unwrap()
            .starts_with("POST /v1beta/models/gemini-pro:generateContent HTTP/1.1")
    );
}

#[tokio::test]
async fn error_status_maps_to_typed_error() {
    let body = serde_json::json!({
        "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
    })
    .to_string();
    let (base, _) = serve_once("400 Bad Request", "application/json", body).await;

    let request = GenerateContentRequest::new(vec![Content::user("Say hi")]);
    let result = client(base)
        .stream(&Model::Known(KnownModel::GeminiPro), &request)
        .await;
    let Err(err) = result else {
        panic!("expected an error");
    };
    assert!(err.is_bad_request());
    assert!(err.to_string().contains("API key not valid."));
}

#[tokio::test]
async fn chat_model_streams_fragments_to_observer() {
    let body = format!("{}{}", sse_chunk("Line1\n"), sse_chunk("Line2"));
    let (base, seen) = serve_once("200 OK", "text/event-stream", body).await;

    let model = ChatGemini::new(client(base), Model::Known(KnownModel::GeminiPro))
        .with_temperature(Some(0.5));
    let mut recorder = Recorder::default();
    let message = model
        .invoke(vec![Content::user("two lines")], &mut recorder)
        .await
        .unwrap();

    assert_eq!(message.content, "Line1\nLine2");
    assert_eq!(recorder.fragments, vec!["Line1\n", "Line2"]);
    assert_eq!((recorder.ended, recorder.errors), (1, 0));
    assert!(seen.lock().unwrap().contains(r#""generationConfig":{"temperature":0.5}"#));
}

#[tokio::test]
async fn chat_model_reports_in_stream_error() {
    let body = format!(
        "{}data: {}\n\n",
        sse_chunk("partial"),
        serde_json::json!({"error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}})
    );
    let (base, _) = serve_once("200 OK", "text/event-stream", body).await;

    let model = ChatGemini::new(client(base), Model::Known(KnownModel::GeminiPro));
    let mut recorder = Recorder::default();
    let err = model
        .invoke(vec![Content::user("hi")], &mut recorder)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("overloaded"));
    assert_eq!(recorder.fragments, vec!["partial"]);
    assert_eq!((recorder.ended, recorder.errors), (0, 1));
}

#[tokio::test]
async fn blocking_mode_ends_without_fragments() {
    let body = serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": "whole"}]}, "index": 0}]
    })
    .to_string();
    let (base, _) = serve_once("200 OK", "application/json", body).await;

    let model = ChatGemini::new(client(base), Model::Known(KnownModel::GeminiPro))
        .with_streaming(false);
    let mut recorder = Recorder::default();
    let message = model
        .invoke(vec![Content::user("hi")], &mut recorder)
        .await
        .unwrap();

    assert_eq!(message.content, "whole");
    assert!(recorder.fragments.is_empty());
    assert_eq!(recorder.ended, 1);
}

#[tokio::test]
async fn stream_outlives_client_and_request() {
    let (base, _) = serve_once("200 OK", "text/event-stream", sse_chunk("kept")).await;

    let stream = {
        let client = client(base);
        let request = GenerateContentRequest::new(vec![Content::user("hi")]);
        client
            .stream(&Model::Custom("models/gemini-pro".to_string()), &request)
            .await
            .unwrap()
    };
    let texts: Vec<String> = stream.map(|chunk| chunk.unwrap().text()).collect().await;
    assert_eq!(texts, vec!["kept"]);
}

#[tokio::test]
async fn slow_stream_is_not_cut_off_by_connect_timeout() {
    let parts = vec![sse_chunk("before"), sse_chunk(" after")];
    let (base, _) =
        serve_in_parts("200 OK", "text/event-stream", parts, Duration::from_millis(1500)).await;

    let client = Gemini::with_options(
        Some("loopback-key".to_string()),
        Some(base),
        Some(Duration::from_secs(1)),
    )
    .unwrap();
    let model = ChatGemini::new(client, Model::Known(KnownModel::GeminiPro));
    let mut recorder = Recorder::default();
    let message = model
        .invoke(vec![Content::user("take your time")], &mut recorder)
        .await
        .unwrap();

    assert_eq!(message.content, "before after");
    assert_eq!((recorder.ended, recorder.errors), (1, 0));
}
