use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anthropic_api::{
    AnthropicApiClient, AnthropicApiConfig, AnthropicApiError, AnthropicStopReason,
    AnthropicStreamEvent, ApiMessage, MessagesRequest,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

fn allow_local_integration() -> bool {
    std::env::var("ANTHROPIC_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    request_heads: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let request_heads = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let request_heads = Arc::clone(&request_heads);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let request_heads = Arc::clone(&request_heads);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, request_heads).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            request_heads,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn first_request_head(&self) -> String {
        self.request_heads
            .lock()
            .expect("request heads lock")
            .first()
            .cloned()
            .unwrap_or_default()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_sse(frames: &[&str]) -> ScriptedResponse {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        body: body.into_bytes(),
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        body: body.as_bytes().to_vec(),
    }
}

fn client_for(server: &ScriptedServer) -> AnthropicApiClient {
    let config = AnthropicApiConfig::new("sk-local").with_base_url(&server.base_url);
    AnthropicApiClient::new(config).expect("client")
}

fn request() -> MessagesRequest {
    MessagesRequest::new(
        "claude-3-sonnet-20240229",
        vec![ApiMessage::new("user", "hi")],
        None,
        64,
    )
    .with_stop_sequences(vec!["</function_calls>".to_string()])
}

#[tokio::test]
async fn stream_integration_collects_text_and_stop_sequence() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(&[
        r##"{"type":"message_start","message":{"id":"msg_1"}}"##,
        r##"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"<function_calls>\n<invoke>"}}"##,
        r##"{"type":"message_delta","delta":{"stop_reason":"stop_sequence","stop_sequence":"</function_calls>"}}"##,
        r##"{"type":"message_stop"}"##,
    ])])
    .await;

    let result = client_for(&server)
        .stream(&request())
        .await
        .expect("stream should succeed");

    assert_eq!(result.text(), "<function_calls>\n<invoke>");
    assert_eq!(
        result.terminal.stop_reason,
        Some(AnthropicStopReason::StopSequence)
    );
    assert_eq!(
        result.terminal.stop_sequence.as_deref(),
        Some("</function_calls>")
    );
    assert!(result.terminal.completed);
    assert!(matches!(
        result.events[0],
        AnthropicStreamEvent::MessageStart { .. }
    ));

    let head = server.first_request_head().to_ascii_lowercase();
    assert!(head.starts_with("post /v1/messages "));
    assert!(head.contains("x-api-key: sk-local"));
    assert!(head.contains("anthropic-version: 2023-06-01"));

    server.shutdown();
}

#[tokio::test]
async fn complete_integration_decodes_text_blocks() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r##"{"id":"msg_2","type":"message","content":[{"type":"text","text":"Summary."}],"stop_reason":"end_turn","stop_sequence":null}"##,
    )])
    .await;

    let response = client_for(&server)
        .complete(&request())
        .await
        .expect("completion should succeed");

    assert_eq!(response.text(), "Summary.");
    assert!(server
        .first_request_head()
        .to_ascii_lowercase()
        .contains("accept: application/json"));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_error_event_fails_stream() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(&[
        r##"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"##,
        r##"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"##,
    ])])
    .await;

    let error = client_for(&server)
        .stream(&request())
        .await
        .expect_err("error event should fail the stream");

    assert!(matches!(
        error,
        AnthropicApiError::StreamFailed { ref message, .. } if message == "Overloaded"
    ));

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_retryable_then_success() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(
            529,
            r##"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"##,
        ),
        response_sse(&[r##"{"type":"message_stop"}"##]),
    ])
    .await;

    let client = client_for(&server);
    let result = timeout(Duration::from_secs(12), client.stream(&request()))
        .await
        .expect("retry path should be bounded")
        .expect("stream should eventually succeed");

    assert!(result.terminal.completed);
    assert_eq!(server.request_count(), 2);

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_non_retryable_status_fails_explicitly() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        400,
        r##"{"type":"error","error":{"type":"invalid_request_error","message":"bad model"}}"##,
    )])
    .await;

    let error = client_for(&server)
        .stream(&request())
        .await
        .expect_err("stream should fail");
    assert!(matches!(
        error,
        AnthropicApiError::Status(code, ref message)
            if code.as_u16() == 400 && message == "invalid_request_error: bad model"
    ));
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn stream_integration_connection_reset_then_retry_exhausted() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
        ScriptedResponse::Reset,
    ])
    .await;

    let client = client_for(&server);
    let error = timeout(Duration::from_secs(20), client.stream(&request()))
        .await
        .expect("retry path should resolve")
        .expect_err("connection reset should surface as failure");

    assert!(matches!(
        error,
        AnthropicApiError::RetryExhausted { status: None, .. }
    ));
    assert!(server.request_count() >= 4);

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        429 => "Too Many Requests",
        529 => "Overloaded",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    request_heads: Arc<Mutex<Vec<String>>>,
) {
    let head = match read_request_head(&mut socket).await {
        Ok(head) => head,
        Err(_) => return,
    };
    if let Ok(mut heads) = request_heads.lock() {
        heads.push(head);
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r##"{"error":"unexpected request"}"##));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond {
            status,
            content_type,
            body,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
                body.len(),
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(end) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            request.truncate(end);
            break;
        }
    }

    Ok(String::from_utf8_lossy(&request).into_owned())
}
