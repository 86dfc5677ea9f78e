//! Command endpoint tests against a mock HTTP server.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tutorlink_http::{CommandChannel, PendingRequests, Session};
use tutorlink_protocol::{Error, JsonRpcRequest};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer) -> Session {
    let endpoint = url::Url::parse(&format!("{}/messages?sessionId=abc", server.uri())).unwrap();
    Session::detached("abc", endpoint)
}

fn channel(timeout: Duration) -> CommandChannel {
    CommandChannel::new(reqwest::Client::new(), timeout)
}

#[tokio::test]
async fn test_inline_json_reply_is_routed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(query_param("sessionId", "abc"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": "ok"}]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(
        pending.next_id(),
        "tools/call",
        Some(json!({"name": "search"})),
    );
    let response = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap();

    assert_eq!(response.result().unwrap()["content"][0]["text"], "ok");
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_event_stream_reply_is_routed() {
    let mock_server = MockServer::start().await;
    let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/list", None);
    let response = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap();
    assert_eq!(response.result(), Some(&json!({"ok": true})));
}

#[tokio::test]
async fn test_rpc_error_reply_is_returned_as_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "Invalid session ID"}
        })))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let response = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap();
    assert!(Error::from_rpc(response.error_object().unwrap()).is_session_invalid());
}

#[tokio::test]
async fn test_session_invalid_statuses() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("sessionId", "abc"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Session not found"))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let err = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap_err();

    assert!(err.is_session_invalid(), "{err:?}");
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_bad_request_mentioning_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("No transport found for sessionId"))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let err = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap_err();
    assert!(err.is_session_invalid(), "{err:?}");
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let err = channel(Duration::from_secs(2))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_unanswered_call_times_out_and_is_forgotten() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let err = channel(Duration::from_millis(100))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RequestTimeout { id: 1, .. }), "{err:?}");
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_slow_post_and_wait_share_one_deadline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_millis(250)))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let started = std::time::Instant::now();
    let err = channel(Duration::from_millis(400))
        .call(&session_for(&mock_server), &request, &pending)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RequestTimeout { .. }), "{err:?}");
    // The wait after a slow POST does not get a fresh 400ms
    assert!(started.elapsed() < Duration::from_millis(600), "{:?}", started.elapsed());
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_dropped_call_forgets_its_waiter() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let pending = PendingRequests::new();
    let request = JsonRpcRequest::new(pending.next_id(), "tools/call", None);
    let session = session_for(&mock_server);
    let channel = channel(Duration::from_secs(5));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(150),
        channel.call(&session, &request, &pending),
    )
    .await;

    assert!(abandoned.is_err());
    assert!(pending.is_empty());
}
