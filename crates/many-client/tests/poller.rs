//! Async polling against a scripted transport.
//!
//! The tokio clock is paused, so sleeps advance virtual time exactly and the
//! gaps between recorded requests are the backoff delays.

use std::sync::Arc;
use std::time::Duration;

use many_client::testing::MockTransport;
use many_client::{AsyncStatus, CallOutcome, Client, ClientError, PollConfig, StatusReply};
use many_identity::cbor::{self, Value};
use many_identity::{Address, Ed25519Identity, Identity};
use many_message::{ManyError, PendingToken, RequestOptions, Response};
use tokio_util::sync::CancellationToken;

fn server() -> Address {
    Ed25519Identity::from_seed(&[42u8; 32]).address()
}

fn token() -> PendingToken {
    PendingToken::new(vec![0xca, 0xfe])
}

fn status(status: AsyncStatus, value: Option<Value>) -> Response {
    Response::ok(server(), StatusReply { status, value }.to_value())
}

fn gaps(mock: &MockTransport) -> Vec<Duration> {
    mock.sent()
        .windows(2)
        .map(|w| w[1].at.duration_since(w[0].at))
        .collect()
}

/// Mock whose first reply hands back the pending token.
fn pending_mock() -> Arc<MockTransport> {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(&Response::pending(server(), token()));
    mock
}

async fn run(client: &Client, id: &Ed25519Identity) -> Result<CallOutcome, ClientError> {
    client
        .call(id, "ledger.send", Value::Null, RequestOptions::default())
        .await
}

#[tokio::test(start_paused = true)]
async fn poll_backoff_delays() {
    let mock = Arc::new(MockTransport::new());
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    mock.push_response(&Response::pending(server(), token()));
    mock.push_response(&status(AsyncStatus::Queued, None));
    mock.push_response(&status(AsyncStatus::Processing, None));
    mock.push_response(&status(AsyncStatus::Processing, None));
    mock.push_response(&status(AsyncStatus::Done, Some(cbor::uint(77))));

    let outcome = client
        .call(&id, "ledger.send", Value::Null, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, CallOutcome::Value(cbor::uint(77)));

    assert_eq!(
        gaps(&mock),
        vec![
            Duration::ZERO,
            Duration::from_millis(500),
            Duration::from_millis(750),
            Duration::from_millis(1125),
        ]
    );

    let sent = mock.sent_requests();
    assert_eq!(sent.len(), 5);
    for req in &sent[1..] {
        assert_eq!(req.method, "async.status");
        assert_eq!(req.from, id.address());
        let args = cbor::as_map(&req.data).unwrap();
        assert_eq!(cbor::map_get(args, 0).and_then(cbor::as_bytes), Some(&[0xca, 0xfe][..]));
    }
}

#[tokio::test(start_paused = true)]
async fn done_returns_without_sleeping() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    let inner = Response::ok(server(), Value::Text("finished".into()));
    mock.push_response(&status(AsyncStatus::Done, Some(Value::Bytes(inner.to_cbor()))));

    let outcome = run(&client, &id).await.unwrap();
    assert_eq!(outcome, CallOutcome::Value(Value::Text("finished".into())));
    assert_eq!(gaps(&mock), vec![Duration::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn done_with_failed_inner_response_raises() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    let inner = Response::error(server(), ManyError::new(3, "insufficient funds"));
    mock.push_response(&status(AsyncStatus::Done, Some(Value::Bytes(inner.to_cbor()))));

    let err = run(&client, &id).await.unwrap_err();
    assert_eq!(err.to_string(), "Error: insufficient funds");
}

#[tokio::test(start_paused = true)]
async fn unknown_token_raises_without_sleeping() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    mock.push_response(&status(AsyncStatus::Unknown, None));
    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownToken(ref t) if t == "cafe"));
    assert_eq!(gaps(&mock), vec![Duration::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn expired_token_raises_without_sleeping() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    mock.push_response(&status(AsyncStatus::Queued, None));
    mock.push_response(&status(AsyncStatus::Expired, None));
    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::TokenExpired));
    assert_eq!(gaps(&mock), vec![Duration::ZERO, Duration::from_millis(500)]);
}

#[tokio::test(start_paused = true)]
async fn unknown_status_code() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    let payload = cbor::MapBuilder::new().insert(0, cbor::uint(7)).build();
    mock.push_response(&Response::ok(server(), payload));
    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownStatus(7)));
}

#[tokio::test(start_paused = true)]
async fn negative_status_code_is_unknown() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    let payload = cbor::MapBuilder::new().insert(0, cbor::int(-1)).build();
    mock.push_response(&Response::ok(server(), payload));
    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownStatus(-1)));
    assert_eq!(mock.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn status_error_propagates() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    mock.push_response(&Response::error(
        server(),
        ManyError::new(9, "no such {what}").with_field("what", "job"),
    ));
    let err = run(&client, &id).await.unwrap_err();
    match err {
        ClientError::Protocol(e) => assert_eq!(e.render(), "no such job"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn empty_status_response() {
    let mock = pending_mock();
    let client = Client::from_arc(mock.clone());
    let id = Ed25519Identity::generate();

    mock.push_empty();
    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::NoStatus));
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_polling() {
    let mock = pending_mock();
    let config = PollConfig {
        deadline: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let client = Client::from_arc(mock.clone()).with_poll_config(config);
    let id = Ed25519Identity::generate();

    mock.push_response(&status(AsyncStatus::Queued, None));
    mock.push_response(&status(AsyncStatus::Queued, None));
    mock.push_response(&status(AsyncStatus::Done, None));

    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::PollDeadlineExceeded(d) if d == Duration::from_secs(1)));
    // 500ms fits in the budget, 500 + 750 does not
    assert_eq!(mock.sent().len(), 3);
    assert_eq!(mock.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_sleep() {
    let mock = pending_mock();
    let cancel = CancellationToken::new();
    let client = Client::from_arc(mock.clone()).with_cancellation(cancel.clone());
    let id = Ed25519Identity::generate();

    for _ in 0..4 {
        mock.push_response(&status(AsyncStatus::Processing, None));
    }

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        cancel.cancel();
    });

    let err = run(&client, &id).await.unwrap_err();
    canceller.await.unwrap();
    assert!(matches!(err, ClientError::Cancelled));
    // initial call, status at 0ms, status at 500ms; cancelled during the 750ms pause
    assert_eq!(mock.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_sends_no_status() {
    let mock = pending_mock();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = Client::from_arc(mock.clone()).with_cancellation(cancel);
    let id = Ed25519Identity::generate();

    let err = run(&client, &id).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(mock.sent().len(), 1);
}
