mod utils;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use notification_queue::NotificationJob;
use notification_worker::sender::{
    HttpApiConfig, HttpApiSender, NotificationSender, SendError, SenderIdentity,
    CORRELATION_HEADER,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::utils::setup_test_env;

#[derive(Debug, Clone)]
struct CapturedRequest {
    authorization: Option<String>,
    correlation_id: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockProvider {
    status: StatusCode,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn send_email(
    State(provider): State<MockProvider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    provider.captured.lock().unwrap().push(CapturedRequest {
        authorization: header("authorization"),
        correlation_id: header(CORRELATION_HEADER),
        body,
    });
    (provider.status, "provider says no")
}

/// Starts a mock email provider on an ephemeral port
async fn start_provider(status: StatusCode) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let provider = MockProvider {
        status,
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route("/v3/smtp/email", post(send_email))
        .with_state(provider);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v3/smtp/email"), captured)
}

fn sender_for(endpoint: String) -> HttpApiSender {
    HttpApiSender::new(HttpApiConfig {
        endpoint,
        api_key: "test-api-key".to_string(),
        identity: SenderIdentity {
            name: "Example Store".to_string(),
            email: "orders@example.com".to_string(),
        },
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn job() -> NotificationJob {
    NotificationJob::new(
        "ada@example.com",
        "Ada",
        "Order Confirmed - Example Store #42",
        "<p>Thanks</p>",
        "42",
    )
}

#[tokio::test]
async fn test_http_send_posts_json_with_auth_and_correlation() {
    setup_test_env();

    let (endpoint, captured) = start_provider(StatusCode::CREATED).await;
    let sender = sender_for(endpoint);

    sender.send(&job()).await.unwrap();

    let requests = captured.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-api-key"));
    assert_eq!(request.correlation_id.as_deref(), Some("42"));
    assert_eq!(
        request.body,
        json!({
            "from": { "email": "orders@example.com", "name": "Example Store" },
            "to": [{ "email": "ada@example.com", "name": "Ada" }],
            "subject": "Order Confirmed - Example Store #42",
            "htmlContent": "<p>Thanks</p>",
        })
    );
}

#[tokio::test]
async fn test_http_send_omits_empty_display_name() {
    setup_test_env();

    let (endpoint, captured) = start_provider(StatusCode::OK).await;
    let sender = sender_for(endpoint);
    let job = NotificationJob::new("ops@example.com", "", "Subject", "Body", "7");

    sender.send(&job).await.unwrap();

    let body = captured.lock().unwrap()[0].body.clone();
    assert_eq!(body["to"], json!([{ "email": "ops@example.com" }]));
}

#[tokio::test]
async fn test_http_server_error_is_transient() {
    setup_test_env();

    let (endpoint, _) = start_provider(StatusCode::SERVICE_UNAVAILABLE).await;
    let err = sender_for(endpoint).send(&job()).await.unwrap_err();

    assert!(matches!(err, SendError::Rejected { permanent: false, .. }));
    assert!(err.to_string().contains("provider says no"));
}

#[tokio::test]
async fn test_http_rate_limit_is_transient() {
    setup_test_env();

    let (endpoint, _) = start_provider(StatusCode::TOO_MANY_REQUESTS).await;
    let err = sender_for(endpoint).send(&job()).await.unwrap_err();

    assert!(!err.is_permanent());
}

#[tokio::test]
async fn test_http_unauthorized_is_authentication_error() {
    setup_test_env();

    let (endpoint, _) = start_provider(StatusCode::UNAUTHORIZED).await;
    let err = sender_for(endpoint).send(&job()).await.unwrap_err();

    assert!(matches!(err, SendError::Authentication(_)));
    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_http_bad_request_is_permanent_rejection() {
    setup_test_env();

    let (endpoint, _) = start_provider(StatusCode::BAD_REQUEST).await;
    let err = sender_for(endpoint).send(&job()).await.unwrap_err();

    assert!(matches!(err, SendError::Rejected { permanent: true, .. }));
}

#[tokio::test]
async fn test_http_unreachable_provider_is_connection_error() {
    setup_test_env();

    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = sender_for(format!("http://{addr}/v3/smtp/email"))
        .send(&job())
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Connection(_)));
    assert!(!err.is_permanent());
}
