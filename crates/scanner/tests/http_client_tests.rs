//! HTTP 영속화 클라이언트 테스트
//!
//! 로컬 axum 서버(127.0.0.1:0)를 띄워 요청 본문과 응답 해석을 검증합니다.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::{Value, json};

use scanpost_scanner::{HttpPersistClient, PersistClient, SaveRequest, SubmissionError};

#[derive(Clone)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> HttpPersistClient {
    HttpPersistClient::new(format!("http://{addr}/api/save.php"), Duration::from_secs(5)).unwrap()
}

fn request(text: &str, operator: Option<&str>) -> SaveRequest {
    SaveRequest {
        qr_text: text.to_owned(),
        operator: operator.map(str::to_owned),
    }
}

async fn fixed_response(status: StatusCode, body: &'static str) -> SocketAddr {
    let router = Router::new().route(
        "/api/save.php",
        post(move || async move { (status, body) }),
    );
    spawn_server(router).await
}

#[tokio::test]
async fn success_sends_json_body() {
    let recorded = Recorded {
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new()
        .route(
            "/api/save.php",
            post(
                |State(state): State<Recorded>, Json(body): Json<Value>| async move {
                    state.bodies.lock().unwrap().push(body);
                    Json(json!({ "success": true }))
                },
            ),
        )
        .with_state(recorded.clone());
    let addr = spawn_server(router).await;

    let client = client(addr);
    client.save(&request("ABC123", None)).await.unwrap();
    client.save(&request("XYZ", Some("kim"))).await.unwrap();

    let bodies = recorded.bodies.lock().unwrap().clone();
    assert_eq!(bodies[0], json!({ "qr_text": "ABC123" }));
    assert_eq!(bodies[1], json!({ "qr_text": "XYZ", "operator": "kim" }));
}

#[tokio::test]
async fn server_rejection_carries_message() {
    let addr = fixed_response(
        StatusCode::CONFLICT,
        r#"{"success":false,"error":"duplicate"}"#,
    )
    .await;

    let err = client(addr).save(&request("ABC123", None)).await.unwrap_err();
    assert_eq!(err, SubmissionError::Rejected("duplicate".to_owned()));
    assert_eq!(err.to_string(), "duplicate");
}

#[tokio::test]
async fn rejection_without_message_uses_default() {
    let addr = fixed_response(StatusCode::OK, r#"{"success":false}"#).await;

    let err = client(addr).save(&request("ABC123", None)).await.unwrap_err();
    assert_eq!(err.to_string(), "unknown server error");
}

#[tokio::test]
async fn error_status_without_json_reports_code() {
    let addr = fixed_response(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;

    let err = client(addr).save(&request("ABC123", None)).await.unwrap_err();
    assert_eq!(err.to_string(), "server responded with status 500");
}

#[tokio::test]
async fn slow_server_times_out() {
    let router = Router::new().route(
        "/api/save.php",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "success": true })).into_response()
        }),
    );
    let addr = spawn_server(router).await;

    let client = HttpPersistClient::new(
        format!("http://{addr}/api/save.php"),
        Duration::from_millis(100),
    )
    .unwrap();
    let err = client.save(&request("ABC123", None)).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Transport(_)));
    assert!(err.to_string().starts_with("request failed:"));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_failure() {
    // 바인드 후 바로 닫아 연결이 거부되는 포트를 얻음
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr).save(&request("ABC123", None)).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Transport(_)));
    assert!(err.to_string().starts_with("request failed:"));
}
