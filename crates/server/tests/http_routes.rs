use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use pairlab_server::{
    app,
    config::Config,
    services::rooms::{Connection, JoinRequest},
    AppState,
};
use pairlab_sync::protocol::Role;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

fn shell_config(timeout_secs: u64) -> Config {
    Config {
        run_program: "sh".to_string(),
        run_args: vec!["-c".to_string()],
        run_timeout_secs: timeout_secs,
        ..Config::default()
    }
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn run_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/run")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let app = app(AppState::new(Config::default()));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let app = app(AppState::new(Config::default()));
    let (status, body) = call(
        app,
        Request::get("/api/rooms/nope").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn room_summary_lists_members() {
    let state = AppState::new(Config::default());
    let (tx, _rx) = mpsc::channel(16);
    let teacher = Connection::new(tx.clone());
    let student = Connection::new(tx);
    for (conn, user_id, role) in [(&teacher, "t1", Role::Teacher), (&student, "s1", Role::Student)] {
        state
            .rooms
            .join(
                conn,
                JoinRequest {
                    room_id: "room-1".into(),
                    invite_code: "CODE".into(),
                    user_id: user_id.into(),
                    user_name: "Someone".into(),
                    role,
                },
            )
            .await
            .unwrap();
    }

    let (status, body) = call(
        app(state),
        Request::get("/api/rooms/room-1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roomId"], "room-1");
    assert_eq!(body["teacherPresent"], true);
    assert_eq!(
        body["students"],
        json!([{ "userId": "s1", "userName": "Someone" }])
    );
    assert_eq!(body["collaboration"], Value::Null);
    assert_eq!(body["annotationCount"], 0);
}

#[tokio::test]
async fn run_returns_output_and_simplified_error() {
    let app = app(AppState::new(shell_config(5)));
    let (status, body) = call(
        app,
        run_request(json!({
            "code": "read n; echo \"n=$n\"; echo 'Traceback' >&2; echo 'ZeroDivisionError: division by zero' >&2",
            "stdin": "7\n",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stdout"], "n=7\n");
    assert_eq!(body["error"], "ZeroDivisionError: division by zero");
}

#[tokio::test]
async fn clean_run_has_no_error() {
    let app = app(AppState::new(shell_config(5)));
    let (status, body) = call(app, run_request(json!({ "code": "echo hi" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stdout"], "hi\n");
    assert_eq!(body["error"], Value::Null);
}

#[tokio::test]
async fn run_times_out_with_408() {
    let app = app(AppState::new(shell_config(1)));
    let (status, body) = call(app, run_request(json!({ "code": "sleep 10" }))).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn empty_code_is_rejected() {
    let app = app(AppState::new(shell_config(1)));
    let (status, _) = call(app, run_request(json!({ "code": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
