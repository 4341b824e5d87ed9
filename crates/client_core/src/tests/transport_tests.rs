use std::sync::Arc;

use super::*;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{AnswerId, AnswerOption, ChoiceQuestion, PageId, Question},
    protocol::PendingAnswer,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    bodies: Arc<Mutex<Vec<Value>>>,
    codes: Arc<Mutex<Vec<String>>>,
}

fn page(id: i64, session_id: SessionId) -> Page {
    Page {
        id: PageId(id),
        title: "Commute".to_string(),
        hint: None,
        questions: vec![Question::Radio(ChoiceQuestion {
            prompt: "How do you get to work?".to_string(),
            options: vec![AnswerOption {
                id: AnswerId(1),
                label: "Bike".to_string(),
            }],
        })],
        session_id: Some(session_id),
        friendly_code: Some(FriendlyCode::new("amber-crane-42")),
    }
}

async fn spawn_survey_server(
    session_id: SessionId,
) -> Result<(String, ServerState), Box<dyn std::error::Error>> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();

    let app = Router::new()
        .route(
            "/api/start",
            get(move || async move { Json(page(1, session_id)) }),
        )
        .route(
            "/api/response",
            post(
                move |State(state): State<ServerState>, Json(body): Json<Value>| async move {
                    let known = body["session_id"] == json!(session_id);
                    state.bodies.lock().await.push(body);
                    if known {
                        Ok(Json(page(2, session_id)))
                    } else {
                        Err((
                            StatusCode::NOT_FOUND,
                            Json(ApiError::not_found("unknown survey session")),
                        ))
                    }
                },
            ),
        )
        .route(
            "/api/restore",
            get(|| async {
                (
                    StatusCode::GONE,
                    Json(ApiError::new(ErrorCode::Completed, "questionnaire complete")),
                )
            }),
        )
        .route(
            "/api/answers",
            get(
                move |State(state): State<ServerState>,
                      Query(q): Query<PassphraseQuery>| async move {
                    state.codes.lock().await.push(q.friendly_code.0.clone());
                    if q.friendly_code.as_str() == "amber-crane-42" {
                        Ok(Json(page(1, session_id)))
                    } else {
                        Err((
                            StatusCode::NOT_FOUND,
                            Json(ApiError::not_found("no survey session matches that code")),
                        ))
                    }
                },
            ),
        )
        .with_state(state.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn start_decodes_served_page() {
    let session_id = SessionId::generate();
    let (server_url, _state) = spawn_survey_server(session_id).await.expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let page = transport.start().await.expect("start");

    assert_eq!(page.id, PageId(1));
    assert_eq!(page.session_id, Some(session_id));
    assert_eq!(page.friendly_code, Some(FriendlyCode::new("amber-crane-42")));
}

#[tokio::test]
async fn submit_posts_session_and_payload() {
    let session_id = SessionId::generate();
    let (server_url, state) = spawn_survey_server(session_id).await.expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let payload = SubmissionPayload::Captured(PendingAnswer {
        answer_id: Some(AnswerId(1)),
        question_id: Some(PageId(1)),
    });
    let next = transport
        .submit_response(session_id, &payload)
        .await
        .expect("submit");
    assert_eq!(next.id, PageId(2));

    transport
        .submit_response(session_id, &SubmissionPayload::Explicit(json!({ "custom": "yes" })))
        .await
        .expect("explicit submit");

    let bodies = state.bodies.lock().await;
    assert_eq!(
        bodies.as_slice(),
        &[
            json!({
                "session_id": session_id,
                "response": { "answer_id": 1, "question_id": 1 }
            }),
            json!({
                "session_id": session_id,
                "response": { "custom": "yes" }
            }),
        ]
    );
}

#[tokio::test]
async fn unknown_session_maps_to_not_found() {
    let (server_url, _state) = spawn_survey_server(SessionId::generate())
        .await
        .expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let err = transport
        .submit_response(
            SessionId::generate(),
            &SubmissionPayload::Captured(PendingAnswer::default()),
        )
        .await
        .expect_err("must fail");
    assert!(matches!(err, TransportError::NotFound), "unexpected error: {err}");
}

#[tokio::test]
async fn api_error_body_is_carried_on_rejection() {
    let session_id = SessionId::generate();
    let (server_url, _state) = spawn_survey_server(session_id).await.expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let err = transport.restore(session_id).await.expect_err("must fail");
    match err {
        TransportError::Rejected {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 410);
            assert_eq!(code, Some(ErrorCode::Completed));
            assert_eq!(message, "questionnaire complete");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn passphrase_lookup_sends_friendly_code() {
    let session_id = SessionId::generate();
    let (server_url, state) = spawn_survey_server(session_id).await.expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let page = transport
        .lookup_passphrase(&FriendlyCode::new("amber-crane-42"))
        .await
        .expect("lookup");
    assert_eq!(page.session_id, Some(session_id));

    let err = transport
        .lookup_passphrase(&FriendlyCode::new("nobody-here-0"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, TransportError::NotFound));

    assert_eq!(
        state.codes.lock().await.as_slice(),
        &["amber-crane-42".to_string(), "nobody-here-0".to_string()]
    );
}

#[tokio::test]
async fn bare_route_404_is_a_rejection_not_a_missing_session() {
    let (server_url, state) = spawn_survey_server(SessionId::generate())
        .await
        .expect("spawn server");
    let transport = HttpTransport::new(&format!("{server_url}/wrong-prefix")).expect("transport");

    let err = transport
        .lookup_passphrase(&FriendlyCode::new("amber-crane-42"))
        .await
        .expect_err("route is not mounted");
    match err {
        TransportError::Rejected { status, code, .. } => {
            assert_eq!(status, 404);
            assert_eq!(code, None);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(state.codes.lock().await.is_empty());
}

#[test]
fn base_url_gains_trailing_slash_for_joins() {
    let transport = HttpTransport::new("http://survey.local/prefix").expect("transport");
    assert_eq!(transport.base_url().as_str(), "http://survey.local/prefix/");
    assert_eq!(
        transport.endpoint("api/start").expect("endpoint").as_str(),
        "http://survey.local/prefix/api/start"
    );
}

#[test]
fn malformed_server_url_is_rejected() {
    assert!(matches!(
        HttpTransport::new("not a url"),
        Err(TransportError::Url(_))
    ));
}
