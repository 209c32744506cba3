use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::session::{ResolvedSession, SESSION_COOKIE};
use crate::state::AppState;
use crate::submit::handle_submission;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_labs(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "labs": state.config.labs,
        "count": state.config.labs.len(),
    }))
}

/// POST /submit/:lab_id multipart upload with the rule source in a `file`
/// field. Issues the session cookie on first contact.
pub async fn submit_rule(
    State(state): State<AppState>,
    Path(lab_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let presented = session_cookie(&headers);

    let mut payload: Option<Vec<u8>> = None;
    let mut file_name = String::from("upload.yar");
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(name) = field.file_name() {
            file_name = name.to_string();
        }
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ApiError::MalformedUpload {
                    detail: e.to_string(),
                }
                .into_response()
            }
        };
        payload = Some(bytes.to_vec());
        break;
    }

    let Some(payload) = payload else {
        return ApiError::MissingFile.into_response();
    };

    info!(
        "Received rule upload: {} ({} bytes) for lab '{}'",
        file_name,
        payload.len(),
        lab_id
    );

    let (session, outcome) = handle_submission(&state, presented.as_deref(), &lab_id, &payload).await;

    let mut response = match outcome {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    };

    if session.is_new {
        let cookie = session_set_cookie(&session, state.config.session.ttl_secs);
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Pulls the session id out of the Cookie header, if any.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

fn session_set_cookie(session: &ResolvedSession, ttl_secs: u64) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session.id, ttl_secs
    )
}
