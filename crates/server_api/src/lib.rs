use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{FriendlyCode, Page, SessionId},
    error::{ApiError, ErrorCode},
    protocol::{PendingAnswer, ResponseEnvelope, SessionAnswers},
};
use storage::{Storage, StoredSession};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod questionnaire;

pub use questionnaire::{Questionnaire, QuestionnaireError};

const FRIENDLY_CODE_ATTEMPTS: usize = 8;

const CODE_ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "dusky", "eager", "fuzzy", "gentle", "hazel", "ivory", "jolly",
    "keen", "lucky", "mellow", "nimble", "olive", "plucky", "quiet", "rosy", "sunny", "tidy",
];

const CODE_ANIMALS: &[&str] = &[
    "badger", "crane", "dolphin", "falcon", "gecko", "heron", "ibis", "jaguar", "koala", "lynx",
    "marten", "newt", "otter", "puffin", "quail", "raven", "stoat", "tapir", "vole", "wren",
];

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub questionnaire: Arc<Questionnaire>,
}

/// Opens a new respondent session and serves the first page.
pub async fn start_session(ctx: &ApiContext) -> Result<Page, ApiError> {
    let session_id = SessionId::generate();
    let friendly_code = allocate_friendly_code(ctx).await?;
    let session = ctx
        .storage
        .create_session(session_id, &friendly_code)
        .await
        .map_err(internal)?;
    info!(%session_id, %friendly_code, "survey session started");
    serve_page(ctx, &session, 0).await
}

/// Records `envelope.response` against the page the session is currently on
/// and serves the next page. The response is stored exactly as received.
pub async fn record_response(
    ctx: &ApiContext,
    envelope: ResponseEnvelope<Value>,
) -> Result<Page, ApiError> {
    let session = load_session(ctx, envelope.session_id).await?;
    let total = ctx.questionnaire.len();
    let served = session.served_pages as usize;

    if served > total {
        return Err(completed(&session));
    }
    let Some(current_index) = served.checked_sub(1) else {
        return Err(ApiError::validation(
            "no page has been served for this session yet",
        ));
    };
    let current_page = ctx
        .questionnaire
        .page(current_index)
        .ok_or_else(|| ApiError::internal("session cursor points past the questionnaire"))?;

    if let Ok(answer) = PendingAnswer::deserialize(&envelope.response) {
        if answer.is_empty() {
            debug!(session_id = %session.session_id, page_id = %current_page.id, "empty answer submitted");
        } else if answer.question_id != Some(current_page.id) {
            warn!(
                session_id = %session.session_id,
                page_id = %current_page.id,
                question_id = ?answer.question_id,
                "answer submitted for a page the session is not on"
            );
        }
    }

    let recorded = ctx
        .storage
        .record_answer_and_advance(
            session.session_id,
            current_page.id,
            &envelope.response,
            session.served_pages,
        )
        .await
        .map_err(internal)?;
    if recorded.is_none() {
        warn!(
            session_id = %session.session_id,
            page_id = %current_page.id,
            "concurrent submission already answered this page"
        );
        return Err(ApiError::conflict(format!(
            "page {} was already answered for this session",
            current_page.id
        )));
    }
    info!(
        session_id = %session.session_id,
        page_id = %current_page.id,
        "answer recorded"
    );

    if served >= total {
        info!(session_id = %session.session_id, "questionnaire completed");
        return Err(completed(&session));
    }

    let page = ctx
        .questionnaire
        .page(served)
        .ok_or_else(|| ApiError::internal("next page missing from questionnaire"))?;
    Ok(stamp(page, &session))
}

/// Re-serves the page the session was last shown without advancing it.
pub async fn restore_session(ctx: &ApiContext, session_id: SessionId) -> Result<Page, ApiError> {
    let session = load_session(ctx, session_id).await?;
    last_served_page(ctx, &session).await
}

/// Passphrase lookup: resolves a friendly code to its session's current page.
pub async fn resume_by_code(
    ctx: &ApiContext,
    friendly_code: &FriendlyCode,
) -> Result<Page, ApiError> {
    let session = ctx
        .storage
        .session_by_code(friendly_code)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            info!(%friendly_code, "passphrase lookup found no session");
            ApiError::not_found("no survey session matches that code")
        })?;
    last_served_page(ctx, &session).await
}

pub async fn list_answers(ctx: &ApiContext, session_id: SessionId) -> Result<SessionAnswers, ApiError> {
    let session = load_session(ctx, session_id).await?;
    let answers = ctx
        .storage
        .answers_for_session(session_id)
        .await
        .map_err(internal)?;
    Ok(SessionAnswers {
        session_id,
        friendly_code: session.friendly_code,
        answers,
    })
}

async fn last_served_page(ctx: &ApiContext, session: &StoredSession) -> Result<Page, ApiError> {
    let served = session.served_pages as usize;
    if served == 0 {
        return serve_page(ctx, session, 0).await;
    }
    if served > ctx.questionnaire.len() {
        return Err(completed(session));
    }
    let page = ctx
        .questionnaire
        .page(served - 1)
        .ok_or_else(|| ApiError::internal("session cursor points past the questionnaire"))?;
    Ok(stamp(page, session))
}

async fn serve_page(
    ctx: &ApiContext,
    session: &StoredSession,
    index: usize,
) -> Result<Page, ApiError> {
    let page = ctx
        .questionnaire
        .page(index)
        .ok_or_else(|| ApiError::internal(format!("questionnaire has no page {index}")))?;
    let served = u32::try_from(index + 1).map_err(|_| ApiError::internal("page index overflow"))?;
    ctx.storage
        .set_served_pages(session.session_id, served)
        .await
        .map_err(internal)?;
    Ok(stamp(page, session))
}

async fn load_session(ctx: &ApiContext, session_id: SessionId) -> Result<StoredSession, ApiError> {
    ctx.storage
        .session_by_id(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("survey session {session_id} not found")))
}

async fn allocate_friendly_code(ctx: &ApiContext) -> Result<FriendlyCode, ApiError> {
    for _ in 0..FRIENDLY_CODE_ATTEMPTS {
        let candidate = friendly_code_from(Uuid::new_v4());
        let in_use = ctx
            .storage
            .friendly_code_in_use(&candidate)
            .await
            .map_err(internal)?;
        if !in_use {
            return Ok(candidate);
        }
    }
    Err(ApiError::internal(
        "could not allocate an unused friendly code",
    ))
}

/// Derives an `adjective-animal-NN` code from the random bytes of a uuid.
pub fn friendly_code_from(seed: Uuid) -> FriendlyCode {
    let bytes = seed.as_bytes();
    let adjective = CODE_ADJECTIVES[bytes[0] as usize % CODE_ADJECTIVES.len()];
    let animal = CODE_ANIMALS[bytes[1] as usize % CODE_ANIMALS.len()];
    let number = u16::from_be_bytes([bytes[2], bytes[3]]) % 100;
    FriendlyCode(format!("{adjective}-{animal}-{number}"))
}

fn stamp(page: &Page, session: &StoredSession) -> Page {
    let mut page = page.clone();
    page.session_id = Some(session.session_id);
    page.friendly_code = Some(session.friendly_code.clone());
    page
}

fn completed(session: &StoredSession) -> ApiError {
    ApiError::new(
        ErrorCode::Completed,
        format!(
            "survey session {} has answered every page",
            session.session_id
        ),
    )
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "survey storage failure");
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
