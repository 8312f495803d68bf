pub mod account;
pub mod base;
pub mod chat;
pub mod invites;
pub mod posts;
pub mod social;

use crate::{
    cirql_manager::CirqlManager,
    error::{
        ChatError, Error, IdentityError, IssuanceError, LedgerError, PostError, QuotaError,
        SignupError, SocialError, StorageError,
    },
    user_session::{IssuedSession, Session},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use cookie::{time::OffsetDateTime, CookieBuilder, SameSite};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

fn identity_status(err: &IdentityError) -> StatusCode {
    match err {
        IdentityError::InvalidEmail(_)
        | IdentityError::WeakPassword(_)
        | IdentityError::InvalidUsername => StatusCode::BAD_REQUEST,
        IdentityError::EmailTaken(_) => StatusCode::CONFLICT,
        IdentityError::IncorrectCredentials | IdentityError::SessionNotFound => {
            StatusCode::UNAUTHORIZED
        }
        IdentityError::RecoverySession => StatusCode::FORBIDDEN,
        IdentityError::UserNotFound(_) => StatusCode::NOT_FOUND,
        IdentityError::Argon2(_) | IdentityError::Mail(_) | IdentityError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::CodeNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyUsed(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn quota_status(err: &QuotaError) -> StatusCode {
    match err {
        QuotaError::QuotaExhausted(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::InvalidBucket(_) | StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn post_status(err: &PostError) -> StatusCode {
    match err {
        PostError::UnsupportedImageType(_)
        | PostError::EmptyImage
        | PostError::InvalidImageEncoding
        | PostError::InvalidPrice => StatusCode::BAD_REQUEST,
        PostError::PostNotFound(_) => StatusCode::NOT_FOUND,
        PostError::NotAuthor => StatusCode::FORBIDDEN,
        PostError::Storage(err) => storage_status(err),
        PostError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn chat_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::ConversationNotFound(_) | ChatError::UnknownParticipant(_) => {
            StatusCode::NOT_FOUND
        }
        ChatError::NotParticipant => StatusCode::FORBIDDEN,
        ChatError::SelfConversation | ChatError::InvalidContent(_) => StatusCode::BAD_REQUEST,
        ChatError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn social_status(err: &SocialError) -> StatusCode {
    match err {
        SocialError::SelfFollow | SocialError::InvalidComment(_) => StatusCode::BAD_REQUEST,
        SocialError::UnknownMember(_)
        | SocialError::PostNotFound(_)
        | SocialError::CommentNotFound(_) => StatusCode::NOT_FOUND,
        SocialError::NotCommentAuthor => StatusCode::FORBIDDEN,
        SocialError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status and the message a client may see. Backend failures only say that something broke.
fn classify(err: &Error) -> (StatusCode, String) {
    let (status, message) = match err {
        Error::Identity(err) => (identity_status(err), err.to_string()),
        Error::Signup(SignupError::SignupFailed(err)) => (identity_status(err), err.to_string()),
        Error::Signup(err) => (
            match err {
                SignupError::InvalidInviteCode(_) => StatusCode::BAD_REQUEST,
                SignupError::CodeAlreadyUsed(_) => StatusCode::CONFLICT,
                SignupError::Ledger(err) => ledger_status(err),
                SignupError::SignupFailed(err) => identity_status(err),
            },
            err.to_string(),
        ),
        Error::Issuance(err) => (
            match err {
                IssuanceError::NotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                IssuanceError::QuotaExhausted => StatusCode::CONFLICT,
                IssuanceError::CodeSpaceExhausted(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IssuanceError::Ledger(err) => ledger_status(err),
                IssuanceError::Quota(err) => quota_status(err),
                IssuanceError::Post(err) => post_status(err),
            },
            err.to_string(),
        ),
        Error::Ledger(err) => (ledger_status(err), err.to_string()),
        Error::Quota(err) => (quota_status(err), err.to_string()),
        Error::Post(err) => (post_status(err), err.to_string()),
        Error::Chat(err) => (chat_status(err), err.to_string()),
        Error::Social(err) => (social_status(err), err.to_string()),
        Error::Storage(err) => (storage_status(err), err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    if status.is_server_error() {
        error!("{}", err);
        return (status, "Internal server error".into());
    }
    warn!("Rejected request: {}", err);
    (status, message)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = classify(&self);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Runs synchronous store work off the async executor.
pub(crate) async fn run_blocking<T, F>(manager: &Arc<CirqlManager>, task: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&CirqlManager) -> Result<T, Error> + Send + 'static,
{
    let manager = manager.to_owned();
    tokio::task::spawn_blocking(move || task(&manager))
        .await
        .map_err(|err| Error::BlockingTask(err.to_string()))?
}

/// Session cookie first, then a bearer token (how password reset links authenticate).
pub(crate) fn session_token(
    manager: &CirqlManager,
    cookies: &Option<TypedHeader<Cookie>>,
    authorization: &Option<TypedHeader<Authorization<Bearer>>>,
) -> Option<String> {
    if let Some(TypedHeader(cookies)) = cookies {
        if let Some(token) = cookies.get(&manager.session_cookie_name()) {
            return Some(token.to_owned());
        }
    }
    authorization
        .as_ref()
        .map(|TypedHeader(authorization)| authorization.token().to_owned())
}

pub(crate) async fn require_session(
    manager: &Arc<CirqlManager>,
    cookies: &Option<TypedHeader<Cookie>>,
    authorization: &Option<TypedHeader<Authorization<Bearer>>>,
    allow_recovery: bool,
) -> Result<Session, Error> {
    let token: String =
        session_token(manager, cookies, authorization).ok_or(IdentityError::SessionNotFound)?;
    let session: Session = run_blocking(manager, move |manager| {
        Ok(manager
            .identities
            .current_session(&token)?
            .ok_or(IdentityError::SessionNotFound)?)
    })
    .await?;
    if session.recovery && !allow_recovery {
        return Err(IdentityError::RecoverySession.into());
    }
    Ok(session)
}

pub(crate) fn session_cookie(manager: &CirqlManager, issued: &IssuedSession) -> String {
    CookieBuilder::new(manager.session_cookie_name(), issued.token.to_owned())
        .http_only(true)
        .secure(true)
        .domain(manager.cookie_domain.to_owned())
        .path("/")
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::seconds(
            (issued.session.expires_at - Utc::now()).num_seconds().max(0),
        ))
        .build()
        .to_string()
}

pub(crate) fn cleared_session_cookie(manager: &CirqlManager) -> String {
    CookieBuilder::new(manager.session_cookie_name(), "")
        .http_only(true)
        .secure(true)
        .domain(manager.cookie_domain.to_owned())
        .path("/")
        .same_site(SameSite::Strict)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
        .to_string()
}

/// Image sent inline as base64, used for post photos and avatars.
#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    pub content_type: String,
    pub data: String,
}

impl ImageUpload {
    pub fn decode(&self) -> Result<Vec<u8>, PostError> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|_| PostError::InvalidImageEncoding)
    }
}
