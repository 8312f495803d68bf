use crate::{serde_implementations::datetime_utc, user::Identity};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The authenticated caller of a workflow. Everything that acts on behalf of a member
/// takes one of these explicitly instead of looking the session up itself.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub identity: Identity,
    #[serde(with = "datetime_utc")]
    pub expires_at: DateTime<Utc>,
    /// Minted by a password reset link; may only be used to set a new password.
    pub recovery: bool,
}

impl Session {
    pub fn user_id(&self) -> &uuid::Uuid {
        &self.identity.id
    }
}

/// A freshly minted session together with its bearer token. The token is never stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}
