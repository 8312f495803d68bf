use crate::{
    cirql_manager::CirqlManager,
    error::{IssuanceError, LedgerError, QuotaError},
    invite_ledger::{EligibleIssuer, InviteCode},
    quota::QuotaRecord,
    user_session::Session,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Serialize, Debug, Clone)]
pub struct IssuedInvite {
    pub code: String,
    pub link: String,
    /// Ready to paste into a chat app.
    pub message: String,
    pub remaining: i32,
}

/// Everything the invites page shows.
#[derive(Serialize, Debug, Clone)]
pub struct InviteOverview {
    pub quota: Option<QuotaRecord>,
    pub authored_posts: i64,
    pub min_posts: i64,
    pub invites: Vec<InviteCode>,
}

impl CirqlManager {
    pub fn invite_link(&self, code: &str) -> String {
        format!("{}/?invite={}", self.public_base_url, code)
    }

    /// Counts the user's posts now, never from a cached value.
    pub fn check_eligibility(&self, user_id: &Uuid) -> Result<EligibleIssuer, IssuanceError> {
        let authored_posts: i64 = self.posts.count_by_author(user_id)?;
        let min_posts: i64 = self.invite_policy.min_posts;
        let issuer = EligibleIssuer::new(*user_id, authored_posts, min_posts);
        if !issuer.is_eligible() {
            return Err(IssuanceError::NotEligible {
                shortfall: min_posts - authored_posts,
            });
        }
        Ok(issuer)
    }

    fn create_invite_code(&self, issuer: &EligibleIssuer) -> Result<InviteCode, IssuanceError> {
        let attempts: u32 = self.invite_policy.max_generation_attempts;
        for attempt in 1..=attempts {
            match self.ledger.create(issuer) {
                Ok(invite) => return Ok(invite),
                Err(LedgerError::DuplicateCode(code)) => {
                    debug!("Generated code {} already taken (attempt {})", code, attempt);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(IssuanceError::CodeSpaceExhausted(attempts))
    }

    pub fn issue_invite(&self, session: &Session) -> Result<IssuedInvite, IssuanceError> {
        let user_id: &Uuid = session.user_id();
        let issuer: EligibleIssuer = self.check_eligibility(user_id)?;

        let quota: QuotaRecord = self.quotas.get(user_id)?;
        if quota.remaining() <= 0 {
            return Err(IssuanceError::QuotaExhausted);
        }

        let invite: InviteCode = self.create_invite_code(&issuer)?;

        let quota: QuotaRecord = match self.quotas.consume_one(user_id) {
            Ok(quota) => quota,
            Err(err) => {
                if let Err(withdraw_err) = self.ledger.withdraw(&invite.code) {
                    warn!(
                        "Invite code {} kept after failed decrement: {}",
                        invite.code, withdraw_err
                    );
                }
                return Err(match err {
                    QuotaError::QuotaExhausted(_) => IssuanceError::QuotaExhausted,
                    err => err.into(),
                });
            }
        };

        let link: String = self.invite_link(&invite.code);
        let message: String = format!(
            "{} wants to show you their closet. Cirql is invite-only, join with this link:\n\n{}",
            session.identity.public_name(),
            link
        );
        info!(
            "Invite code {} issued by {}, {} remaining",
            invite.code,
            user_id,
            quota.remaining()
        );
        Ok(IssuedInvite {
            code: invite.code,
            link,
            message,
            remaining: quota.remaining(),
        })
    }

    pub fn invite_overview(&self, session: &Session) -> Result<InviteOverview, IssuanceError> {
        let user_id: &Uuid = session.user_id();
        let quota: Option<QuotaRecord> = match self.quotas.get(user_id) {
            Ok(quota) => Some(quota),
            Err(QuotaError::NoQuotaRecord(_)) => None,
            Err(err) => return Err(err.into()),
        };
        Ok(InviteOverview {
            quota,
            authored_posts: self.posts.count_by_author(user_id)?,
            min_posts: self.invite_policy.min_posts,
            invites: self.ledger.list_issued(user_id)?,
        })
    }
}
