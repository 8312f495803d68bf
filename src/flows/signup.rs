use crate::{
    cirql_manager::CirqlManager,
    error::{LedgerError, SignupError},
    invite_ledger::{InviteCodeFormat, InviteStatus},
    user::{Identity, SignupAttributes},
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub invite_code: String,
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CirqlManager {
    /// Normalized code, or `InvalidInviteCode` when it can't possibly exist.
    fn well_formed_invite_code(&self, code: &str) -> Result<String, SignupError> {
        let code: String = InviteCodeFormat::normalize(code);
        if !self.invite_format.is_well_formed(&code) {
            return Err(SignupError::InvalidInviteCode(code));
        }
        Ok(code)
    }

    /// Landing page check: does the code exist and is it still unused.
    pub fn validate_invite(&self, code: &str) -> Result<InviteStatus, SignupError> {
        let code: String = self.well_formed_invite_code(code)?;
        match self.ledger.validate(&code) {
            Ok(status) if status.used => Err(SignupError::CodeAlreadyUsed(code)),
            Ok(status) => Ok(status),
            Err(LedgerError::CodeNotFound(code)) => Err(SignupError::InvalidInviteCode(code)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn sign_up(&self, request: &SignupRequest) -> Result<Identity, SignupError> {
        let code: String = self.well_formed_invite_code(&request.invite_code)?;
        let _ = self.validate_invite(&code)?;

        let identity: Identity = self
            .identities
            .create_account(
                &request.email,
                &request.password,
                &SignupAttributes {
                    username: request.username.to_owned(),
                    display_name: request.display_name.to_owned(),
                },
            )
            .map_err(SignupError::SignupFailed)?;

        if let Err(err) = self.ledger.redeem(&code, &identity.id) {
            self.discard_identity(&identity.id);
            return Err(match err {
                LedgerError::AlreadyUsed(code) => {
                    warn!("Invite code {} was redeemed concurrently", code);
                    SignupError::CodeAlreadyUsed(code)
                }
                LedgerError::CodeNotFound(code) => SignupError::InvalidInviteCode(code),
                err => err.into(),
            });
        }

        if let Err(err) = self
            .quotas
            .seed(&identity.id, self.invite_policy.default_total)
        {
            warn!("Starting invites not granted to {}: {}", identity.id, err);
        }

        info!(
            "User {} signed up with invite code {}",
            identity.username, code
        );
        Ok(identity)
    }

    /// Undoes `create_account` for a signup whose code could not be redeemed.
    fn discard_identity(&self, user_id: &Uuid) {
        match self.identities.delete_account(user_id) {
            Ok(()) => info!("Discarded account {} after failed redemption", user_id),
            Err(err) => warn!("Account {} left without a redeemed code: {}", user_id, err),
        }
    }
}
