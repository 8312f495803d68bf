use crate::{
    cryptography::{generate_from_charset, BASE36_UPPER_CHARSET},
    database::{is_unique_violation, DbConnection, DbPool},
    error::{DatabaseError, LedgerError},
    model::InviteModel,
    schema::invites,
    serde_implementations::{datetime_utc, option_datetime_utc},
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use regex::Regex;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

pub const INVITE_CODE_SUFFIX_LENGTH: usize = 6;
pub const MAX_INVITE_PREFIX_LENGTH: usize = 24;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InviteCode {
    pub code: String,
    pub issuer_id: Uuid,
    pub used: bool,
    pub used_by: Option<Uuid>,
    #[serde(with = "option_datetime_utc")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteStatus {
    pub issuer_id: Uuid,
    pub used: bool,
}

/// Shape of a well formed code: the configured prefix followed by six base-36 characters.
#[derive(Debug, Clone)]
pub struct InviteCodeFormat {
    prefix: String,
    pattern: Regex,
}

impl InviteCodeFormat {
    pub fn new(prefix: &str) -> Self {
        // any prefix the config accepts, so codes issued before a prefix change still parse
        let pattern = Regex::new(&format!(
            r"^[0-9A-Z-]{{1,{}}}[0-9A-Z]{{{}}}$",
            MAX_INVITE_PREFIX_LENGTH, INVITE_CODE_SUFFIX_LENGTH
        ))
        .expect("constant pattern is valid");
        Self {
            prefix: prefix.to_owned(),
            pattern,
        }
    }

    /// Codes are stored and looked up uppercase, so user typed input is normalized first.
    pub fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Whether the ledger could hold this code, under the current prefix or an earlier one.
    pub fn is_well_formed(&self, normalized_code: &str) -> bool {
        self.pattern.is_match(normalized_code)
    }

    pub fn generate(&self) -> String {
        format!(
            "{}{}",
            self.prefix,
            generate_from_charset(&BASE36_UPPER_CHARSET, INVITE_CODE_SUFFIX_LENGTH)
        )
    }
}

/// Proof that an issuer passed the post count check. Only the issuance workflow can
/// construct one, so the ledger never mints codes for a caller that skipped it.
#[derive(Debug, Clone, Copy)]
pub struct EligibleIssuer {
    user_id: Uuid,
    authored_posts: i64,
    min_posts: i64,
}

impl EligibleIssuer {
    pub(crate) fn new(user_id: Uuid, authored_posts: i64, min_posts: i64) -> Self {
        Self {
            user_id,
            authored_posts,
            min_posts,
        }
    }

    pub fn user_id(&self) -> &Uuid {
        &self.user_id
    }

    pub fn is_eligible(&self) -> bool {
        self.authored_posts >= self.min_posts
    }
}

/// Persistence of invite codes and their one-time redemption.
pub trait InviteLedger: Send + Sync {
    fn create(&self, issuer: &EligibleIssuer) -> Result<InviteCode, LedgerError>;
    fn validate(&self, code: &str) -> Result<InviteStatus, LedgerError>;
    /// Succeeds for exactly one caller per code, however many race.
    fn redeem(&self, code: &str, redeemer_id: &Uuid) -> Result<(), LedgerError>;
    fn list_issued(&self, issuer_id: &Uuid) -> Result<Vec<InviteCode>, LedgerError>;
    /// Removes a code that was never handed out. Used codes are kept forever.
    fn withdraw(&self, code: &str) -> Result<(), LedgerError>;
}

pub struct SqliteInviteLedger {
    pool: DbPool,
    format: InviteCodeFormat,
}

impl SqliteInviteLedger {
    pub fn new(pool: DbPool, format: InviteCodeFormat) -> Self {
        Self { pool, format }
    }

    fn insert_code(&self, issuer_id: &Uuid, code: String) -> Result<InviteCode, LedgerError> {
        let invite = InviteModel {
            code,
            created_by: issuer_id.to_string(),
            is_used: false,
            used_by: None,
            used_at: None,
            created_at: Utc::now().naive_utc(),
        };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(invites::table)
            .values(&invite)
            .execute(&mut connection)
        {
            Ok(_) => Ok(invite.to_invite_code()?),
            Err(err) if is_unique_violation(&err) => Err(LedgerError::DuplicateCode(invite.code)),
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }
}

/// Why a conditional write on an unused code touched nothing.
fn unavailable(connection: &mut DbConnection, code: String) -> Result<LedgerError, DatabaseError> {
    let exists: i64 = invites::table
        .filter(invites::code.eq(&code))
        .count()
        .get_result(connection)?;
    Ok(if exists == 0 {
        LedgerError::CodeNotFound(code)
    } else {
        LedgerError::AlreadyUsed(code)
    })
}

impl InviteLedger for SqliteInviteLedger {
    fn create(&self, issuer: &EligibleIssuer) -> Result<InviteCode, LedgerError> {
        if !issuer.is_eligible() {
            return Err(LedgerError::IssuerNotEligible(issuer.user_id));
        }
        let invite = self.insert_code(&issuer.user_id, self.format.generate())?;
        info!("Invite code {} created by {}", invite.code, invite.issuer_id);
        Ok(invite)
    }

    fn validate(&self, code: &str) -> Result<InviteStatus, LedgerError> {
        let code: String = InviteCodeFormat::normalize(code);
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let invite: InviteModel = invites::table
            .filter(invites::code.eq(&code))
            .first::<InviteModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?
            .ok_or(LedgerError::CodeNotFound(code))?;
        let invite: InviteCode = invite.to_invite_code()?;
        Ok(InviteStatus {
            issuer_id: invite.issuer_id,
            used: invite.used,
        })
    }

    fn redeem(&self, code: &str, redeemer_id: &Uuid) -> Result<(), LedgerError> {
        let code: String = InviteCodeFormat::normalize(code);
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let updated = diesel::update(
            invites::table
                .filter(invites::code.eq(&code))
                .filter(invites::is_used.eq(false)),
        )
        .set((
            invites::is_used.eq(true),
            invites::used_by.eq(Some(redeemer_id.to_string())),
            invites::used_at.eq(Some(Utc::now().naive_utc())),
        ))
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        if updated == 1 {
            info!("Invite code {} redeemed by {}", code, redeemer_id);
            return Ok(());
        }
        Err(unavailable(&mut connection, code)?)
    }

    fn list_issued(&self, issuer_id: &Uuid) -> Result<Vec<InviteCode>, LedgerError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let models: Vec<InviteModel> = invites::table
            .filter(invites::created_by.eq(issuer_id.to_string()))
            .order(invites::created_at.desc())
            .load::<InviteModel>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(models
            .iter()
            .map(InviteModel::to_invite_code)
            .collect::<Result<Vec<InviteCode>, DatabaseError>>()?)
    }

    fn withdraw(&self, code: &str) -> Result<(), LedgerError> {
        let code: String = InviteCodeFormat::normalize(code);
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let deleted = diesel::delete(
            invites::table
                .filter(invites::code.eq(&code))
                .filter(invites::is_used.eq(false)),
        )
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        if deleted == 0 {
            return Err(unavailable(&mut connection, code)?);
        }
        info!("Invite code {} withdrawn", code);
        Ok(())
    }
}
