use crate::{
    database::{is_unique_violation, DbPool},
    error::{DatabaseError, QuotaError},
    model::QuotaModel,
    schema::user_invite_quota,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    pub user_id: Uuid,
    pub total: i32,
    pub used: i32,
}

impl QuotaRecord {
    pub fn remaining(&self) -> i32 {
        self.total - self.used
    }
}

/// Per user invite allowance.
pub trait QuotaTracker: Send + Sync {
    fn get(&self, user_id: &Uuid) -> Result<QuotaRecord, QuotaError>;
    /// Grants the starting allowance. A second call for the same user is rejected.
    fn seed(&self, user_id: &Uuid, total: i32) -> Result<QuotaRecord, QuotaError>;
    /// Takes one unit if any remain. Of N concurrent calls against `remaining = r`,
    /// exactly `min(N, r)` succeed.
    fn consume_one(&self, user_id: &Uuid) -> Result<QuotaRecord, QuotaError>;
}

pub struct SqliteQuotaTracker {
    pool: DbPool,
}

impl SqliteQuotaTracker {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl QuotaTracker for SqliteQuotaTracker {
    fn get(&self, user_id: &Uuid) -> Result<QuotaRecord, QuotaError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match user_invite_quota::table
            .filter(user_invite_quota::user_id.eq(user_id.to_string()))
            .first::<QuotaModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?
        {
            Some(quota) => Ok(quota.to_quota_record()?),
            None => {
                warn!("User {} has no invite quota record", user_id);
                Err(QuotaError::NoQuotaRecord(*user_id))
            }
        }
    }

    fn seed(&self, user_id: &Uuid, total: i32) -> Result<QuotaRecord, QuotaError> {
        let quota = QuotaModel {
            user_id: user_id.to_string(),
            total_invites: total,
            used_invites: 0,
        };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(user_invite_quota::table)
            .values(&quota)
            .execute(&mut connection)
        {
            Ok(_) => {
                info!("Seeded {} invites for user {}", total, user_id);
                Ok(quota.to_quota_record()?)
            }
            Err(err) if is_unique_violation(&err) => Err(QuotaError::AlreadyExists(*user_id)),
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }

    fn consume_one(&self, user_id: &Uuid) -> Result<QuotaRecord, QuotaError> {
        let id: String = user_id.to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let updated = diesel::update(
            user_invite_quota::table
                .filter(user_invite_quota::user_id.eq(&id))
                .filter(user_invite_quota::used_invites.lt(user_invite_quota::total_invites)),
        )
        .set(user_invite_quota::used_invites.eq(user_invite_quota::used_invites + 1))
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        let quota: Option<QuotaModel> = user_invite_quota::table
            .filter(user_invite_quota::user_id.eq(&id))
            .first::<QuotaModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        match (updated, quota) {
            (1, Some(quota)) => Ok(quota.to_quota_record()?),
            (_, Some(_)) => Err(QuotaError::QuotaExhausted(*user_id)),
            (_, None) => Err(QuotaError::NoQuotaRecord(*user_id)),
        }
    }
}
