use crate::{
    config::{SessionConfig, ServerConfig},
    cryptography::{generate_session_token, hash_password, verify_password},
    database::{is_unique_violation, DbPool},
    error::{DatabaseError, IdentityError},
    hash_string,
    mailer::Mailer,
    model::{SessionModel, UserModel},
    r#trait::Expired,
    schema::{sessions, users},
    posts::like_pattern,
    user::{
        valid_username, Identity, MemberProfile, ProfileUpdate, SignupAttributes,
        MIN_PASSWORD_LENGTH,
    },
    user_session::{IssuedSession, Session},
};
use chrono::{DateTime, Duration, Utc};
use diesel::{
    BoolExpressionMethods, EscapeExpressionMethods, ExpressionMethods,
    NullableExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, TextExpressionMethods,
};
use email_address::EmailAddress;
use std::{str::FromStr, sync::Arc};
use tracing::info;
use uuid::Uuid;

/// Account creation, credentials and sessions.
pub trait IdentityStore: Send + Sync {
    fn create_account(
        &self,
        email: &str,
        password: &str,
        attributes: &SignupAttributes,
    ) -> Result<Identity, IdentityError>;
    fn current_session(&self, token: &str) -> Result<Option<Session>, IdentityError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, IdentityError>;
    fn sign_out(&self, token: &str) -> Result<(), IdentityError>;
    /// Unknown addresses are accepted silently so the endpoint can't be used to enumerate accounts.
    fn request_password_reset(&self, email: &str) -> Result<(), IdentityError>;
    fn update_password(&self, session: &Session, new_password: &str) -> Result<(), IdentityError>;
    fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<Identity, IdentityError>;
    fn delete_account(&self, user_id: &Uuid) -> Result<(), IdentityError>;
    fn profile(&self, user_id: &Uuid) -> Result<Option<MemberProfile>, IdentityError>;
    /// Case-insensitive substring match on username or display name.
    fn search_members(&self, query: &str, limit: i64) -> Result<Vec<MemberProfile>, IdentityError>;
}

fn parse_email(email: &str) -> Result<EmailAddress, IdentityError> {
    let email = email.trim().to_lowercase();
    EmailAddress::from_str(&email).map_err(|_| IdentityError::InvalidEmail(email))
}

fn check_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::WeakPassword(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

pub const MAX_MEMBER_RESULTS: i64 = 10;

pub struct SqliteIdentityStore {
    pool: DbPool,
    mailer: Arc<dyn Mailer>,
    session_lifetime: Duration,
    recovery_lifetime: Duration,
    public_base_url: String,
}

impl SqliteIdentityStore {
    pub fn new(
        pool: DbPool,
        mailer: Arc<dyn Mailer>,
        sessions: &SessionConfig,
        server: &ServerConfig,
    ) -> Self {
        Self {
            pool,
            mailer,
            session_lifetime: Duration::seconds(sessions.session_lifetime_seconds),
            recovery_lifetime: Duration::seconds(sessions.recovery_lifetime_seconds),
            public_base_url: server.public_base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn find_user_by_email(&self, email: &EmailAddress) -> Result<Option<UserModel>, IdentityError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        Ok(users::table
            .filter(users::email.eq(email.as_str()))
            .first::<UserModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?)
    }

    fn issue_session(
        &self,
        user: &UserModel,
        recovery: bool,
    ) -> Result<IssuedSession, IdentityError> {
        let token: String = generate_session_token();
        let now = Utc::now();
        let expires_at: DateTime<Utc> = now
            + if recovery {
                self.recovery_lifetime
            } else {
                self.session_lifetime
            };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let _ = diesel::insert_into(sessions::table)
            .values(SessionModel {
                token_hash: hash_string(&token),
                user_id: user.id.to_owned(),
                recovery,
                expires_at: expires_at.naive_utc(),
                created_at: now.naive_utc(),
            })
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(IssuedSession {
            token,
            session: Session {
                identity: user.to_identity()?,
                expires_at,
                recovery,
            },
        })
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn create_account(
        &self,
        email: &str,
        password: &str,
        attributes: &SignupAttributes,
    ) -> Result<Identity, IdentityError> {
        let email: EmailAddress = parse_email(email)?;
        check_password(password)?;
        let username = attributes.username.trim();
        if !valid_username(username) {
            return Err(IdentityError::InvalidUsername);
        }
        let display_name = attributes
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|display_name| !display_name.is_empty())
            .map(str::to_owned);
        let user = UserModel {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_owned(),
            display_name,
            avatar_url: None,
            hashed_and_salted_password: hash_password(password)?,
            created_at: Utc::now().naive_utc(),
        };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(users::table)
            .values(&user)
            .execute(&mut connection)
        {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(IdentityError::EmailTaken(email)),
            Err(err) => return Err(DatabaseError::from(err).into()),
        }
        info!("Account created: ({}, {})", user.id, user.email);
        Ok(user.to_identity()?)
    }

    fn current_session(&self, token: &str) -> Result<Option<Session>, IdentityError> {
        let token_hash: String = hash_string(token);
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let row: Option<(SessionModel, UserModel)> = sessions::table
            .inner_join(users::table)
            .filter(sessions::token_hash.eq(&token_hash))
            .first::<(SessionModel, UserModel)>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        let (session, user) = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let expires_at: DateTime<Utc> = session.expires_at.and_utc();
        if expires_at.expired() {
            let _ = diesel::delete(sessions::table.filter(sessions::token_hash.eq(&token_hash)))
                .execute(&mut connection)
                .map_err(DatabaseError::from)?;
            return Ok(None);
        }
        Ok(Some(Session {
            identity: user.to_identity()?,
            expires_at,
            recovery: session.recovery,
        }))
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<IssuedSession, IdentityError> {
        let email: EmailAddress =
            parse_email(email).map_err(|_| IdentityError::IncorrectCredentials)?;
        let user: UserModel = match self.find_user_by_email(&email)? {
            Some(user) => user,
            None => return Err(IdentityError::IncorrectCredentials),
        };
        if !verify_password(&user.hashed_and_salted_password, password)? {
            return Err(IdentityError::IncorrectCredentials);
        }
        let issued = self.issue_session(&user, false)?;
        info!("User signed in: ({}, {})", user.username, user.id);
        Ok(issued)
    }

    fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let _ = diesel::delete(sessions::table.filter(sessions::token_hash.eq(hash_string(token))))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn request_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let email: EmailAddress = parse_email(email)?;
        let user: UserModel = match self.find_user_by_email(&email)? {
            Some(user) => user,
            None => {
                info!("Password reset requested for unknown address {}", email);
                return Ok(());
            }
        };
        let issued = self.issue_session(&user, true)?;
        self.mailer.send_email_to_recipient(
            &email,
            "Reset your Cirql password".into(),
            format!(
                "{}/reset-password#token={}",
                self.public_base_url, issued.token
            ),
        )?;
        info!("Password reset mailed for user {}", user.id);
        Ok(())
    }

    fn update_password(&self, session: &Session, new_password: &str) -> Result<(), IdentityError> {
        check_password(new_password)?;
        let hashed: String = hash_password(new_password)?;
        let user_id: String = session.user_id().to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let updated = diesel::update(users::table.filter(users::id.eq(&user_id)))
            .set(users::hashed_and_salted_password.eq(hashed))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        if updated == 0 {
            return Err(IdentityError::UserNotFound(*session.user_id()));
        }
        let _ = diesel::delete(
            sessions::table
                .filter(sessions::user_id.eq(&user_id))
                .filter(sessions::recovery.eq(true)),
        )
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        info!("Password updated for user {}", user_id);
        Ok(())
    }

    fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<Identity, IdentityError> {
        if session.recovery {
            return Err(IdentityError::RecoverySession);
        }
        let user_id: String = session.user_id().to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        if let Some(display_name) = update.display_name.as_deref() {
            let display_name = display_name.trim();
            let _ = diesel::update(users::table.filter(users::id.eq(&user_id)))
                .set(users::display_name.eq(if display_name.is_empty() {
                    None
                } else {
                    Some(display_name.to_owned())
                }))
                .execute(&mut connection)
                .map_err(DatabaseError::from)?;
        }
        if let Some(avatar_url) = update.avatar_url.as_deref() {
            let _ = diesel::update(users::table.filter(users::id.eq(&user_id)))
                .set(users::avatar_url.eq(Some(avatar_url.to_owned())))
                .execute(&mut connection)
                .map_err(DatabaseError::from)?;
        }
        let user: UserModel = users::table
            .filter(users::id.eq(&user_id))
            .first::<UserModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?
            .ok_or(IdentityError::UserNotFound(*session.user_id()))?;
        Ok(user.to_identity()?)
    }

    fn delete_account(&self, user_id: &Uuid) -> Result<(), IdentityError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let deleted = diesel::delete(users::table.filter(users::id.eq(user_id.to_string())))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        if deleted == 0 {
            return Err(IdentityError::UserNotFound(*user_id));
        }
        info!("Account deleted: {}", user_id);
        Ok(())
    }

    fn profile(&self, user_id: &Uuid) -> Result<Option<MemberProfile>, IdentityError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let user: Option<UserModel> = users::table
            .filter(users::id.eq(user_id.to_string()))
            .first::<UserModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(match user {
            Some(user) => Some(user.to_identity()?.to_profile()),
            None => None,
        })
    }

    fn search_members(&self, query: &str, limit: i64) -> Result<Vec<MemberProfile>, IdentityError> {
        let pattern: String = like_pattern(query.trim());
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let models: Vec<UserModel> = users::table
            .filter(
                users::username
                    .like(&pattern)
                    .escape('\\')
                    .nullable()
                    .or(users::display_name.like(&pattern).escape('\\')),
            )
            .order(users::username.asc())
            .limit(limit.clamp(1, MAX_MEMBER_RESULTS))
            .load::<UserModel>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(models
            .iter()
            .map(|model| model.to_identity().map(|identity| identity.to_profile()))
            .collect::<Result<Vec<MemberProfile>, DatabaseError>>()?)
    }
}
