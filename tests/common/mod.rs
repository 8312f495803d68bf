#![allow(dead_code)]

use cirql::{
    change_feed::ChangeFeed,
    cirql_manager::{CirqlManager, Stores},
    config::Config,
    database::{establish_pool, DbPool},
    error::MailError,
    invite_ledger::InviteCode,
    mailer::Mailer,
    posts::PostDraft,
    user::{Identity, SignupAttributes},
    user_session::Session,
};
use email_address::EmailAddress;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PASSWORD: &str = "hunter22";
pub const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, _, body)| body.to_owned())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Mailer for RecordingMailer {
    fn send_email_to_recipient(
        &self,
        recipient: &EmailAddress,
        subject: String,
        body: String,
    ) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject, body));
        Ok(())
    }
}

pub struct TestContext {
    pub dir: TempDir,
    pub config: Config,
    pub pool: DbPool,
    pub mailer: Arc<RecordingMailer>,
    pub manager: Arc<CirqlManager>,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.url = dir
        .path()
        .join("cirql.sqlite")
        .to_string_lossy()
        .into_owned();
    config.database.max_connections = 16;
    config.storage.root = dir.path().join("storage");
    config.storage.public_url = "http://localhost:8886/storage".into();
    config.server.public_base_url = "https://cirql.test".into();
    config
}

pub fn context() -> TestContext {
    context_with(|stores| stores)
}

/// Like `context`, with the chance to wrap or swap stores before the manager is built.
pub fn context_with(wrap: impl FnOnce(Stores) -> Stores) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let pool = establish_pool(&config.database).unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let changes = ChangeFeed::default();
    let stores = Stores::sqlite(pool.clone(), &config, mailer.clone(), &changes);
    let manager = Arc::new(CirqlManager::new(wrap(stores), changes, &config));
    TestContext {
        dir,
        config,
        pool,
        mailer,
        manager,
    }
}

impl TestContext {
    /// An account created directly in the identity store, with the default quota seeded.
    pub fn member(&self, username: &str) -> Identity {
        let identity = self
            .manager
            .identities
            .create_account(
                &format!("{username}@example.com"),
                PASSWORD,
                &SignupAttributes {
                    username: username.into(),
                    display_name: None,
                },
            )
            .unwrap();
        self.manager
            .quotas
            .seed(&identity.id, self.config.invites.default_total)
            .unwrap();
        identity
    }

    pub fn session(&self, identity: &Identity) -> Session {
        self.manager
            .identities
            .sign_in(identity.email.as_str(), PASSWORD)
            .unwrap()
            .session
    }

    pub fn add_posts(&self, session: &Session, count: usize) {
        for i in 0..count {
            self.manager
                .create_post(
                    session,
                    JPEG,
                    "image/jpeg",
                    &PostDraft::caption(&format!("item {i}")),
                )
                .unwrap();
        }
    }

    /// A member who may issue invites, and their session.
    pub fn eligible_member(&self, username: &str) -> (Identity, Session) {
        let identity = self.member(username);
        let session = self.session(&identity);
        self.add_posts(&session, self.config.invites.min_posts as usize);
        (identity, session)
    }

    /// A fresh unused code issued straight through the ledger, leaving quota untouched.
    pub fn invite_code(&self, issuer: &Identity) -> InviteCode {
        let proof = self.manager.check_eligibility(&issuer.id).unwrap();
        self.manager.ledger.create(&proof).unwrap()
    }
}
