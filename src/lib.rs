use blake3::Hasher;

pub mod change_feed;
pub mod chat;
pub mod cirql_manager;
pub mod cirql_server;
pub mod config;
pub mod cryptography;
pub mod database;
pub mod error;
pub mod flows;
pub mod identity_store;
pub mod invite_ledger;
pub mod logging;
pub mod mailer;
pub mod model;
pub mod posts;
pub mod quota;
pub mod routes;
pub mod schema;
pub mod serde_implementations;
pub mod social;
pub mod storage;
pub mod r#trait;
pub mod user;
pub mod user_session;

pub const INVITE_CODE_PREFIX: &str = "CIRQL-";
/// Invites granted to every new member.
pub const DEFAULT_INVITE_TOTAL: i32 = 3;
/// Authored posts required before a member may issue invites.
pub const MIN_POSTS_FOR_INVITES: i64 = 2;

///hashes with blake3
pub fn hash_string(data: &str) -> String {
    let mut hasher = Hasher::new();
    let _ = hasher.update(data.as_bytes());
    hasher.finalize().to_string()
}
