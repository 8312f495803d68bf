use email_address::EmailAddress;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Pool({0})")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Query({0})")]
    Query(#[from] diesel::result::Error),
    #[error("Migration({0})")]
    Migration(String),
    #[error("CorruptRow({0})")]
    CorruptRow(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("DuplicateCode({0})")]
    DuplicateCode(String),
    #[error("IssuerNotEligible({0})")]
    IssuerNotEligible(Uuid),
    #[error("CodeNotFound({0})")]
    CodeNotFound(String),
    #[error("AlreadyUsed({0})")]
    AlreadyUsed(String),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("NoQuotaRecord({0})")]
    NoQuotaRecord(Uuid),
    #[error("AlreadyExists({0})")]
    AlreadyExists(Uuid),
    #[error("QuotaExhausted({0})")]
    QuotaExhausted(Uuid),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("InvalidMailbox({0})")]
    InvalidMailbox(String),
    #[error("Build({0})")]
    Build(#[from] lettre::error::Error),
    #[error("Transport({0})")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Email is already registered: {0}")]
    EmailTaken(EmailAddress),
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("Username must be 2-30 letters, digits, '_' or '.'")]
    InvalidUsername,
    #[error("Invalid login credentials")]
    IncorrectCredentials,
    #[error("Session is missing or expired")]
    SessionNotFound,
    #[error("Recovery sessions can only update the password")]
    RecoverySession,
    #[error("UserNotFound({0})")]
    UserNotFound(Uuid),
    #[error("Argon2({0})")]
    Argon2(#[from] argon2::Error),
    #[error("Mail({0})")]
    Mail(#[from] MailError),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum SignupError {
    #[error("Invalid invite code: {0}")]
    InvalidInviteCode(String),
    #[error("Invite code has already been used: {0}")]
    CodeAlreadyUsed(String),
    #[error("{0}")]
    SignupFailed(IdentityError),
    #[error("Ledger({0})")]
    Ledger(#[from] LedgerError),
}

#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("Post {shortfall} more item(s) before inviting friends")]
    NotEligible { shortfall: i64 },
    #[error("No invites remaining")]
    QuotaExhausted,
    #[error("Could not generate a free invite code after {0} attempts")]
    CodeSpaceExhausted(u32),
    #[error("Ledger({0})")]
    Ledger(#[from] LedgerError),
    #[error("Quota({0})")]
    Quota(#[from] QuotaError),
    #[error("Post({0})")]
    Post(#[from] PostError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("InvalidBucket({0})")]
    InvalidBucket(String),
    #[error("InvalidPath({0})")]
    InvalidPath(String),
    #[error("Io({0})")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),
    #[error("Image is empty")]
    EmptyImage,
    #[error("Image data is not valid base64")]
    InvalidImageEncoding,
    #[error("Price cannot be negative")]
    InvalidPrice,
    #[error("Post not found: {0}")]
    PostNotFound(Uuid),
    #[error("Only the author can change this post")]
    NotAuthor,
    #[error("Storage({0})")]
    Storage(#[from] StorageError),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("Not a participant of this conversation")]
    NotParticipant,
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,
    #[error("No such member: {0}")]
    UnknownParticipant(Uuid),
    #[error("Message must be between 1 and {0} characters")]
    InvalidContent(usize),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum SocialError {
    #[error("Cannot follow yourself")]
    SelfFollow,
    #[error("No such member: {0}")]
    UnknownMember(Uuid),
    #[error("Post not found: {0}")]
    PostNotFound(Uuid),
    #[error("Comment not found: {0}")]
    CommentNotFound(Uuid),
    #[error("Only the author can delete this comment")]
    NotCommentAuthor,
    #[error("Comment must be between 1 and {0} characters")]
    InvalidComment(usize),
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Read({0}, {1})")]
    Read(PathBuf, std::io::Error),
    #[error("Parse({0})")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid({0})")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("MissingProperties({0})")]
    MissingProperties(String),
    #[error("InvalidOrigin({0}, {1})")]
    InvalidOrigin(axum::http::header::InvalidHeaderValue, String),
    #[error("Bind({0})")]
    Bind(std::io::Error),
    #[error("Serve({0})")]
    Serve(std::io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database({0})")]
    Database(#[from] DatabaseError),
    #[error("Ledger({0})")]
    Ledger(#[from] LedgerError),
    #[error("Quota({0})")]
    Quota(#[from] QuotaError),
    #[error("Identity({0})")]
    Identity(#[from] IdentityError),
    #[error("Signup({0})")]
    Signup(#[from] SignupError),
    #[error("Issuance({0})")]
    Issuance(#[from] IssuanceError),
    #[error("Post({0})")]
    Post(#[from] PostError),
    #[error("Chat({0})")]
    Chat(#[from] ChatError),
    #[error("Social({0})")]
    Social(#[from] SocialError),
    #[error("Storage({0})")]
    Storage(#[from] StorageError),
    #[error("Mail({0})")]
    Mail(#[from] MailError),
    #[error("Config({0})")]
    Config(#[from] ConfigError),
    #[error("Startup({0})")]
    Startup(#[from] StartupError),
    #[error("BlockingTask({0})")]
    BlockingTask(String),
}
