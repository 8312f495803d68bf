use crate::{
    chat::{Conversation, Message},
    error::DatabaseError,
    invite_ledger::InviteCode,
    posts::Post,
    quota::QuotaRecord,
    schema::{
        comments, conversations, follows, invites, likes, messages, posts, sessions,
        user_invite_quota, users,
    },
    social::Comment,
    user::Identity,
};
use chrono::NaiveDateTime;
use diesel::{AsChangeset, Identifiable, Insertable, Queryable, Selectable};
use email_address::EmailAddress;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value)
        .map_err(|err| DatabaseError::CorruptRow(format!("{column} {value:?}: {err}")))
}

#[derive(Insertable, Queryable, Selectable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(primary_key(id))]
#[diesel(table_name = users)]
pub struct UserModel {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub hashed_and_salted_password: String,
    pub created_at: NaiveDateTime,
}

impl UserModel {
    pub fn to_identity(&self) -> Result<Identity, DatabaseError> {
        let email: EmailAddress = EmailAddress::from_str(&self.email).map_err(|err| {
            DatabaseError::CorruptRow(format!("users.email {:?}: {}", self.email, err))
        })?;
        Ok(Identity {
            id: parse_uuid(&self.id, "users.id")?,
            email,
            username: self.username.to_owned(),
            display_name: self.display_name.to_owned(),
            avatar_url: self.avatar_url.to_owned(),
            created_at: self.created_at.and_utc(),
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(token_hash))]
#[diesel(table_name = sessions)]
pub struct SessionModel {
    pub token_hash: String,
    pub user_id: String,
    pub recovery: bool,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(code))]
#[diesel(table_name = invites)]
pub struct InviteModel {
    pub code: String,
    pub created_by: String,
    pub is_used: bool,
    pub used_by: Option<String>,
    pub used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl InviteModel {
    pub fn to_invite_code(&self) -> Result<InviteCode, DatabaseError> {
        Ok(InviteCode {
            code: self.code.to_owned(),
            issuer_id: parse_uuid(&self.created_by, "invites.created_by")?,
            used: self.is_used,
            used_by: match self.used_by.as_deref() {
                Some(used_by) => Some(parse_uuid(used_by, "invites.used_by")?),
                None => None,
            },
            used_at: self.used_at.map(|used_at| used_at.and_utc()),
            created_at: self.created_at.and_utc(),
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(user_id))]
#[diesel(table_name = user_invite_quota)]
pub struct QuotaModel {
    pub user_id: String,
    pub total_invites: i32,
    pub used_invites: i32,
}

impl QuotaModel {
    pub fn to_quota_record(&self) -> Result<QuotaRecord, DatabaseError> {
        Ok(QuotaRecord {
            user_id: parse_uuid(&self.user_id, "user_invite_quota.user_id")?,
            total: self.total_invites,
            used: self.used_invites,
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(id))]
#[diesel(table_name = posts)]
pub struct PostModel {
    pub id: String,
    pub user_id: String,
    pub image_path: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub story: Option<String>,
    pub price: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl PostModel {
    pub fn to_post(&self) -> Result<Post, DatabaseError> {
        Ok(Post {
            id: parse_uuid(&self.id, "posts.id")?,
            user_id: parse_uuid(&self.user_id, "posts.user_id")?,
            image_path: self.image_path.to_owned(),
            image_url: self.image_url.to_owned(),
            caption: self.caption.to_owned(),
            story: self.story.to_owned(),
            price: self.price,
            created_at: self.created_at.and_utc(),
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(id))]
#[diesel(table_name = conversations)]
pub struct ConversationModel {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub post_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_message_at: NaiveDateTime,
}

impl ConversationModel {
    pub fn to_conversation(&self) -> Result<Conversation, DatabaseError> {
        Ok(Conversation {
            id: parse_uuid(&self.id, "conversations.id")?,
            participants: [
                parse_uuid(&self.participant_a, "conversations.participant_a")?,
                parse_uuid(&self.participant_b, "conversations.participant_b")?,
            ],
            post_id: match self.post_id.as_deref() {
                Some(post_id) => Some(parse_uuid(post_id, "conversations.post_id")?),
                None => None,
            },
            created_at: self.created_at.and_utc(),
            last_message_at: self.last_message_at.and_utc(),
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(id))]
#[diesel(table_name = messages)]
pub struct MessageModel {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

impl MessageModel {
    pub fn to_message(&self) -> Result<Message, DatabaseError> {
        Ok(Message {
            id: parse_uuid(&self.id, "messages.id")?,
            conversation_id: parse_uuid(&self.conversation_id, "messages.conversation_id")?,
            sender_id: parse_uuid(&self.sender_id, "messages.sender_id")?,
            content: self.content.to_owned(),
            created_at: self.created_at.and_utc(),
            read_at: self.read_at.map(|read_at| read_at.and_utc()),
        })
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(follower_id, following_id))]
#[diesel(table_name = follows)]
pub struct FollowModel {
    pub follower_id: String,
    pub following_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(user_id, post_id))]
#[diesel(table_name = likes)]
pub struct LikeModel {
    pub user_id: String,
    pub post_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(primary_key(id))]
#[diesel(table_name = comments)]
pub struct CommentModel {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl CommentModel {
    pub fn to_comment(&self) -> Result<Comment, DatabaseError> {
        Ok(Comment {
            id: parse_uuid(&self.id, "comments.id")?,
            post_id: parse_uuid(&self.post_id, "comments.post_id")?,
            user_id: parse_uuid(&self.user_id, "comments.user_id")?,
            content: self.content.to_owned(),
            created_at: self.created_at.and_utc(),
        })
    }
}
