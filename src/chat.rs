use crate::{
    change_feed::{ChangeFeed, RowChange},
    database::{is_foreign_key_violation, is_unique_violation, DbConnection, DbPool},
    error::{ChatError, DatabaseError},
    model::{ConversationModel, MessageModel},
    schema::{conversations, messages},
    serde_implementations::{datetime_utc, option_datetime_utc},
    user::MemberProfile,
};
use chrono::{DateTime, Utc};
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, QueryDsl,
    RunQueryDsl,
};
use serde::Serialize;
use uuid::Uuid;

pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub post_id: Option<Uuid>,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
    /// Equal to `created_at` until the first message arrives.
    #[serde(with = "datetime_utc")]
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn includes(&self, user_id: &Uuid) -> bool {
        self.participants.contains(user_id)
    }

    pub fn other_participant(&self, user_id: &Uuid) -> &Uuid {
        if &self.participants[0] == user_id {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }
}

/// One row of the chat list.
#[derive(Serialize, Debug, Clone)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_member: Option<MemberProfile>,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "option_datetime_utc")]
    pub read_at: Option<DateTime<Utc>>,
}

/// Conversations and messages. Implementations publish every message write on the
/// change feed they were built with.
pub trait ChatStore: Send + Sync {
    /// The pair is unordered: (a, b) and (b, a) resolve to the same conversation.
    /// `b` is reported as the unknown member when the pair doesn't exist.
    fn find_or_create_conversation(
        &self,
        a: &Uuid,
        b: &Uuid,
        post_id: Option<&Uuid>,
    ) -> Result<Conversation, ChatError>;
    fn get_conversation(&self, conversation_id: &Uuid) -> Result<Option<Conversation>, ChatError>;
    /// Most recent activity first.
    fn list_conversations(&self, user_id: &Uuid) -> Result<Vec<Conversation>, ChatError>;
    fn insert_message(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        content: &str,
    ) -> Result<Message, ChatError>;
    /// Oldest first.
    fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, ChatError>;
    /// Marks everything the other participant sent as read; returns the updated messages.
    fn mark_read(&self, conversation_id: &Uuid, reader_id: &Uuid)
        -> Result<Vec<Message>, ChatError>;
    fn last_message(&self, conversation_id: &Uuid) -> Result<Option<Message>, ChatError>;
    /// Messages in one conversation the reader hasn't seen yet.
    fn unread_in(&self, conversation_id: &Uuid, reader_id: &Uuid) -> Result<i64, ChatError>;
    /// Unread messages across all of the member's conversations.
    fn unread_count(&self, user_id: &Uuid) -> Result<i64, ChatError>;
}

pub struct SqliteChatStore {
    pool: DbPool,
    changes: ChangeFeed,
}

impl SqliteChatStore {
    pub fn new(pool: DbPool, changes: ChangeFeed) -> Self {
        Self { pool, changes }
    }
}

fn to_messages(models: Vec<MessageModel>) -> Result<Vec<Message>, ChatError> {
    Ok(models
        .iter()
        .map(MessageModel::to_message)
        .collect::<Result<Vec<Message>, DatabaseError>>()?)
}

fn find_conversation(
    connection: &mut DbConnection,
    low: &str,
    high: &str,
    post_id: Option<&Uuid>,
) -> Result<Option<ConversationModel>, DatabaseError> {
    let mut query = conversations::table
        .filter(conversations::participant_a.eq(low))
        .filter(conversations::participant_b.eq(high))
        .into_boxed();
    query = match post_id {
        Some(post_id) => query.filter(conversations::post_id.eq(post_id.to_string())),
        None => query.filter(conversations::post_id.is_null()),
    };
    Ok(query
        .first::<ConversationModel>(connection)
        .optional()?)
}

impl ChatStore for SqliteChatStore {
    fn find_or_create_conversation(
        &self,
        a: &Uuid,
        b: &Uuid,
        post_id: Option<&Uuid>,
    ) -> Result<Conversation, ChatError> {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let (low, high) = (low.to_string(), high.to_string());
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        if let Some(existing) = find_conversation(&mut connection, &low, &high, post_id)? {
            return Ok(existing.to_conversation()?);
        }
        let now = Utc::now().naive_utc();
        let conversation = ConversationModel {
            id: Uuid::new_v4().to_string(),
            participant_a: low,
            participant_b: high,
            post_id: post_id.map(Uuid::to_string),
            created_at: now,
            last_message_at: now,
        };
        match diesel::insert_into(conversations::table)
            .values(&conversation)
            .execute(&mut connection)
        {
            Ok(_) => Ok(conversation.to_conversation()?),
            //the other participant opened it first
            Err(err) if is_unique_violation(&err) => match find_conversation(
                &mut connection,
                &conversation.participant_a,
                &conversation.participant_b,
                post_id,
            )? {
                Some(existing) => Ok(existing.to_conversation()?),
                None => Err(DatabaseError::from(err).into()),
            },
            Err(err) if is_foreign_key_violation(&err) => Err(ChatError::UnknownParticipant(*b)),
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }

    fn get_conversation(&self, conversation_id: &Uuid) -> Result<Option<Conversation>, ChatError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let model: Option<ConversationModel> = conversations::table
            .filter(conversations::id.eq(conversation_id.to_string()))
            .first::<ConversationModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(match model {
            Some(model) => Some(model.to_conversation()?),
            None => None,
        })
    }

    fn list_conversations(&self, user_id: &Uuid) -> Result<Vec<Conversation>, ChatError> {
        let id: String = user_id.to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let models: Vec<ConversationModel> = conversations::table
            .filter(
                conversations::participant_a
                    .eq(&id)
                    .or(conversations::participant_b.eq(&id)),
            )
            .order(conversations::last_message_at.desc())
            .load::<ConversationModel>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(models
            .iter()
            .map(ConversationModel::to_conversation)
            .collect::<Result<Vec<Conversation>, DatabaseError>>()?)
    }

    fn insert_message(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        content: &str,
    ) -> Result<Message, ChatError> {
        let model = MessageModel {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_owned(),
            created_at: Utc::now().naive_utc(),
            read_at: None,
        };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        connection
            .transaction::<_, diesel::result::Error, _>(|connection| {
                let _ = diesel::insert_into(messages::table)
                    .values(&model)
                    .execute(connection)?;
                let _ = diesel::update(
                    conversations::table.filter(conversations::id.eq(&model.conversation_id)),
                )
                .set(conversations::last_message_at.eq(model.created_at))
                .execute(connection)?;
                Ok(())
            })
            .map_err(DatabaseError::from)?;
        let message: Message = model.to_message()?;
        self.changes
            .publish(RowChange::MessageInserted(message.to_owned()));
        Ok(message)
    }

    fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, ChatError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_messages(
            messages::table
                .filter(messages::conversation_id.eq(conversation_id.to_string()))
                .order(messages::created_at.asc())
                .load::<MessageModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }

    fn mark_read(
        &self,
        conversation_id: &Uuid,
        reader_id: &Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let unread: Vec<String> = messages::table
            .select(messages::id)
            .filter(messages::conversation_id.eq(conversation_id.to_string()))
            .filter(messages::sender_id.ne(reader_id.to_string()))
            .filter(messages::read_at.is_null())
            .load::<String>(&mut connection)
            .map_err(DatabaseError::from)?;
        if unread.is_empty() {
            return Ok(Vec::new());
        }
        let _ = diesel::update(
            messages::table
                .filter(messages::id.eq_any(&unread))
                .filter(messages::read_at.is_null()),
        )
        .set(messages::read_at.eq(Some(Utc::now().naive_utc())))
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        let updated: Vec<Message> = to_messages(
            messages::table
                .filter(messages::id.eq_any(&unread))
                .order(messages::created_at.asc())
                .load::<MessageModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )?;
        for message in updated.iter() {
            self.changes
                .publish(RowChange::MessageUpdated(message.to_owned()));
        }
        Ok(updated)
    }

    fn last_message(&self, conversation_id: &Uuid) -> Result<Option<Message>, ChatError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let model: Option<MessageModel> = messages::table
            .filter(messages::conversation_id.eq(conversation_id.to_string()))
            .order(messages::created_at.desc())
            .first::<MessageModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(match model {
            Some(model) => Some(model.to_message()?),
            None => None,
        })
    }

    fn unread_in(&self, conversation_id: &Uuid, reader_id: &Uuid) -> Result<i64, ChatError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        Ok(messages::table
            .filter(messages::conversation_id.eq(conversation_id.to_string()))
            .filter(messages::sender_id.ne(reader_id.to_string()))
            .filter(messages::read_at.is_null())
            .count()
            .get_result::<i64>(&mut connection)
            .map_err(DatabaseError::from)?)
    }

    fn unread_count(&self, user_id: &Uuid) -> Result<i64, ChatError> {
        let id: String = user_id.to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let own_conversations = conversations::table
            .select(conversations::id)
            .filter(
                conversations::participant_a
                    .eq(id.to_owned())
                    .or(conversations::participant_b.eq(id.to_owned())),
            );
        Ok(messages::table
            .filter(messages::conversation_id.eq_any(own_conversations))
            .filter(messages::sender_id.ne(&id))
            .filter(messages::read_at.is_null())
            .count()
            .get_result::<i64>(&mut connection)
            .map_err(DatabaseError::from)?)
    }
}
