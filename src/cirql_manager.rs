use crate::{
    change_feed::{ChangeFeed, ChangeFilter, Subscription},
    chat::{
        ChatStore, Conversation, ConversationSummary, Message, SqliteChatStore,
        MAX_MESSAGE_LENGTH,
    },
    config::{Config, InvitePolicy},
    database::DbPool,
    error::{ChatError, Error, IdentityError, PostError, SocialError},
    identity_store::{IdentityStore, SqliteIdentityStore, MAX_MEMBER_RESULTS},
    invite_ledger::{InviteCodeFormat, InviteLedger, SqliteInviteLedger},
    mailer::Mailer,
    posts::{image_extension, Post, PostDraft, PostStore, SqlitePostStore, MAX_SEARCH_RESULTS},
    quota::{QuotaTracker, SqliteQuotaTracker},
    social::{
        Comment, CommentStore, FeedEntry, FollowStore, LikeStore, MemberOverview,
        SearchResults, SqliteCommentStore, SqliteFollowStore, SqliteLikeStore,
        MAX_COMMENT_LENGTH,
    },
    storage::{FileSystemStorage, ObjectStorage, AVATARS_BUCKET, POSTS_BUCKET},
    user::{Identity, MemberProfile, ProfileUpdate},
    user_session::Session,
};
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{info, warn};
use uuid::Uuid;

/// The collaborators a manager is wired from.
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub ledger: Arc<dyn InviteLedger>,
    pub quotas: Arc<dyn QuotaTracker>,
    pub posts: Arc<dyn PostStore>,
    pub chats: Arc<dyn ChatStore>,
    pub follows: Arc<dyn FollowStore>,
    pub likes: Arc<dyn LikeStore>,
    pub comments: Arc<dyn CommentStore>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Stores {
    /// The SQLite and filesystem implementations over one pool. The chat store
    /// publishes to `changes`.
    pub fn sqlite(
        pool: DbPool,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        changes: &ChangeFeed,
    ) -> Self {
        Self {
            identities: Arc::new(SqliteIdentityStore::new(
                pool.to_owned(),
                mailer,
                &config.sessions,
                &config.server,
            )),
            ledger: Arc::new(SqliteInviteLedger::new(
                pool.to_owned(),
                InviteCodeFormat::new(&config.invites.code_prefix),
            )),
            quotas: Arc::new(SqliteQuotaTracker::new(pool.to_owned())),
            posts: Arc::new(SqlitePostStore::new(pool.to_owned())),
            chats: Arc::new(SqliteChatStore::new(pool.to_owned(), changes.to_owned())),
            follows: Arc::new(SqliteFollowStore::new(pool.to_owned())),
            likes: Arc::new(SqliteLikeStore::new(pool.to_owned())),
            comments: Arc::new(SqliteCommentStore::new(pool)),
            storage: Arc::new(FileSystemStorage::new(&config.storage)),
        }
    }
}

pub struct CirqlManager {
    pub identities: Arc<dyn IdentityStore>,
    pub ledger: Arc<dyn InviteLedger>,
    pub quotas: Arc<dyn QuotaTracker>,
    pub posts: Arc<dyn PostStore>,
    pub chats: Arc<dyn ChatStore>,
    pub follows: Arc<dyn FollowStore>,
    pub likes: Arc<dyn LikeStore>,
    pub comments: Arc<dyn CommentStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub changes: ChangeFeed,
    pub invite_policy: InvitePolicy,
    pub invite_format: InviteCodeFormat,
    pub public_base_url: String,
    pub cookie_name_base: String,
    pub cookie_domain: String,
}

impl CirqlManager {
    /// `changes` must be the feed the chat store publishes to.
    pub fn new(stores: Stores, changes: ChangeFeed, config: &Config) -> Self {
        Self {
            identities: stores.identities,
            ledger: stores.ledger,
            quotas: stores.quotas,
            posts: stores.posts,
            chats: stores.chats,
            follows: stores.follows,
            likes: stores.likes,
            comments: stores.comments,
            storage: stores.storage,
            changes,
            invite_format: InviteCodeFormat::new(&config.invites.code_prefix),
            invite_policy: config.invites.to_owned(),
            public_base_url: config.server.public_base_url.trim_end_matches('/').to_owned(),
            cookie_name_base: config.server.cookie_name_base.to_owned(),
            cookie_domain: config.server.cookie_domain.to_owned(),
        }
    }

    pub fn from_config(pool: DbPool, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let changes = ChangeFeed::default();
        let stores = Stores::sqlite(pool, config, mailer, &changes);
        Self::new(stores, changes, config)
    }

    pub fn session_cookie_name(&self) -> String {
        format!("{base}_session", base = self.cookie_name_base)
    }

    pub fn create_post(
        &self,
        session: &Session,
        image: &[u8],
        content_type: &str,
        draft: &PostDraft,
    ) -> Result<Post, PostError> {
        let draft: PostDraft = draft.normalized()?;
        let extension: &str = image_extension(content_type)?;
        if image.is_empty() {
            return Err(PostError::EmptyImage);
        }
        let post_id: Uuid = Uuid::new_v4();
        let image_path: String = format!("{}/{}.{}", session.user_id(), post_id, extension);
        let image_url: String = self.storage.put(POSTS_BUCKET, &image_path, image)?;
        let post = Post {
            id: post_id,
            user_id: *session.user_id(),
            image_path,
            image_url,
            caption: draft.caption,
            story: draft.story,
            price: draft.price,
            created_at: Utc::now(),
        };
        if let Err(err) = self.posts.insert(&post) {
            if let Err(cleanup_err) = self.storage.delete(POSTS_BUCKET, &post.image_path) {
                warn!(
                    "Orphaned photo {} left behind: {}",
                    post.image_path, cleanup_err
                );
            }
            return Err(err);
        }
        info!("Post {} created by {}", post.id, post.user_id);
        Ok(post)
    }

    /// The post, if the caller wrote it.
    fn authored_post(&self, session: &Session, post_id: &Uuid) -> Result<Post, PostError> {
        let post: Post = self
            .posts
            .get(post_id)?
            .ok_or(PostError::PostNotFound(*post_id))?;
        if &post.user_id != session.user_id() {
            warn!(
                "User {} tried to change post {} by {}",
                session.user_id(),
                post.id,
                post.user_id
            );
            return Err(PostError::NotAuthor);
        }
        Ok(post)
    }

    /// Replaces caption and price; the photo and story stay as posted.
    pub fn update_post(
        &self,
        session: &Session,
        post_id: &Uuid,
        draft: &PostDraft,
    ) -> Result<Post, PostError> {
        let draft: PostDraft = draft.normalized()?;
        let post: Post = self.authored_post(session, post_id)?;
        let post: Post =
            self.posts
                .update_details(&post.id, draft.caption.as_deref(), draft.price)?;
        info!("Post {} updated", post.id);
        Ok(post)
    }

    pub fn delete_post(&self, session: &Session, post_id: &Uuid) -> Result<(), PostError> {
        let post: Post = self.authored_post(session, post_id)?;
        self.posts.delete(post_id)?;
        if let Err(err) = self.storage.delete(POSTS_BUCKET, &post.image_path) {
            warn!("Photo for deleted post {} not removed: {}", post.id, err);
        }
        info!("Post {} deleted", post.id);
        Ok(())
    }

    pub fn feed(&self, limit: i64) -> Result<Vec<Post>, PostError> {
        self.posts.feed(limit)
    }

    /// Attaches like and comment counts, and whether the viewer liked each post.
    pub fn with_reactions(
        &self,
        session: &Session,
        posts: Vec<Post>,
    ) -> Result<Vec<FeedEntry>, SocialError> {
        let post_ids: Vec<Uuid> = posts.iter().map(|post| post.id).collect();
        let likes: HashMap<Uuid, i64> = self.likes.counts(&post_ids)?;
        let comments: HashMap<Uuid, i64> = self.comments.counts(&post_ids)?;
        let liked: HashSet<Uuid> = self.likes.liked_by(session.user_id(), &post_ids)?;
        Ok(posts
            .into_iter()
            .map(|post| FeedEntry {
                likes_count: likes.get(&post.id).copied().unwrap_or(0),
                comments_count: comments.get(&post.id).copied().unwrap_or(0),
                is_liked: liked.contains(&post.id),
                post,
            })
            .collect())
    }

    pub fn posts_by_author(&self, user_id: &Uuid) -> Result<Vec<Post>, PostError> {
        self.posts.list_by_author(user_id)
    }

    pub fn upload_avatar(
        &self,
        session: &Session,
        image: &[u8],
        content_type: &str,
    ) -> Result<Identity, Error> {
        if session.recovery {
            return Err(IdentityError::RecoverySession.into());
        }
        let extension: &str = image_extension(content_type)?;
        if image.is_empty() {
            return Err(PostError::EmptyImage.into());
        }
        let path: String = format!("{}.{}", session.user_id(), extension);
        let avatar_url: String = self.storage.put(AVATARS_BUCKET, &path, image)?;
        Ok(self.identities.update_profile(
            session,
            &ProfileUpdate {
                display_name: None,
                avatar_url: Some(avatar_url),
            },
        )?)
    }

    /// The conversation, if the caller is one of its two participants.
    fn participant_conversation(
        &self,
        session: &Session,
        conversation_id: &Uuid,
    ) -> Result<Conversation, ChatError> {
        let conversation: Conversation = self
            .chats
            .get_conversation(conversation_id)?
            .ok_or(ChatError::ConversationNotFound(*conversation_id))?;
        if !conversation.includes(session.user_id()) {
            warn!(
                "User {} is not part of conversation {}",
                session.user_id(),
                conversation_id
            );
            return Err(ChatError::NotParticipant);
        }
        Ok(conversation)
    }

    pub fn open_conversation(
        &self,
        session: &Session,
        other_user_id: &Uuid,
        post_id: Option<&Uuid>,
    ) -> Result<Conversation, ChatError> {
        if other_user_id == session.user_id() {
            return Err(ChatError::SelfConversation);
        }
        self.chats
            .find_or_create_conversation(session.user_id(), other_user_id, post_id)
    }

    pub fn list_conversations(&self, session: &Session) -> Result<Vec<Conversation>, ChatError> {
        self.chats.list_conversations(session.user_id())
    }

    /// The chat list: latest activity first, each with the other member, the last
    /// message and the caller's unread count.
    pub fn conversation_summaries(
        &self,
        session: &Session,
    ) -> Result<Vec<ConversationSummary>, Error> {
        let mut summaries: Vec<ConversationSummary> = Vec::new();
        for conversation in self.chats.list_conversations(session.user_id())? {
            let other_member: Option<MemberProfile> = self
                .identities
                .profile(conversation.other_participant(session.user_id()))?;
            summaries.push(ConversationSummary {
                last_message: self.chats.last_message(&conversation.id)?,
                unread_count: self.chats.unread_in(&conversation.id, session.user_id())?,
                other_member,
                conversation,
            });
        }
        Ok(summaries)
    }

    pub fn list_messages(
        &self,
        session: &Session,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        let conversation = self.participant_conversation(session, conversation_id)?;
        self.chats.list_messages(&conversation.id)
    }

    pub fn send_message(
        &self,
        session: &Session,
        conversation_id: &Uuid,
        content: &str,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        let length = content.chars().count();
        if length == 0 || length > MAX_MESSAGE_LENGTH {
            return Err(ChatError::InvalidContent(MAX_MESSAGE_LENGTH));
        }
        let conversation = self.participant_conversation(session, conversation_id)?;
        self.chats
            .insert_message(&conversation.id, session.user_id(), content)
    }

    pub fn mark_read(
        &self,
        session: &Session,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, ChatError> {
        let conversation = self.participant_conversation(session, conversation_id)?;
        self.chats.mark_read(&conversation.id, session.user_id())
    }

    pub fn unread_count(&self, session: &Session) -> Result<i64, ChatError> {
        self.chats.unread_count(session.user_id())
    }

    /// Change feed subscription scoped to one conversation the caller takes part in.
    pub fn subscribe_messages(
        &self,
        session: &Session,
        conversation_id: &Uuid,
    ) -> Result<Subscription, ChatError> {
        let conversation = self.participant_conversation(session, conversation_id)?;
        Ok(self
            .changes
            .subscribe(ChangeFilter::Conversation(conversation.id)))
    }

    pub fn follow_member(&self, session: &Session, user_id: &Uuid) -> Result<(), SocialError> {
        if user_id == session.user_id() {
            return Err(SocialError::SelfFollow);
        }
        self.follows.follow(session.user_id(), user_id)
    }

    pub fn unfollow_member(&self, session: &Session, user_id: &Uuid) -> Result<(), SocialError> {
        self.follows.unfollow(session.user_id(), user_id)
    }

    pub fn followers(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError> {
        self.follows.followers(user_id)
    }

    pub fn following(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError> {
        self.follows.following(user_id)
    }

    pub fn member_overview(
        &self,
        session: &Session,
        user_id: &Uuid,
    ) -> Result<MemberOverview, Error> {
        let profile: MemberProfile = self
            .identities
            .profile(user_id)?
            .ok_or(SocialError::UnknownMember(*user_id))?;
        Ok(MemberOverview {
            profile,
            follows: self.follows.counts(user_id)?,
            posts_count: self.posts.count_by_author(user_id)?,
            is_following: self.follows.is_following(session.user_id(), user_id)?,
        })
    }

    pub fn like_post(&self, session: &Session, post_id: &Uuid) -> Result<(), SocialError> {
        self.likes.like(session.user_id(), post_id)
    }

    pub fn unlike_post(&self, session: &Session, post_id: &Uuid) -> Result<(), SocialError> {
        self.likes.unlike(session.user_id(), post_id)
    }

    pub fn add_comment(
        &self,
        session: &Session,
        post_id: &Uuid,
        content: &str,
    ) -> Result<Comment, SocialError> {
        let content = content.trim();
        let length = content.chars().count();
        if length == 0 || length > MAX_COMMENT_LENGTH {
            return Err(SocialError::InvalidComment(MAX_COMMENT_LENGTH));
        }
        self.comments.add(post_id, session.user_id(), content)
    }

    /// Oldest first.
    pub fn list_comments(&self, post_id: &Uuid) -> Result<Vec<Comment>, SocialError> {
        self.comments.list(post_id)
    }

    pub fn delete_comment(&self, session: &Session, comment_id: &Uuid) -> Result<(), SocialError> {
        let comment: Comment = self
            .comments
            .get(comment_id)?
            .ok_or(SocialError::CommentNotFound(*comment_id))?;
        if &comment.user_id != session.user_id() {
            warn!(
                "User {} tried to delete comment {} by {}",
                session.user_id(),
                comment.id,
                comment.user_id
            );
            return Err(SocialError::NotCommentAuthor);
        }
        self.comments.delete(&comment.id)
    }

    /// Members by username or display name, posts by caption or story. A blank
    /// query finds nothing.
    pub fn search(&self, query: &str) -> Result<SearchResults, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }
        Ok(SearchResults {
            members: self.identities.search_members(query, MAX_MEMBER_RESULTS)?,
            posts: self.posts.search(query, MAX_SEARCH_RESULTS)?,
        })
    }
}
