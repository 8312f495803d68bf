use crate::{
    database::{is_foreign_key_violation, is_unique_violation, DbPool},
    error::{DatabaseError, SocialError},
    model::{parse_uuid, CommentModel, FollowModel, LikeModel, UserModel},
    posts::Post,
    schema::{comments, follows, likes, users},
    serde_implementations::datetime_utc,
    user::MemberProfile,
};
use chrono::{DateTime, Utc};
use diesel::{
    dsl::count_star, ExpressionMethods, JoinOnDsl, OptionalExtension, QueryDsl, RunQueryDsl,
    SelectableHelper,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

pub const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

/// A post as the feed shows it to one viewer.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub post: Post,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

/// A member's public page header.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberOverview {
    #[serde(flatten)]
    pub profile: MemberProfile,
    #[serde(flatten)]
    pub follows: FollowCounts,
    pub posts_count: i64,
    pub is_following: bool,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub members: Vec<MemberProfile>,
    pub posts: Vec<Post>,
}

fn to_ids(post_ids: &[Uuid]) -> Vec<String> {
    post_ids.iter().map(Uuid::to_string).collect()
}

fn to_counts(rows: Vec<(String, i64)>, column: &str) -> Result<HashMap<Uuid, i64>, DatabaseError> {
    rows.into_iter()
        .map(|(id, count)| parse_uuid(&id, column).map(|id| (id, count)))
        .collect()
}

fn to_profiles(models: Vec<UserModel>) -> Result<Vec<MemberProfile>, SocialError> {
    Ok(models
        .iter()
        .map(|model| model.to_identity().map(|identity| identity.to_profile()))
        .collect::<Result<Vec<MemberProfile>, DatabaseError>>()?)
}

/// Who follows whom. Both directions are idempotent.
pub trait FollowStore: Send + Sync {
    fn follow(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<(), SocialError>;
    fn unfollow(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<(), SocialError>;
    fn is_following(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<bool, SocialError>;
    /// Most recent follower first.
    fn followers(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError>;
    /// Most recently followed first.
    fn following(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError>;
    fn counts(&self, user_id: &Uuid) -> Result<FollowCounts, SocialError>;
}

pub struct SqliteFollowStore {
    pool: DbPool,
}

impl SqliteFollowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl FollowStore for SqliteFollowStore {
    fn follow(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<(), SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(follows::table)
            .values(FollowModel {
                follower_id: follower_id.to_string(),
                following_id: following_id.to_string(),
                created_at: Utc::now().naive_utc(),
            })
            .execute(&mut connection)
        {
            Ok(_) => {
                info!("{} now follows {}", follower_id, following_id);
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(SocialError::UnknownMember(*following_id))
            }
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }

    fn unfollow(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<(), SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let _ = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id.to_string()))
                .filter(follows::following_id.eq(following_id.to_string())),
        )
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn is_following(&self, follower_id: &Uuid, following_id: &Uuid) -> Result<bool, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        Ok(follows::table
            .filter(follows::follower_id.eq(follower_id.to_string()))
            .filter(follows::following_id.eq(following_id.to_string()))
            .select(follows::created_at)
            .first::<chrono::NaiveDateTime>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?
            .is_some())
    }

    fn followers(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_profiles(
            follows::table
                .inner_join(users::table.on(users::id.eq(follows::follower_id)))
                .filter(follows::following_id.eq(user_id.to_string()))
                .order(follows::created_at.desc())
                .select(UserModel::as_select())
                .load::<UserModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }

    fn following(&self, user_id: &Uuid) -> Result<Vec<MemberProfile>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_profiles(
            follows::table
                .inner_join(users::table.on(users::id.eq(follows::following_id)))
                .filter(follows::follower_id.eq(user_id.to_string()))
                .order(follows::created_at.desc())
                .select(UserModel::as_select())
                .load::<UserModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }

    fn counts(&self, user_id: &Uuid) -> Result<FollowCounts, SocialError> {
        let id: String = user_id.to_string();
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let followers: i64 = follows::table
            .filter(follows::following_id.eq(&id))
            .count()
            .get_result(&mut connection)
            .map_err(DatabaseError::from)?;
        let following: i64 = follows::table
            .filter(follows::follower_id.eq(&id))
            .count()
            .get_result(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(FollowCounts {
            followers,
            following,
        })
    }
}

/// One like per member and post. Liking twice or unliking a post never liked is a no-op.
pub trait LikeStore: Send + Sync {
    fn like(&self, user_id: &Uuid, post_id: &Uuid) -> Result<(), SocialError>;
    fn unlike(&self, user_id: &Uuid, post_id: &Uuid) -> Result<(), SocialError>;
    /// Posts without likes are absent from the map.
    fn counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, SocialError>;
    /// The subset of `post_ids` the member has liked.
    fn liked_by(&self, user_id: &Uuid, post_ids: &[Uuid]) -> Result<HashSet<Uuid>, SocialError>;
}

pub struct SqliteLikeStore {
    pool: DbPool,
}

impl SqliteLikeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LikeStore for SqliteLikeStore {
    fn like(&self, user_id: &Uuid, post_id: &Uuid) -> Result<(), SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(likes::table)
            .values(LikeModel {
                user_id: user_id.to_string(),
                post_id: post_id.to_string(),
                created_at: Utc::now().naive_utc(),
            })
            .execute(&mut connection)
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => Err(SocialError::PostNotFound(*post_id)),
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }

    fn unlike(&self, user_id: &Uuid, post_id: &Uuid) -> Result<(), SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let _ = diesel::delete(
            likes::table
                .filter(likes::user_id.eq(user_id.to_string()))
                .filter(likes::post_id.eq(post_id.to_string())),
        )
        .execute(&mut connection)
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let rows: Vec<(String, i64)> = likes::table
            .filter(likes::post_id.eq_any(to_ids(post_ids)))
            .group_by(likes::post_id)
            .select((likes::post_id, count_star()))
            .load::<(String, i64)>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(to_counts(rows, "likes.post_id")?)
    }

    fn liked_by(&self, user_id: &Uuid, post_ids: &[Uuid]) -> Result<HashSet<Uuid>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let liked: Vec<String> = likes::table
            .filter(likes::user_id.eq(user_id.to_string()))
            .filter(likes::post_id.eq_any(to_ids(post_ids)))
            .select(likes::post_id)
            .load::<String>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(liked
            .iter()
            .map(|post_id| parse_uuid(post_id, "likes.post_id"))
            .collect::<Result<HashSet<Uuid>, DatabaseError>>()?)
    }
}

pub trait CommentStore: Send + Sync {
    fn add(&self, post_id: &Uuid, user_id: &Uuid, content: &str) -> Result<Comment, SocialError>;
    fn get(&self, comment_id: &Uuid) -> Result<Option<Comment>, SocialError>;
    /// Oldest first.
    fn list(&self, post_id: &Uuid) -> Result<Vec<Comment>, SocialError>;
    fn delete(&self, comment_id: &Uuid) -> Result<(), SocialError>;
    /// Posts without comments are absent from the map.
    fn counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, SocialError>;
}

pub struct SqliteCommentStore {
    pool: DbPool,
}

impl SqliteCommentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl CommentStore for SqliteCommentStore {
    fn add(&self, post_id: &Uuid, user_id: &Uuid, content: &str) -> Result<Comment, SocialError> {
        let model = CommentModel {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_owned(),
            created_at: Utc::now().naive_utc(),
        };
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        match diesel::insert_into(comments::table)
            .values(&model)
            .execute(&mut connection)
        {
            Ok(_) => Ok(model.to_comment()?),
            Err(err) if is_foreign_key_violation(&err) => Err(SocialError::PostNotFound(*post_id)),
            Err(err) => Err(DatabaseError::from(err).into()),
        }
    }

    fn get(&self, comment_id: &Uuid) -> Result<Option<Comment>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let model: Option<CommentModel> = comments::table
            .filter(comments::id.eq(comment_id.to_string()))
            .first::<CommentModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(match model {
            Some(model) => Some(model.to_comment()?),
            None => None,
        })
    }

    fn list(&self, post_id: &Uuid) -> Result<Vec<Comment>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let models: Vec<CommentModel> = comments::table
            .filter(comments::post_id.eq(post_id.to_string()))
            .order(comments::created_at.asc())
            .load::<CommentModel>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(models
            .iter()
            .map(CommentModel::to_comment)
            .collect::<Result<Vec<Comment>, DatabaseError>>()?)
    }

    fn delete(&self, comment_id: &Uuid) -> Result<(), SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let deleted = diesel::delete(comments::table.filter(comments::id.eq(comment_id.to_string())))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        if deleted == 0 {
            return Err(SocialError::CommentNotFound(*comment_id));
        }
        Ok(())
    }

    fn counts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, SocialError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let rows: Vec<(String, i64)> = comments::table
            .filter(comments::post_id.eq_any(to_ids(post_ids)))
            .group_by(comments::post_id)
            .select((comments::post_id, count_star()))
            .load::<(String, i64)>(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(to_counts(rows, "comments.post_id")?)
    }
}
