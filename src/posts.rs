use crate::{
    database::DbPool,
    error::{DatabaseError, PostError},
    model::PostModel,
    schema::posts,
    serde_implementations::datetime_utc,
};
use chrono::{DateTime, Utc};
use diesel::{
    BoolExpressionMethods, EscapeExpressionMethods, ExpressionMethods, OptionalExtension,
    QueryDsl, RunQueryDsl, TextExpressionMethods,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_FEED_PAGE: i64 = 100;
pub const MAX_SEARCH_RESULTS: i64 = 20;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip)]
    pub image_path: String,
    pub image_url: String,
    pub caption: Option<String>,
    /// Why the item is special, shown under the photo.
    pub story: Option<String>,
    pub price: Option<i64>,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
}

/// The text fields of a post as the author submits them.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
}

fn trimmed(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

impl PostDraft {
    pub fn caption(caption: &str) -> Self {
        Self {
            caption: Some(caption.to_owned()),
            ..Self::default()
        }
    }

    /// Blank text becomes `None`; negative prices are rejected.
    pub fn normalized(&self) -> Result<Self, PostError> {
        if self.price.is_some_and(|price| price < 0) {
            return Err(PostError::InvalidPrice);
        }
        Ok(Self {
            caption: trimmed(&self.caption),
            story: trimmed(&self.story),
            price: self.price,
        })
    }
}

/// `%query%` for LIKE, with the wildcard characters in the query taken literally.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// File extension for the image types accepted as item photos and avatars.
pub fn image_extension(content_type: &str) -> Result<&'static str, PostError> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        "image/gif" => Ok("gif"),
        other => Err(PostError::UnsupportedImageType(other.to_owned())),
    }
}

pub trait PostStore: Send + Sync {
    fn insert(&self, post: &Post) -> Result<(), PostError>;
    fn get(&self, post_id: &Uuid) -> Result<Option<Post>, PostError>;
    fn delete(&self, post_id: &Uuid) -> Result<(), PostError>;
    /// Replaces caption and price. The photo and story stay as posted.
    fn update_details(
        &self,
        post_id: &Uuid,
        caption: Option<&str>,
        price: Option<i64>,
    ) -> Result<Post, PostError>;
    /// Newest first. `limit` is clamped to `1..=MAX_FEED_PAGE`.
    fn feed(&self, limit: i64) -> Result<Vec<Post>, PostError>;
    fn list_by_author(&self, user_id: &Uuid) -> Result<Vec<Post>, PostError>;
    fn count_by_author(&self, user_id: &Uuid) -> Result<i64, PostError>;
    /// Case-insensitive substring match on caption or story, newest first.
    fn search(&self, query: &str, limit: i64) -> Result<Vec<Post>, PostError>;
}

pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_posts(models: Vec<PostModel>) -> Result<Vec<Post>, PostError> {
    Ok(models
        .iter()
        .map(PostModel::to_post)
        .collect::<Result<Vec<Post>, DatabaseError>>()?)
}

impl PostStore for SqlitePostStore {
    fn insert(&self, post: &Post) -> Result<(), PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let _ = diesel::insert_into(posts::table)
            .values(PostModel {
                id: post.id.to_string(),
                user_id: post.user_id.to_string(),
                image_path: post.image_path.to_owned(),
                image_url: post.image_url.to_owned(),
                caption: post.caption.to_owned(),
                story: post.story.to_owned(),
                price: post.price,
                created_at: post.created_at.naive_utc(),
            })
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    fn get(&self, post_id: &Uuid) -> Result<Option<Post>, PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let model: Option<PostModel> = posts::table
            .filter(posts::id.eq(post_id.to_string()))
            .first::<PostModel>(&mut connection)
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(match model {
            Some(model) => Some(model.to_post()?),
            None => None,
        })
    }

    fn delete(&self, post_id: &Uuid) -> Result<(), PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let deleted = diesel::delete(posts::table.filter(posts::id.eq(post_id.to_string())))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        if deleted == 0 {
            return Err(PostError::PostNotFound(*post_id));
        }
        Ok(())
    }

    fn update_details(
        &self,
        post_id: &Uuid,
        caption: Option<&str>,
        price: Option<i64>,
    ) -> Result<Post, PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        let updated = diesel::update(posts::table.filter(posts::id.eq(post_id.to_string())))
            .set((posts::caption.eq(caption), posts::price.eq(price)))
            .execute(&mut connection)
            .map_err(DatabaseError::from)?;
        if updated == 0 {
            return Err(PostError::PostNotFound(*post_id));
        }
        Ok(posts::table
            .filter(posts::id.eq(post_id.to_string()))
            .first::<PostModel>(&mut connection)
            .map_err(DatabaseError::from)?
            .to_post()?)
    }

    fn feed(&self, limit: i64) -> Result<Vec<Post>, PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_posts(
            posts::table
                .order(posts::created_at.desc())
                .limit(limit.clamp(1, MAX_FEED_PAGE))
                .load::<PostModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }

    fn list_by_author(&self, user_id: &Uuid) -> Result<Vec<Post>, PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_posts(
            posts::table
                .filter(posts::user_id.eq(user_id.to_string()))
                .order(posts::created_at.desc())
                .load::<PostModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }

    fn count_by_author(&self, user_id: &Uuid) -> Result<i64, PostError> {
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        Ok(posts::table
            .filter(posts::user_id.eq(user_id.to_string()))
            .count()
            .get_result::<i64>(&mut connection)
            .map_err(DatabaseError::from)?)
    }

    fn search(&self, query: &str, limit: i64) -> Result<Vec<Post>, PostError> {
        let pattern: String = like_pattern(query.trim());
        let mut connection = self.pool.get().map_err(DatabaseError::from)?;
        to_posts(
            posts::table
                .filter(
                    posts::caption
                        .like(&pattern)
                        .escape('\\')
                        .or(posts::story.like(&pattern).escape('\\')),
                )
                .order(posts::created_at.desc())
                .limit(limit.clamp(1, MAX_SEARCH_RESULTS))
                .load::<PostModel>(&mut connection)
                .map_err(DatabaseError::from)?,
        )
    }
}
