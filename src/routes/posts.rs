use super::{require_session, run_blocking, ImageUpload};
use crate::{
    cirql_manager::CirqlManager,
    error::Error,
    posts::{Post, PostDraft},
    social::{Comment, FeedEntry},
    user_session::Session,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_FEED_PAGE: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub author: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub image: ImageUpload,
    #[serde(flatten)]
    pub draft: PostDraft,
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub content: String,
}

pub async fn feed_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedEntry>>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let entries: Vec<FeedEntry> = run_blocking(&manager, move |manager| {
        let posts: Vec<Post> = match query.author {
            Some(author) => manager.posts_by_author(&author)?,
            None => manager.feed(query.limit.unwrap_or(DEFAULT_FEED_PAGE))?,
        };
        Ok(manager.with_reactions(&session, posts)?)
    })
    .await?;
    Ok(Json(entries))
}

pub async fn create_post_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(new_post): Json<NewPost>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let post: Post = run_blocking(&manager, move |manager| {
        let image: Vec<u8> = new_post.image.decode()?;
        Ok(manager.create_post(
            &session,
            &image,
            &new_post.image.content_type,
            &new_post.draft,
        )?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

pub async fn delete_post_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.delete_post(&session, &post_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_post_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let post: Post = run_blocking(&manager, move |manager| {
        Ok(manager.update_post(&session, &post_id, &draft)?)
    })
    .await?;
    Ok(Json(post))
}

pub async fn like_post_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.like_post(&session, &post_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unlike_post_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.unlike_post(&session, &post_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, Error> {
    let _ = require_session(&manager, &cookies, &authorization, false).await?;
    let comments: Vec<Comment> = run_blocking(&manager, move |manager| {
        Ok(manager.list_comments(&post_id)?)
    })
    .await?;
    Ok(Json(comments))
}

pub async fn add_comment_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(post_id): Path<Uuid>,
    Json(new_comment): Json<NewComment>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let comment: Comment = run_blocking(&manager, move |manager| {
        Ok(manager.add_comment(&session, &post_id, &new_comment.content)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn delete_comment_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.delete_comment(&session, &comment_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
