use super::{require_session, run_blocking};
use crate::{
    cirql_manager::CirqlManager,
    error::Error,
    social::{MemberOverview, SearchResults},
    user::MemberProfile,
    user_session::Session,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn member_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MemberOverview>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let overview: MemberOverview = run_blocking(&manager, move |manager| {
        manager.member_overview(&session, &user_id)
    })
    .await?;
    Ok(Json(overview))
}

pub async fn follow_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.follow_member(&session, &user_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager.unfollow_member(&session, &user_id)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn followers_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<MemberProfile>>, Error> {
    let _ = require_session(&manager, &cookies, &authorization, false).await?;
    let followers: Vec<MemberProfile> = run_blocking(&manager, move |manager| {
        Ok(manager.followers(&user_id)?)
    })
    .await?;
    Ok(Json(followers))
}

pub async fn following_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<MemberProfile>>, Error> {
    let _ = require_session(&manager, &cookies, &authorization, false).await?;
    let following: Vec<MemberProfile> = run_blocking(&manager, move |manager| {
        Ok(manager.following(&user_id)?)
    })
    .await?;
    Ok(Json(following))
}

pub async fn search_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, Error> {
    let _ = require_session(&manager, &cookies, &authorization, false).await?;
    let results: SearchResults =
        run_blocking(&manager, move |manager| manager.search(&query.q)).await?;
    Ok(Json(results))
}
