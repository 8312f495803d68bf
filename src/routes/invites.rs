use super::{require_session, run_blocking};
use crate::{
    cirql_manager::CirqlManager,
    error::Error,
    flows::invite_issuance::{InviteOverview, IssuedInvite},
    invite_ledger::InviteStatus,
    user_session::Session,
};
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use std::sync::Arc;

/// Public, the landing page checks the code before showing the signup form.
pub async fn validate_invite_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    Path(code): Path<String>,
) -> Result<Json<InviteStatus>, Error> {
    let status: InviteStatus = run_blocking(&manager, move |manager| {
        Ok(manager.validate_invite(&code)?)
    })
    .await?;
    Ok(Json(status))
}

pub async fn list_invites_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<InviteOverview>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let overview: InviteOverview = run_blocking(&manager, move |manager| {
        Ok(manager.invite_overview(&session)?)
    })
    .await?;
    Ok(Json(overview))
}

pub async fn issue_invite_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let issued: IssuedInvite = run_blocking(&manager, move |manager| {
        Ok(manager.issue_invite(&session)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(issued)).into_response())
}
