use super::{
    cleared_session_cookie, require_session, run_blocking, session_cookie, session_token,
    ImageUpload,
};
use crate::{
    cirql_manager::CirqlManager,
    error::Error,
    flows::signup::SignupRequest,
    user::{Identity, ProfileUpdate},
    user_session::{IssuedSession, Session},
};
use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPassword {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DisplayNameUpdate {
    pub display_name: Option<String>,
}

/// Creates the account from an invite code and signs the new member straight in.
pub async fn signup_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    Json(request): Json<SignupRequest>,
) -> Result<Response, Error> {
    let issued: IssuedSession = run_blocking(&manager, move |manager| {
        let _ = manager.sign_up(&request)?;
        Ok(manager
            .identities
            .sign_in(&request.email, &request.password)?)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, session_cookie(&manager, &issued))],
        Json(issued.session.identity),
    )
        .into_response())
}

pub async fn login_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Response, Error> {
    let issued: IssuedSession = run_blocking(&manager, move |manager| {
        Ok(manager
            .identities
            .sign_in(&credentials.email, &credentials.password)?)
    })
    .await?;
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, session_cookie(&manager, &issued))],
        Json(issued.session.identity),
    )
        .into_response())
}

pub async fn logout_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Response, Error> {
    if let Some(token) = session_token(&manager, &cookies, &authorization) {
        run_blocking(&manager, move |manager| {
            Ok(manager.identities.sign_out(&token)?)
        })
        .await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, cleared_session_cookie(&manager))],
    )
        .into_response())
}

pub async fn session_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Session>, Error> {
    Ok(Json(
        require_session(&manager, &cookies, &authorization, true).await?,
    ))
}

pub async fn password_reset_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<StatusCode, Error> {
    run_blocking(&manager, move |manager| {
        Ok(manager.identities.request_password_reset(&request.email)?)
    })
    .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Accepts recovery sessions, the only thing they are good for.
pub async fn update_password_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(request): Json<NewPassword>,
) -> Result<StatusCode, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, true).await?;
    run_blocking(&manager, move |manager| {
        Ok(manager
            .identities
            .update_password(&session, &request.password)?)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(update): Json<DisplayNameUpdate>,
) -> Result<Json<Identity>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let identity: Identity = run_blocking(&manager, move |manager| {
        Ok(manager.identities.update_profile(
            &session,
            &ProfileUpdate {
                display_name: update.display_name,
                avatar_url: None,
            },
        )?)
    })
    .await?;
    Ok(Json(identity))
}

pub async fn avatar_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(upload): Json<ImageUpload>,
) -> Result<Json<Identity>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let identity: Identity = run_blocking(&manager, move |manager| {
        let image: Vec<u8> = upload.decode()?;
        manager.upload_avatar(&session, &image, &upload.content_type)
    })
    .await?;
    Ok(Json(identity))
}
