use super::{require_session, run_blocking};
use crate::{
    change_feed::{RowChange, Subscription},
    chat::{Conversation, ConversationSummary, Message},
    cirql_manager::CirqlManager,
    error::Error,
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
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_WAIT_SECONDS: u64 = 25;
const MAX_WAIT_SECONDS: u64 = 60;

#[derive(Debug, Deserialize)]
pub struct OpenConversation {
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    pub timeout_seconds: Option<u64>,
}

pub async fn list_conversations_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Vec<ConversationSummary>>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let summaries: Vec<ConversationSummary> = run_blocking(&manager, move |manager| {
        manager.conversation_summaries(&session)
    })
    .await?;
    Ok(Json(summaries))
}

pub async fn open_conversation_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(request): Json<OpenConversation>,
) -> Result<Json<Conversation>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let conversation: Conversation = run_blocking(&manager, move |manager| {
        Ok(manager.open_conversation(&session, &request.user_id, request.post_id.as_ref())?)
    })
    .await?;
    Ok(Json(conversation))
}

pub async fn list_messages_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let messages: Vec<Message> = run_blocking(&manager, move |manager| {
        Ok(manager.list_messages(&session, &conversation_id)?)
    })
    .await?;
    Ok(Json(messages))
}

pub async fn send_message_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(conversation_id): Path<Uuid>,
    Json(new_message): Json<NewMessage>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let message: Message = run_blocking(&manager, move |manager| {
        Ok(manager.send_message(&session, &conversation_id, &new_message.content)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

pub async fn mark_read_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let updated: Vec<Message> = run_blocking(&manager, move |manager| {
        Ok(manager.mark_read(&session, &conversation_id)?)
    })
    .await?;
    Ok(Json(updated))
}

pub async fn unread_count_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let unread: i64 = run_blocking(&manager, move |manager| {
        Ok(manager.unread_count(&session)?)
    })
    .await?;
    Ok(Json(json!({ "unread": unread })).into_response())
}

/// Long poll: the next message inserted into the conversation, or 204 once the wait runs out.
pub async fn next_message_route(
    Extension(manager): Extension<Arc<CirqlManager>>,
    cookies: Option<TypedHeader<Cookie>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<WaitQuery>,
) -> Result<Response, Error> {
    let session: Session = require_session(&manager, &cookies, &authorization, false).await?;
    let mut subscription: Subscription = run_blocking(&manager, move |manager| {
        Ok(manager.subscribe_messages(&session, &conversation_id)?)
    })
    .await?;
    let wait = Duration::from_secs(
        query
            .timeout_seconds
            .unwrap_or(DEFAULT_WAIT_SECONDS)
            .clamp(1, MAX_WAIT_SECONDS),
    );
    let next = tokio::time::timeout(wait, async {
        while let Some(change) = subscription.recv().await {
            if let RowChange::MessageInserted(message) = change {
                return Some(message);
            }
        }
        None
    })
    .await;
    subscription.unsubscribe();
    match next {
        Ok(Some(message)) => Ok(Json(message).into_response()),
        Ok(None) | Err(_) => {
            debug!("No new message in {} within {:?}", conversation_id, wait);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
