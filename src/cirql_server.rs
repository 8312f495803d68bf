use crate::{
    cirql_manager::CirqlManager,
    config::Config,
    database::{establish_pool, DbPool},
    error::{Error, StartupError},
    mailer::{LogMailer, Mailer, SmtpManager},
    routes::{
        account::{
            avatar_route, login_route, logout_route, password_reset_route, session_route,
            signup_route, update_password_route, update_profile_route,
        },
        base::health_route,
        chat::{
            list_conversations_route, list_messages_route, mark_read_route, next_message_route,
            open_conversation_route, send_message_route, unread_count_route,
        },
        invites::{issue_invite_route, list_invites_route, validate_invite_route},
        posts::{
            add_comment_route, create_post_route, delete_comment_route, delete_post_route,
            feed_route, like_post_route, list_comments_route, unlike_post_route,
            update_post_route,
        },
        social::{
            follow_route, followers_route, following_route, member_route, search_route,
            unfollow_route,
        },
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE},
        HeaderValue, Method,
    },
    routing::{delete, get, patch, post, put},
    Extension, Router,
};
use core::fmt;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tokio::{net::TcpListener, sync::Notify, task::JoinHandle};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Base64 photos are roughly a third larger than the files themselves.
const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

pub struct Signals {
    pub stop: Arc<AtomicBool>,
    pub stop_notify: Arc<Notify>,
}

impl Signals {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        //keeps a permit if the server task isn't waiting yet
        self.stop_notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum RequiredProperties {
    Config,
    CookieName,
    AllowedOrigin,
    DatabaseUrl,
}

impl fmt::Display for RequiredProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Config => "Config",
                Self::CookieName => "CookieName",
                Self::AllowedOrigin => "AllowedOrigin",
                Self::DatabaseUrl => "DatabaseUrl",
            }
        )
    }
}

/// The full HTTP surface with CORS, request tracing and the public storage mount.
pub fn router(manager: Arc<CirqlManager>, config: &Config) -> Result<Router, StartupError> {
    let allowed_origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|err| StartupError::InvalidOrigin(err, origin.to_owned()))
        })
        .collect::<Result<Vec<HeaderValue>, StartupError>>()?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(vec![CONTENT_TYPE, AUTHORIZATION, COOKIE])
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true);

    Ok(Router::new()
        .route("/health", get(health_route))
        .route("/account/signup", post(signup_route))
        .route("/account/login", post(login_route))
        .route("/account/logout", post(logout_route))
        .route("/account/session", get(session_route))
        .route("/account/password-reset", post(password_reset_route))
        .route("/account/password", post(update_password_route))
        .route("/account/profile", patch(update_profile_route))
        .route("/account/avatar", put(avatar_route))
        .route("/invites/validate/:code", get(validate_invite_route))
        .route("/invites", get(list_invites_route).post(issue_invite_route))
        .route("/posts", get(feed_route).post(create_post_route))
        .route(
            "/posts/:id",
            patch(update_post_route).delete(delete_post_route),
        )
        .route(
            "/posts/:id/like",
            put(like_post_route).delete(unlike_post_route),
        )
        .route(
            "/posts/:id/comments",
            get(list_comments_route).post(add_comment_route),
        )
        .route("/comments/:id", delete(delete_comment_route))
        .route("/users/:id", get(member_route))
        .route("/users/:id/follow", put(follow_route).delete(unfollow_route))
        .route("/users/:id/followers", get(followers_route))
        .route("/users/:id/following", get(following_route))
        .route("/search", get(search_route))
        .route(
            "/conversations",
            get(list_conversations_route).post(open_conversation_route),
        )
        .route(
            "/conversations/:id/messages",
            get(list_messages_route).post(send_message_route),
        )
        .route("/conversations/:id/read", post(mark_read_route))
        .route("/conversations/:id/next-message", get(next_message_route))
        .route("/messages/unread-count", get(unread_count_route))
        .nest_service("/storage", ServeDir::new(&config.storage.root))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(manager)))
}

#[derive(Default)]
pub struct Builder {
    //required
    config: Option<Config>,

    //optional
    mailer: Option<Arc<dyn Mailer>>,
    pool: Option<DbPool>,
}

impl Builder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to SMTP when configured, otherwise mail is only logged.
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Defaults to a fresh pool over `database.url` with migrations applied.
    pub fn pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub async fn start_server(self) -> Result<Arc<CirqlServer>, Error> {
        let mut missing_properties: Vec<RequiredProperties> = Vec::new();
        match self.config.as_ref() {
            None => missing_properties.push(RequiredProperties::Config),
            Some(config) => {
                if config.server.cookie_name_base.is_empty() {
                    missing_properties.push(RequiredProperties::CookieName);
                }
                if config.server.allowed_origins.is_empty() {
                    missing_properties.push(RequiredProperties::AllowedOrigin);
                }
                if self.pool.is_none() && config.database.url.is_empty() {
                    missing_properties.push(RequiredProperties::DatabaseUrl);
                }
            }
        }
        let config: Config = match self.config {
            Some(config) if missing_properties.is_empty() => config,
            _ => {
                return Err(StartupError::MissingProperties(
                    missing_properties
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<String>>()
                        .join(", "),
                )
                .into())
            }
        };
        config.validate()?;

        let mailer: Arc<dyn Mailer> = match (self.mailer, config.smtp.as_ref()) {
            (Some(mailer), _) => mailer,
            (None, Some(smtp)) => Arc::new(SmtpManager::new(smtp)?),
            (None, None) => {
                warn!("No SMTP server configured, outgoing mail will only be logged");
                Arc::new(LogMailer)
            }
        };
        let pool: DbPool = match self.pool {
            Some(pool) => pool,
            None => establish_pool(&config.database)?,
        };
        let manager: Arc<CirqlManager> =
            Arc::new(CirqlManager::from_config(pool, &config, mailer));
        let app: Router = router(manager.to_owned(), &config)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
        let local_addr: SocketAddr = listener.local_addr().map_err(StartupError::Bind)?;
        info!("REST endpoint listening on {}", local_addr);

        let signals = Signals {
            stop: Arc::new(AtomicBool::new(false)),
            stop_notify: Arc::new(Notify::new()),
        };
        let stop_notify: Arc<Notify> = signals.stop_notify.to_owned();
        let serve_task: JoinHandle<()> = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { stop_notify.notified().await })
            .await;
            if let Err(err) = result {
                error!("{}", StartupError::Serve(err));
            }
        });

        Ok(Arc::new(CirqlServer {
            manager,
            signals,
            local_addr,
            serve_task: Mutex::new(Some(serve_task)),
        }))
    }
}

pub struct CirqlServer {
    pub manager: Arc<CirqlManager>,
    pub signals: Signals,
    pub local_addr: SocketAddr,
    serve_task: Mutex<Option<JoinHandle<()>>>,
}

impl CirqlServer {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    pub async fn shutdown(&self) {
        if self.signals.is_stopped() {
            return;
        }
        self.signals.stop();
        let serve_task: Option<JoinHandle<()>> = match self.serve_task.lock() {
            Ok(mut serve_task) => serve_task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(serve_task) = serve_task {
            if let Err(err) = serve_task.await {
                error!("Server task ended abnormally: {}", err);
            }
        }
        info!("Server stopped");
    }
}
