use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod audit;
pub mod auth;
pub mod documents;
pub mod health;
pub mod maintenance;
pub mod messages;
pub mod projects;
pub mod reports;
pub mod tasks;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let users_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/pending", get(users::list_pending_users))
        .route("/:id/approve", post(users::approve_user))
        .route("/:id/role", post(users::change_role))
        .route("/:id/password", post(users::reset_password));

    let projects_routes = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/:id/tasks", post(tasks::create_task))
        .route(
            "/:id/messages",
            get(messages::list_project_messages).post(messages::send_project_message),
        )
        .route(
            "/:id/messages/read",
            post(messages::mark_project_messages_read),
        )
        .route(
            "/:id/messages/unread",
            get(messages::unread_project_messages),
        );

    let tasks_routes = Router::new()
        .route("/pending-approvals", get(tasks::pending_approvals))
        .route("/:id", patch(tasks::update_task))
        .route("/:id/start", post(tasks::start_task))
        .route("/:id/approve", post(tasks::approve_task))
        .route(
            "/:id/documents",
            get(documents::list_documents).post(documents::upload_document),
        );

    let documents_routes =
        Router::new().route("/:id/download", get(documents::download_document));

    let messages_routes = Router::new()
        .route("/direct/unread", get(messages::unread_direct_messages))
        .route("/direct/partners", get(messages::direct_partners))
        .route(
            "/direct/:peer",
            get(messages::list_direct_messages).post(messages::send_direct_message),
        )
        .route(
            "/direct/:peer/read",
            post(messages::mark_direct_messages_read),
        );

    let audit_routes = Router::new().route("/", get(audit::list_audit));

    let reports_routes = Router::new().route("/summary", get(reports::summary));

    let maintenance_routes = Router::new().route("/cleanup", post(maintenance::cleanup_orphans));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/projects", projects_routes)
        .nest("/api/tasks", tasks_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/messages", messages_routes)
        .nest("/api/audit", audit_routes)
        .nest("/api/reports", reports_routes)
        .nest("/api/maintenance", maintenance_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 64))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
