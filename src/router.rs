use crate::handlers::{
    activities::{list_dsa_activities, list_system_logs},
    applications::{
        assign_application, create_application, create_application_with_files, get_application,
        get_application_history, get_completeness, list_applications, update_application_status,
    },
    auth::{login, register},
    documents::{delete_document, list_documents, upload_documents},
    health::health_check,
    messages::{list_messages, mark_messages_read, post_message},
    notifications::{get_notifications, mark_notifications_read},
    statistics::get_statistics,
    tickets::{
        add_ticket_response, create_ticket, get_ticket, list_tickets, update_ticket_status,
    },
    users::{get_me, get_user, list_users, set_user_active, update_me, verify_user},
};
use crate::errors::expose_internal_details;
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use model::enums::DocumentType;
use sea_orm::Iterable;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom for the JSON part and multipart framing.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Body limit for multipart routes: one maximum-size file per document type.
fn upload_body_limit(state: &AppState) -> usize {
    let files = DocumentType::iter().count() as u64;
    (state.config.max_upload_bytes() * files) as usize + FORM_OVERHEAD_BYTES
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(upload_body_limit(&state));

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Sessions
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        // Accounts
        .route("/api/v1/users/me", get(get_me))
        .route("/api/v1/users/me", put(update_me))
        .route("/api/v1/users", get(list_users))
        .route("/api/v1/users/:user_id", get(get_user))
        .route("/api/v1/users/:user_id/verify", put(verify_user))
        .route("/api/v1/users/:user_id/active", put(set_user_active))
        // Applications
        .route("/api/v1/applications", post(create_application))
        .route(
            "/api/v1/applications/with-files",
            post(create_application_with_files).layer(upload_limit),
        )
        .route("/api/v1/applications", get(list_applications))
        .route("/api/v1/applications/:application_id", get(get_application))
        .route("/api/v1/applications/:application_id", put(update_application_status))
        .route("/api/v1/applications/:application_id/history", get(get_application_history))
        .route("/api/v1/applications/:application_id/assign", put(assign_application))
        .route("/api/v1/applications/:application_id/completeness", get(get_completeness))
        .route("/api/v1/applications/:application_id/documents", get(list_documents))
        .route(
            "/api/v1/applications/:application_id/documents",
            post(upload_documents).layer(upload_limit),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:document_id",
            delete(delete_document),
        )
        // Chat
        .route("/api/v1/applications/:application_id/messages", get(list_messages))
        .route("/api/v1/applications/:application_id/messages", post(post_message))
        .route("/api/v1/applications/:application_id/messages/read", put(mark_messages_read))
        // Support tickets
        .route("/api/v1/tickets", post(create_ticket))
        .route("/api/v1/tickets", get(list_tickets))
        .route("/api/v1/tickets/:ticket_id", get(get_ticket))
        .route("/api/v1/tickets/:ticket_id/responses", post(add_ticket_response))
        .route("/api/v1/tickets/:ticket_id/status", put(update_ticket_status))
        // Feeds and aggregates
        .route("/api/v1/notifications", get(get_notifications))
        .route("/api/v1/notifications", put(mark_notifications_read))
        .route("/api/v1/statistics", get(get_statistics))
        .route("/api/v1/dsa/activities", get(list_dsa_activities))
        .route("/api/v1/system-logs", get(list_system_logs))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(middleware::map_response_with_state(
            state.clone(),
            expose_internal_details,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
