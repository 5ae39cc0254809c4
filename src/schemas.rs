use lifecycle::statistics::StatisticsReport;
use moka::future::Cache;
use model::enums::UserRole;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::storage::ObjectStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Cache for expensive read models
    pub cache: Cache<String, CachedData>,
    /// Bumped on every invalidation and part of each statistics key, so a
    /// report computed before a write can never be cached after it.
    pub stats_generation: Arc<AtomicU64>,
    pub config: Arc<AppConfig>,
    /// Document storage
    pub storage: Arc<dyn ObjectStore>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Cache key for a caller's statistics under the current generation.
    ///
    /// Take the key before reading the database: an insert made under it
    /// after a concurrent invalidation lands in a dead generation.
    pub fn statistics_key(&self, role: UserRole, user_id: i32) -> String {
        let generation = self.stats_generation.load(Ordering::Acquire);
        format!("stats_{generation}_{role}_{user_id}")
    }

    /// Drops cached aggregates after any write that affects them.
    pub fn invalidate_statistics(&self) {
        self.stats_generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Statistics(StatisticsReport),
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::verify_user,
        crate::handlers::users::set_user_active,
        crate::handlers::applications::create_application,
        crate::handlers::applications::create_application_with_files,
        crate::handlers::applications::list_applications,
        crate::handlers::applications::get_application,
        crate::handlers::applications::update_application_status,
        crate::handlers::applications::get_application_history,
        crate::handlers::applications::assign_application,
        crate::handlers::applications::get_completeness,
        crate::handlers::documents::list_documents,
        crate::handlers::documents::upload_documents,
        crate::handlers::documents::delete_document,
        crate::handlers::messages::list_messages,
        crate::handlers::messages::post_message,
        crate::handlers::messages::mark_messages_read,
        crate::handlers::tickets::create_ticket,
        crate::handlers::tickets::list_tickets,
        crate::handlers::tickets::get_ticket,
        crate::handlers::tickets::add_ticket_response,
        crate::handlers::tickets::update_ticket_status,
        crate::handlers::notifications::get_notifications,
        crate::handlers::notifications::mark_notifications_read,
        crate::handlers::statistics::get_statistics,
        crate::handlers::activities::list_dsa_activities,
        crate::handlers::activities::list_system_logs,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::RegistrationRole,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::users::UserResponse,
            crate::handlers::users::UpdateProfileRequest,
            crate::handlers::users::VerifyRequest,
            crate::handlers::users::SetActiveRequest,
            crate::handlers::applications::CreateApplicationRequest,
            crate::handlers::applications::ApplicationResponse,
            crate::handlers::applications::StatusHistoryResponse,
            crate::handlers::applications::ApplicationDetailResponse,
            crate::handlers::applications::ApplicationWithHistory,
            crate::handlers::applications::SubmissionResponse,
            crate::handlers::messages::ChatMessageResponse,
            crate::handlers::messages::PostMessageRequest,
            crate::handlers::messages::MarkReadResponse,
            crate::handlers::tickets::CreateTicketRequest,
            crate::handlers::tickets::TicketReplyRequest,
            crate::handlers::tickets::TicketStatusRequest,
            crate::handlers::tickets::TicketResponse,
            crate::handlers::tickets::TicketReplyResponse,
            crate::handlers::tickets::TicketDetailResponse,
            crate::handlers::notifications::NotificationFeed,
            crate::handlers::notifications::NotificationsReadResponse,
            crate::handlers::activities::DsaActivityResponse,
            crate::handlers::activities::SystemLogResponse,
            crate::helpers::uploads::DocumentResponse,
            crate::helpers::uploads::FailedUpload,
            crate::helpers::uploads::UploadReport,
            lifecycle::transitions::StatusChange,
            lifecycle::assignment::Assignment,
            lifecycle::completeness::CompletenessReport,
            lifecycle::notifications::Notification,
            lifecycle::notifications::NotificationKind,
            lifecycle::statistics::StatisticsReport,
            lifecycle::statistics::ApplicationStatistics,
            lifecycle::statistics::StatusCounts,
            lifecycle::statistics::LoanTypeCounts,
            lifecycle::statistics::UserCounts,
            lifecycle::statistics::DsaPerformance,
            model::enums::UserRole,
            model::enums::ApplicationStatus,
            model::enums::LoanType,
            model::enums::Priority,
            model::enums::DocumentType,
            model::enums::TicketStatus,
            model::enums::DsaAction,
            model::enums::LogLevel,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and sign-in"),
        (name = "users", description = "Profiles and account administration"),
        (name = "applications", description = "Loan applications, status workflow and assignment"),
        (name = "documents", description = "Application documents"),
        (name = "messages", description = "Per-application chat"),
        (name = "tickets", description = "Support tickets"),
        (name = "notifications", description = "Role-specific notification feed"),
        (name = "statistics", description = "Role-scoped aggregates"),
        (name = "activity", description = "DSA activity and system logs"),
    ),
    info(
        title = "Loan Portal API",
        description = "Education loan portal - applicants submit, agents review, administrators assign and oversee",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /api/v1/auth/login"))
                        .build(),
                ),
            )
        }
    }
}
