#[cfg(test)]
pub mod test_utils {
    use crate::cli::commands::create_admin::insert_admin;
    use crate::config::{
        AppConfig, AuthConfig, MailConfig, RunMode, UploadConfig, WorkflowConfig, build_app_state,
    };
    use crate::handlers::applications::ApplicationResponse;
    use crate::handlers::auth::AuthResponse;
    use crate::mailer::testing::RecordingMailer;
    use crate::router::create_router;
    use crate::schemas::{ApiResponse, AppState};
    use crate::storage::testing::InMemoryObjectStore;
    use axum::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
    use axum_test::{TestResponse, TestServer};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const PASSWORD: &str = "correct-horse-battery";
    /// Small limits so oversize uploads are cheap to build.
    pub const MAX_IMAGE_BYTES: u64 = 1024;
    pub const MAX_PDF_BYTES: u64 = 2048;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            environment: RunMode::Development,
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_ttl_hours: 1,
            },
            workflow: WorkflowConfig {
                review_deadline_days: 3,
                stale_after_days: 3,
            },
            upload: UploadConfig {
                storage_dir: "unused".into(),
                public_base_url: "/files".to_string(),
                max_image_bytes: MAX_IMAGE_BYTES,
                max_pdf_bytes: MAX_PDF_BYTES,
            },
            mail: MailConfig {
                smtp_host: None,
                smtp_username: None,
                smtp_password: None,
                from_address: "no-reply@test.local".to_string(),
            },
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level comes from RUST_LOG and defaults to WARN.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// A running test server with handles on its collaborators.
    pub struct TestApp {
        pub server: TestServer,
        pub state: AppState,
        pub storage: Arc<InMemoryObjectStore>,
        pub mailer: Arc<RecordingMailer>,
        _tracing: tracing::subscriber::DefaultGuard,
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state(storage: Arc<InMemoryObjectStore>, mailer: Arc<RecordingMailer>) -> AppState {
        let db = setup_test_db().await;
        build_app_state(db, test_config(), storage, mailer)
    }

    pub async fn spawn_app_with_storage(storage: InMemoryObjectStore) -> TestApp {
        let guard = init_test_tracing();
        let storage = Arc::new(storage);
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup_test_app_state(storage.clone(), mailer.clone()).await;
        let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
        TestApp {
            server,
            state,
            storage,
            mailer,
            _tracing: guard,
        }
    }

    pub async fn spawn_app() -> TestApp {
        spawn_app_with_storage(InMemoryObjectStore::default()).await
    }

    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value");
        (AUTHORIZATION, value)
    }

    /// A signed-in account.
    #[derive(Debug, Clone)]
    pub struct Session {
        pub id: i32,
        pub token: String,
        pub dsa_id: Option<String>,
    }

    impl TestApp {
        pub async fn get_as(&self, who: &Session, path: &str) -> TestResponse {
            let (name, value) = bearer(&who.token);
            self.server.get(path).add_header(name, value).await
        }

        pub async fn post_as(&self, who: &Session, path: &str, body: Value) -> TestResponse {
            let (name, value) = bearer(&who.token);
            self.server.post(path).add_header(name, value).json(&body).await
        }

        pub async fn put_as(&self, who: &Session, path: &str, body: Value) -> TestResponse {
            let (name, value) = bearer(&who.token);
            self.server.put(path).add_header(name, value).json(&body).await
        }

        pub async fn delete_as(&self, who: &Session, path: &str) -> TestResponse {
            let (name, value) = bearer(&who.token);
            self.server.delete(path).add_header(name, value).await
        }

        pub async fn register(&self, body: Value) -> Session {
            let response = self.server.post("/api/v1/auth/register").json(&body).await;
            response.assert_status(StatusCode::CREATED);
            let body: ApiResponse<AuthResponse> = response.json();
            Session {
                id: body.data.user.id,
                token: body.data.token,
                dsa_id: body.data.user.dsa_id,
            }
        }

        pub async fn applicant(&self, email: &str) -> Session {
            self.register(json!({
                "name": "Test Applicant",
                "email": email,
                "password": PASSWORD,
                "phone": "9876543210"
            }))
            .await
        }

        pub async fn dsa(&self, email: &str, bank: &str) -> Session {
            self.register(json!({
                "name": "Test Agent",
                "email": email,
                "password": PASSWORD,
                "role": "dsa",
                "bank": bank
            }))
            .await
        }

        pub async fn login(&self, email: &str) -> Session {
            let response = self
                .server
                .post("/api/v1/auth/login")
                .json(&json!({ "email": email, "password": PASSWORD }))
                .await;
            response.assert_status(StatusCode::OK);
            let body: ApiResponse<AuthResponse> = response.json();
            Session {
                id: body.data.user.id,
                token: body.data.token,
                dsa_id: body.data.user.dsa_id,
            }
        }

        pub async fn admin(&self) -> Session {
            insert_admin(&self.state.db, "admin@test.local", "Test Admin", PASSWORD)
                .await
                .expect("Failed to create admin");
            self.login("admin@test.local").await
        }

        /// Admin verifies the agent so it can take assignments.
        pub async fn verified_dsa(&self, admin: &Session, email: &str) -> Session {
            let dsa = self.dsa(email, "State Bank").await;
            self.put_as(
                admin,
                &format!("/api/v1/users/{}/verify", dsa.id),
                json!({ "is_verified": true }),
            )
            .await
            .assert_status(StatusCode::OK);
            dsa
        }

        pub async fn submit(&self, applicant: &Session, loan_type: &str) -> ApplicationResponse {
            let response = self
                .post_as(applicant, "/api/v1/applications", application_body(loan_type))
                .await;
            response.assert_status(StatusCode::CREATED);
            response.json::<ApiResponse<ApplicationResponse>>().data
        }

        pub async fn assign(&self, admin: &Session, application_id: i32, dsa: &Session) {
            self.put_as(
                admin,
                &format!("/api/v1/applications/{application_id}/assign"),
                json!({ "dsa_id": dsa.id }),
            )
            .await
            .assert_status(StatusCode::OK);
        }
    }

    pub fn application_body(loan_type: &str) -> Value {
        json!({
            "full_name": "Ananya Iyer",
            "email": "ananya@example.com",
            "phone": "9876543210",
            "date_of_birth": "2002-03-14",
            "loan_type": loan_type,
            "loan_amount": "1500000",
            "tenure_months": 60,
            "course_name": "MSc Data Science",
            "institution": "University of Edinburgh",
            "country": "United Kingdom",
            "course_duration_months": 12
        })
    }
}
