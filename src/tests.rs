#[cfg(test)]
mod integration_tests {
    use crate::handlers::activities::{DsaActivityResponse, SystemLogResponse};
    use crate::handlers::applications::{
        ApplicationDetailResponse, ApplicationResponse, ApplicationWithHistory, StatusHistoryResponse,
        SubmissionResponse,
    };
    use crate::handlers::auth::AuthResponse;
    use crate::handlers::messages::{ChatMessageResponse, MarkReadResponse};
    use crate::handlers::notifications::NotificationFeed;
    use crate::handlers::tickets::{TicketDetailResponse, TicketResponse};
    use crate::handlers::users::UserResponse;
    use crate::helpers::pagination::Paginated;
    use crate::helpers::uploads::{DocumentResponse, UploadReport};
    use crate::schemas::{ApiResponse, CachedData, ErrorResponse};
    use crate::storage::testing::InMemoryObjectStore;
    use crate::test_utils::test_utils::{
        MAX_PDF_BYTES, PASSWORD, Session, TestApp, application_body, bearer, spawn_app,
        spawn_app_with_storage,
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use lifecycle::completeness::CompletenessReport;
    use lifecycle::statistics::StatisticsReport;
    use model::entities::{prelude::SystemLog, system_log};
    use model::enums::{ApplicationStatus, DocumentType, DsaAction, TicketStatus, UserRole};
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    use serde_json::json;

    fn pdf(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len, b'0');
        bytes
    }

    fn file(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
        Part::bytes(bytes).file_name(name).mime_type(mime)
    }

    async fn set_status(
        app: &TestApp,
        who: &Session,
        application_id: i32,
        status: &str,
    ) -> axum_test::TestResponse {
        app.put_as(
            who,
            &format!("/api/v1/applications/{application_id}"),
            json!({ "status": status, "comments": format!("moved to {status}") }),
        )
        .await
    }

    async fn history(app: &TestApp, who: &Session, application_id: i32) -> Vec<StatusHistoryResponse> {
        let response = app
            .get_as(who, &format!("/api/v1/applications/{application_id}/history"))
            .await;
        response.assert_status(StatusCode::OK);
        response.json::<ApiResponse<Vec<StatusHistoryResponse>>>().data
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = spawn_app().await;

        let response = app.server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = spawn_app().await;

        let registered = app.applicant("priya@example.com").await;
        assert!(registered.id > 0);
        assert!(registered.dsa_id.is_none());

        let session = app.login("PRIYA@example.com").await;
        assert_eq!(session.id, registered.id);

        let response = app.get_as(&session, "/api/v1/users/me").await;
        response.assert_status(StatusCode::OK);
        let me: ApiResponse<UserResponse> = response.json();
        assert_eq!(me.data.email, "priya@example.com");
        assert_eq!(me.data.role, UserRole::User);
        assert!(me.data.is_verified);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let app = spawn_app().await;
        app.applicant("dup@example.com").await;

        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({ "name": "Again", "email": "dup@example.com", "password": PASSWORD }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "CONFLICT");
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password_and_admin_role() {
        let app = spawn_app().await;

        let short = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({ "name": "Short", "email": "short@example.com", "password": "1234" }))
            .await;
        short.assert_status(StatusCode::BAD_REQUEST);

        let admin = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "name": "Sneaky",
                "email": "sneaky@example.com",
                "password": PASSWORD,
                "role": "admin"
            }))
            .await;
        assert!(admin.status_code().is_client_error());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_unauthorized() {
        let app = spawn_app().await;
        app.applicant("wrong@example.com").await;

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "wrong@example.com", "password": "not-the-password" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_requests_without_valid_token_are_rejected() {
        let app = spawn_app().await;

        app.server
            .get("/api/v1/applications")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = bearer("definitely.not.a-token");
        app.server
            .get("/api/v1/applications")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deactivated_account_is_locked_out() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let user = app.applicant("leaving@example.com").await;

        let response = app
            .put_as(&admin, &format!("/api/v1/users/{}/active", user.id), json!({ "is_active": false }))
            .await;
        response.assert_status(StatusCode::OK);

        app.get_as(&user, "/api/v1/users/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "leaving@example.com", "password": PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Admins cannot lock themselves out
        app.put_as(&admin, &format!("/api/v1/users/{}/active", admin.id), json!({ "is_active": false }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dsa_ids_are_sequential_per_bank() {
        let app = spawn_app().await;

        let first = app.dsa("one@bank.example", "State Bank").await;
        let second = app.dsa("two@bank.example", "State Bank").await;
        let other = app.dsa("three@bank.example", "HDFC Bank").await;

        assert_eq!(first.dsa_id.as_deref(), Some("STAT-0001"));
        assert_eq!(second.dsa_id.as_deref(), Some("STAT-0002"));
        assert_eq!(other.dsa_id.as_deref(), Some("HDFC-0001"));

        let me: ApiResponse<UserResponse> = app.get_as(&first, "/api/v1/users/me").await.json();
        assert!(!me.data.is_verified);
    }

    #[tokio::test]
    async fn test_dsa_registration_requires_bank() {
        let app = spawn_app().await;

        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "name": "No Bank",
                "email": "nobank@example.com",
                "password": PASSWORD,
                "role": "dsa"
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_workflow_end_to_end() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("student@example.com").await;
        let dsa = app.verified_dsa(&admin, "agent@bank.example").await;

        let application = app.submit(&applicant, "abroad").await;
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert_eq!(application.version, 1);
        assert!(application.application_number.starts_with("EL"));
        assert_eq!(application.application_number.len(), 16);

        app.assign(&admin, application.id, &dsa).await;

        set_status(&app, &dsa, application.id, "under_review")
            .await
            .assert_status(StatusCode::OK);
        let response = set_status(&app, &dsa, application.id, "approved").await;
        response.assert_status(StatusCode::OK);
        let updated: ApiResponse<ApplicationWithHistory> = response.json();
        assert_eq!(updated.data.application.status, ApplicationStatus::Approved);
        // submission, assignment and two status changes
        assert_eq!(updated.data.application.version, 4);

        let trail = history(&app, &applicant, application.id).await;
        let statuses: Vec<_> = trail.iter().map(|entry| entry.status).collect();
        assert_eq!(
            statuses,
            vec![
                ApplicationStatus::Pending,
                ApplicationStatus::UnderReview,
                ApplicationStatus::Approved
            ]
        );
        assert_eq!(trail[0].updated_by, applicant.id);
        assert_eq!(trail[2].updated_by, dsa.id);
        assert_eq!(trail[2].comments.as_deref(), Some("moved to approved"));

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].to, "agent@bank.example");
        assert!(sent[2].subject.contains("approved"));

        let response = app.get_as(&dsa, "/api/v1/dsa/activities").await;
        response.assert_status(StatusCode::OK);
        let activity: ApiResponse<Paginated<DsaActivityResponse>> = response.json();
        let actions: Vec<_> = activity.data.items.iter().map(|a| a.action).collect();
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&DsaAction::Assigned));
        assert_eq!(
            actions.iter().filter(|a| **a == DsaAction::StatusUpdated).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_direct_approval_records_two_entries() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("quick@example.com").await;
        let dsa = app.verified_dsa(&admin, "fast@bank.example").await;
        let application = app.submit(&applicant, "domestic").await;
        app.assign(&admin, application.id, &dsa).await;

        set_status(&app, &dsa, application.id, "approved")
            .await
            .assert_status(StatusCode::OK);

        let trail = history(&app, &dsa, application.id).await;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].status, ApplicationStatus::Pending);
        assert_eq!(trail[1].status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_applicant_cannot_change_status() {
        let app = spawn_app().await;
        let applicant = app.applicant("self-approve@example.com").await;
        let application = app.submit(&applicant, "domestic").await;

        let response = set_status(&app, &applicant, application.id, "approved").await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(history(&app, &applicant, application.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unassigned_dsa_cannot_see_application() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("private@example.com").await;
        let dsa = app.verified_dsa(&admin, "outsider@bank.example").await;
        let application = app.submit(&applicant, "domestic").await;

        app.get_as(&dsa, &format!("/api/v1/applications/{}", application.id))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        set_status(&app, &dsa, application.id, "under_review")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let listing: ApiResponse<Paginated<ApplicationResponse>> =
            app.get_as(&dsa, "/api/v1/applications").await.json();
        assert_eq!(listing.data.total_items, 0);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("transitions@example.com").await;
        let dsa = app.verified_dsa(&admin, "reviewer@bank.example").await;
        let application = app.submit(&applicant, "vocational").await;
        app.assign(&admin, application.id, &dsa).await;

        let same = set_status(&app, &dsa, application.id, "pending").await;
        same.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = same.json();
        assert_eq!(body.code, "INVALID_TRANSITION");

        set_status(&app, &dsa, application.id, "rejected")
            .await
            .assert_status(StatusCode::OK);
        set_status(&app, &dsa, application.id, "approved")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        set_status(&app, &dsa, application.id, "under_review")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // Admins may reopen a decided application for review
        set_status(&app, &admin, application.id, "under_review")
            .await
            .assert_status(StatusCode::OK);
        assert_eq!(history(&app, &admin, application.id).await.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("race@example.com").await;
        let application = app.submit(&applicant, "domestic").await;

        let first = app
            .put_as(
                &admin,
                &format!("/api/v1/applications/{}", application.id),
                json!({ "status": "under_review", "expected_version": application.version }),
            )
            .await;
        first.assert_status(StatusCode::OK);

        let second = app
            .put_as(
                &admin,
                &format!("/api/v1/applications/{}", application.id),
                json!({ "status": "approved", "expected_version": application.version }),
            )
            .await;

        second.assert_status(StatusCode::CONFLICT);
        assert_eq!(history(&app, &admin, application.id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_assignment_to_unverified_dsa_is_refused() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("waiting@example.com").await;
        let unverified = app.dsa("new-agent@bank.example", "State Bank").await;
        let application = app.submit(&applicant, "domestic").await;

        let response = app
            .put_as(
                &admin,
                &format!("/api/v1/applications/{}/assign", application.id),
                json!({ "dsa_id": unverified.id }),
            )
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        app.put_as(
            &applicant,
            &format!("/api/v1/applications/{}/assign", application.id),
            json!({ "dsa_id": unverified.id }),
        )
        .await
        .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submission_with_files() {
        let app = spawn_app_with_storage(InMemoryObjectStore::failing_on("bank_statement")).await;
        let applicant = app.applicant("files@example.com").await;

        let form = MultipartForm::new()
            .add_text("applicationData", application_body("vocational").to_string())
            .add_part("identity_proof", file(pdf(512), "aadhaar.pdf", "application/pdf"))
            .add_part("photograph", file(vec![0x89, b'P', b'N', b'G'], "me.png", "image/png"))
            .add_part("bank_statement", file(pdf(256), "statement.pdf", "application/pdf"));
        let (name, value) = bearer(&applicant.token);
        let response = app
            .server
            .post("/api/v1/applications/with-files")
            .add_header(name, value)
            .multipart(form)
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<SubmissionResponse> = response.json();
        assert_eq!(body.data.uploaded.len(), 2);
        assert_eq!(body.data.failed_uploads.len(), 1);
        assert_eq!(body.data.failed_uploads[0].document_type, DocumentType::BankStatement);
        assert_eq!(app.storage.len(), 2);

        let id = body.data.application.id;
        let completeness: ApiResponse<CompletenessReport> = app
            .get_as(&applicant, &format!("/api/v1/applications/{id}/completeness"))
            .await
            .json();
        assert!((completeness.data.percentage - 40.0).abs() < 1e-9);
        assert_eq!(completeness.data.missing.len(), 3);
        assert!(!completeness.data.is_complete);

        let failures = SystemLog::find()
            .filter(system_log::Column::Action.eq("document.upload_failed"))
            .all(&app.state.db)
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_rejects_whole_submission() {
        let app = spawn_app().await;
        let applicant = app.applicant("big@example.com").await;

        let form = MultipartForm::new()
            .add_text("applicationData", application_body("domestic").to_string())
            .add_part("identity_proof", file(pdf(128), "id.pdf", "application/pdf"))
            .add_part(
                "fee_structure",
                file(pdf(MAX_PDF_BYTES as usize + 1), "fees.pdf", "application/pdf"),
            );
        let (name, value) = bearer(&applicant.token);
        let response = app
            .server
            .post("/api/v1/applications/with-files")
            .add_header(name, value)
            .multipart(form)
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(app.storage.len(), 0);
        let listing: ApiResponse<Paginated<ApplicationResponse>> =
            app.get_as(&applicant, "/api/v1/applications").await.json();
        assert_eq!(listing.data.total_items, 0);
    }

    #[tokio::test]
    async fn test_unsupported_file_type_is_rejected() {
        let app = spawn_app().await;
        let applicant = app.applicant("exe@example.com").await;

        let form = MultipartForm::new()
            .add_text("applicationData", application_body("domestic").to_string())
            .add_part("identity_proof", file(b"MZ".to_vec(), "id.exe", "application/x-msdownload"));
        let (name, value) = bearer(&applicant.token);
        let response = app
            .server
            .post("/api/v1/applications/with-files")
            .add_header(name, value)
            .multipart(form)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let listing: ApiResponse<Paginated<ApplicationResponse>> =
            app.get_as(&applicant, "/api/v1/applications").await.json();
        assert_eq!(listing.data.total_items, 0);
    }

    #[tokio::test]
    async fn test_document_upload_and_soft_delete() {
        let app = spawn_app().await;
        let applicant = app.applicant("docs@example.com").await;
        let other = app.applicant("nosy@example.com").await;
        let application = app.submit(&applicant, "domestic").await;
        let path = format!("/api/v1/applications/{}/documents", application.id);

        let (name, value) = bearer(&applicant.token);
        let response = app
            .server
            .post(&path)
            .add_header(name, value)
            .multipart(
                MultipartForm::new()
                    .add_part("income_proof", file(pdf(300), "itr.pdf", "application/pdf")),
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        let report: ApiResponse<UploadReport> = response.json();
        let document_id = report.data.uploaded[0].id;

        app.get_as(&other, &path).await.assert_status(StatusCode::FORBIDDEN);
        app.delete_as(&other, &format!("{path}/{document_id}"))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.delete_as(&applicant, &format!("{path}/{document_id}"))
            .await
            .assert_status(StatusCode::OK);
        let listing: ApiResponse<Vec<DocumentResponse>> = app.get_as(&applicant, &path).await.json();
        assert!(listing.data.is_empty());

        let detail: ApiResponse<ApplicationDetailResponse> = app
            .get_as(&applicant, &format!("/api/v1/applications/{}", application.id))
            .await
            .json();
        assert!(detail.data.documents.is_empty());
        assert_eq!(detail.data.completeness.submitted.len(), 0);
        assert_eq!(detail.data.history.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_file_in_batch_stores_nothing() {
        let app = spawn_app().await;
        let applicant = app.applicant("batch@example.com").await;
        let application = app.submit(&applicant, "domestic").await;
        let path = format!("/api/v1/applications/{}/documents", application.id);

        let batches = [
            (
                file(pdf(MAX_PDF_BYTES as usize + 1), "fees.pdf", "application/pdf"),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                file(b"MZ".to_vec(), "fees.exe", "application/x-msdownload"),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (invalid, status) in batches {
            let form = MultipartForm::new()
                .add_part("identity_proof", file(pdf(200), "id.pdf", "application/pdf"))
                .add_part("fee_structure", invalid);
            let (name, value) = bearer(&applicant.token);
            let response = app.server.post(&path).add_header(name, value).multipart(form).await;

            response.assert_status(status);
            let listing: ApiResponse<Vec<DocumentResponse>> =
                app.get_as(&applicant, &path).await.json();
            assert!(listing.data.is_empty());
            assert_eq!(app.storage.len(), 0);
        }
    }

    #[tokio::test]
    async fn test_listing_filters_and_pagination() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("many@example.com").await;
        for loan_type in ["domestic", "abroad", "abroad"] {
            app.submit(&applicant, loan_type).await;
        }

        let page: ApiResponse<Paginated<ApplicationResponse>> = app
            .get_as(&admin, "/api/v1/applications?loan_type=abroad&limit=1&page=2")
            .await
            .json();
        assert_eq!(page.data.total_items, 2);
        assert_eq!(page.data.total_pages, 2);
        assert_eq!(page.data.items.len(), 1);

        let pending: ApiResponse<Paginated<ApplicationResponse>> = app
            .get_as(&admin, "/api/v1/applications?status=pending")
            .await
            .json();
        assert_eq!(pending.data.total_items, 3);

        app.get_as(&admin, "/api/v1/applications?limit=0")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.get_as(&admin, "/api/v1/applications?limit=101")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.get_as(&admin, "/api/v1/applications?page=0")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_notifications_are_stable_until_marked_read() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("notify@example.com").await;
        let application = app.submit(&applicant, "abroad").await;

        let first: ApiResponse<NotificationFeed> = app.get_as(&admin, "/api/v1/notifications").await.json();
        let second: ApiResponse<NotificationFeed> = app.get_as(&admin, "/api/v1/notifications").await.json();
        let ids: Vec<_> = first.data.notifications.iter().map(|n| n.id.clone()).collect();
        let again: Vec<_> = second.data.notifications.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, again);
        assert!(ids.contains(&format!("new_app_{}", application.id)));
        assert!(first.data.unread_count > 0);

        app.put_as(&admin, "/api/v1/notifications", json!({}))
            .await
            .assert_status(StatusCode::OK);
        let after: ApiResponse<NotificationFeed> = app.get_as(&admin, "/api/v1/notifications").await.json();
        assert_eq!(after.data.unread_count, 0);
        assert_eq!(after.data.notifications.len(), ids.len());

        let own: ApiResponse<NotificationFeed> =
            app.get_as(&applicant, "/api/v1/notifications").await.json();
        assert!(own
            .data
            .notifications
            .iter()
            .any(|n| n.id == format!("missing_docs_{}", application.id)));
    }

    #[tokio::test]
    async fn test_chat_between_applicant_and_agent() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("chat@example.com").await;
        let dsa = app.verified_dsa(&admin, "chatty@bank.example").await;
        let outsider = app.applicant("outsider@example.com").await;
        let application = app.submit(&applicant, "domestic").await;
        app.assign(&admin, application.id, &dsa).await;
        let path = format!("/api/v1/applications/{}/messages", application.id);

        app.post_as(&applicant, &path, json!({ "message": "Hello, any update?" }))
            .await
            .assert_status(StatusCode::CREATED);
        app.post_as(&dsa, &path, json!({ "message": "Please upload your fee structure" }))
            .await
            .assert_status(StatusCode::CREATED);
        app.post_as(&dsa, &path, json!({ "message": "   " }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.post_as(&outsider, &path, json!({ "message": "hi" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let marked: ApiResponse<MarkReadResponse> = app
            .put_as(&applicant, &format!("{path}/read"), json!({}))
            .await
            .json();
        assert_eq!(marked.data.updated, 1);

        let thread: ApiResponse<Vec<ChatMessageResponse>> = app.get_as(&admin, &path).await.json();
        assert_eq!(thread.data.len(), 2);
        assert_eq!(thread.data[0].sender_role, UserRole::User);
        assert!(!thread.data[0].is_read);
        assert!(thread.data[1].is_read);
    }

    #[tokio::test]
    async fn test_agents_cannot_open_tickets() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let dsa = app.verified_dsa(&admin, "agent-help@example.com").await;

        let response = app
            .post_as(
                &dsa,
                "/api/v1/tickets",
                json!({
                    "subject": "Portal is slow",
                    "description": "Listing takes a minute",
                    "category": "Technical",
                    "priority": "low"
                }),
            )
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let all: ApiResponse<Paginated<TicketResponse>> =
            app.get_as(&admin, "/api/v1/tickets").await.json();
        assert_eq!(all.data.total_items, 0);
    }

    #[tokio::test]
    async fn test_support_ticket_workflow() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let user = app.applicant("help@example.com").await;
        let other = app.applicant("other@example.com").await;

        let response = app
            .post_as(
                &user,
                "/api/v1/tickets",
                json!({
                    "subject": "Upload keeps failing",
                    "description": "My passport scan is rejected",
                    "category": "Documents",
                    "priority": "high"
                }),
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        let ticket: ApiResponse<TicketResponse> = response.json();
        let id = ticket.data.id;
        assert!(ticket.data.ticket_number.starts_with("TKT-"));
        assert_eq!(ticket.data.status, TicketStatus::Open);

        app.get_as(&other, &format!("/api/v1/tickets/{id}"))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.put_as(&user, &format!("/api/v1/tickets/{id}/status"), json!({ "status": "closed" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.put_as(&admin, &format!("/api/v1/tickets/{id}/status"), json!({ "status": "resolved" }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        app.post_as(
            &admin,
            &format!("/api/v1/tickets/{id}/responses"),
            json!({ "message": "Please try a smaller file" }),
        )
        .await
        .assert_status(StatusCode::CREATED);

        let detail: ApiResponse<TicketDetailResponse> =
            app.get_as(&user, &format!("/api/v1/tickets/{id}")).await.json();
        assert_eq!(detail.data.ticket.status, TicketStatus::InProgress);
        assert_eq!(detail.data.ticket.assigned_to, Some(admin.id));
        assert_eq!(detail.data.responses.len(), 1);

        app.put_as(&admin, &format!("/api/v1/tickets/{id}/status"), json!({ "status": "resolved" }))
            .await
            .assert_status(StatusCode::OK);

        let feed: ApiResponse<NotificationFeed> = app.get_as(&user, "/api/v1/notifications").await.json();
        assert!(feed.data.notifications.iter().any(|n| n.ticket_id == Some(id)));

        let mine: ApiResponse<Paginated<TicketResponse>> =
            app.get_as(&other, "/api/v1/tickets").await.json();
        assert_eq!(mine.data.total_items, 0);
        let all: ApiResponse<Paginated<TicketResponse>> =
            app.get_as(&admin, "/api/v1/tickets?status=resolved").await.json();
        assert_eq!(all.data.total_items, 1);
    }

    #[tokio::test]
    async fn test_statistics_are_scoped_and_refreshed() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("stats@example.com").await;
        let other = app.applicant("stats-other@example.com").await;
        app.submit(&applicant, "domestic").await;
        let second = app.submit(&other, "abroad").await;

        let own: ApiResponse<StatisticsReport> = app.get_as(&applicant, "/api/v1/statistics").await.json();
        assert_eq!(own.data.applications.total, 1);
        assert!(own.data.users.is_none());

        let before: ApiResponse<StatisticsReport> = app.get_as(&admin, "/api/v1/statistics").await.json();
        assert_eq!(before.data.applications.total, 2);
        assert_eq!(before.data.applications.by_status.pending, 2);
        let users = before.data.users.expect("admin sees user counts");
        assert_eq!(users.admins, 1);
        assert_eq!(users.users, 2);

        set_status(&app, &admin, second.id, "rejected")
            .await
            .assert_status(StatusCode::OK);

        let after: ApiResponse<StatisticsReport> = app.get_as(&admin, "/api/v1/statistics").await.json();
        assert_eq!(after.data.applications.by_status.pending, 1);
        assert_eq!(after.data.applications.by_status.rejected, 1);
    }

    #[tokio::test]
    async fn test_late_statistics_insert_is_not_served() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("late@example.com").await;

        // A reader takes its key, computes, and is overtaken by a write.
        let key = app.state.statistics_key(UserRole::Admin, admin.id);
        let stale: ApiResponse<StatisticsReport> = app.get_as(&admin, "/api/v1/statistics").await.json();
        assert_eq!(stale.data.applications.total, 0);
        app.submit(&applicant, "domestic").await;
        app.state
            .cache
            .insert(key, CachedData::Statistics(stale.data))
            .await;

        let fresh: ApiResponse<StatisticsReport> = app.get_as(&admin, "/api/v1/statistics").await.json();
        assert_eq!(fresh.data.applications.total, 1);
        assert_ne!(
            app.state.statistics_key(UserRole::Admin, admin.id),
            app.state.statistics_key(UserRole::Dsa, admin.id)
        );
    }

    #[tokio::test]
    async fn test_user_administration() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let user = app.applicant("managed@example.com").await;
        app.dsa("agent-one@bank.example", "Axis Bank").await;

        let agents: ApiResponse<Paginated<UserResponse>> =
            app.get_as(&admin, "/api/v1/users?role=dsa").await.json();
        assert_eq!(agents.data.total_items, 1);
        assert_eq!(agents.data.items[0].dsa_id.as_deref(), Some("AXIS-0001"));

        app.get_as(&user, "/api/v1/users")
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as(&user, &format!("/api/v1/users/{}", admin.id))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as(&user, &format!("/api/v1/users/{}", user.id))
            .await
            .assert_status(StatusCode::OK);

        let response = app
            .put_as(&user, "/api/v1/users/me", json!({ "name": "Renamed", "password": "another-secret" }))
            .await;
        response.assert_status(StatusCode::OK);
        let updated: ApiResponse<UserResponse> = response.json();
        assert_eq!(updated.data.name, "Renamed");

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "managed@example.com", "password": "another-secret" }))
            .await;
        response.assert_status(StatusCode::OK);
        let session: ApiResponse<AuthResponse> = response.json();
        assert_eq!(session.data.user.name, "Renamed");
        assert_eq!(session.data.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_system_logs_are_admin_only() {
        let app = spawn_app().await;
        let admin = app.admin().await;
        let applicant = app.applicant("audited@example.com").await;
        app.submit(&applicant, "domestic").await;

        app.get_as(&applicant, "/api/v1/system-logs")
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as(&applicant, "/api/v1/dsa/activities")
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app.get_as(&admin, "/api/v1/system-logs?level=info").await;
        response.assert_status(StatusCode::OK);
        let logs: ApiResponse<Paginated<SystemLogResponse>> = response.json();
        assert!(logs
            .data
            .items
            .iter()
            .any(|entry| entry.action == "application.submitted"));
    }
}
