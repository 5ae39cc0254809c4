use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Name))
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string_null(Users::Phone))
                    .col(string_len(Users::Role, 10))
                    .col(string_null(Users::Bank))
                    .col(string_null(Users::DsaId).unique_key())
                    .col(decimal_null(Users::AnnualIncome).decimal_len(19, 4))
                    .col(string_null(Users::Education))
                    .col(boolean(Users::IsActive).default(true))
                    .col(boolean(Users::IsVerified).default(false))
                    .col(timestamp_with_time_zone_null(Users::NotificationsReadAt))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .col(timestamp_with_time_zone(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create loan_applications table
        manager
            .create_table(
                Table::create()
                    .table(LoanApplications::Table)
                    .if_not_exists()
                    .col(pk_auto(LoanApplications::Id))
                    .col(string(LoanApplications::ApplicationNumber).unique_key())
                    .col(integer(LoanApplications::UserId))
                    .col(string(LoanApplications::FullName))
                    .col(string(LoanApplications::Email))
                    .col(string(LoanApplications::Phone))
                    .col(date_null(LoanApplications::DateOfBirth))
                    .col(string_null(LoanApplications::Address))
                    .col(string_len(LoanApplications::LoanType, 20))
                    .col(decimal(LoanApplications::LoanAmount).decimal_len(19, 4))
                    .col(integer(LoanApplications::TenureMonths))
                    .col(string_null(LoanApplications::Purpose))
                    .col(string(LoanApplications::CourseName))
                    .col(string(LoanApplications::Institution))
                    .col(string(LoanApplications::Country))
                    .col(integer_null(LoanApplications::CourseDurationMonths))
                    .col(string_len(LoanApplications::Priority, 10))
                    .col(string_len(LoanApplications::Status, 20))
                    .col(integer_null(LoanApplications::AssignedDsaId))
                    .col(timestamp_with_time_zone_null(LoanApplications::AssignedAt))
                    .col(timestamp_with_time_zone_null(LoanApplications::ReviewDeadline))
                    .col(integer(LoanApplications::Version).default(1))
                    .col(timestamp_with_time_zone(LoanApplications::CreatedAt))
                    .col(timestamp_with_time_zone(LoanApplications::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_loan_applications_user")
                            .from(LoanApplications::Table, LoanApplications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_loan_applications_assigned_dsa")
                            .from(LoanApplications::Table, LoanApplications::AssignedDsaId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create status_history table
        manager
            .create_table(
                Table::create()
                    .table(StatusHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(StatusHistory::Id))
                    .col(integer(StatusHistory::ApplicationId))
                    .col(string_len(StatusHistory::Status, 20))
                    .col(integer(StatusHistory::UpdatedBy))
                    .col(text_null(StatusHistory::Comments))
                    .col(timestamp_with_time_zone(StatusHistory::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_application")
                            .from(StatusHistory::Table, StatusHistory::ApplicationId)
                            .to(LoanApplications::Table, LoanApplications::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create file_uploads table
        manager
            .create_table(
                Table::create()
                    .table(FileUploads::Table)
                    .if_not_exists()
                    .col(pk_auto(FileUploads::Id))
                    .col(integer(FileUploads::ApplicationId))
                    .col(integer(FileUploads::UserId))
                    .col(string_len(FileUploads::DocumentType, 30))
                    .col(string(FileUploads::OriginalName))
                    .col(string(FileUploads::ContentType))
                    .col(big_integer(FileUploads::SizeBytes))
                    .col(string(FileUploads::StorageKey))
                    .col(string(FileUploads::Url))
                    .col(boolean(FileUploads::IsDeleted).default(false))
                    .col(timestamp_with_time_zone(FileUploads::UploadedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_uploads_application")
                            .from(FileUploads::Table, FileUploads::ApplicationId)
                            .to(LoanApplications::Table, LoanApplications::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_uploads_user")
                            .from(FileUploads::Table, FileUploads::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create chat_messages table
        manager
            .create_table(
                Table::create()
                    .table(ChatMessages::Table)
                    .if_not_exists()
                    .col(pk_auto(ChatMessages::Id))
                    .col(integer(ChatMessages::ApplicationId))
                    .col(integer(ChatMessages::SenderId))
                    .col(string_len(ChatMessages::SenderRole, 10))
                    .col(text(ChatMessages::Message))
                    .col(boolean(ChatMessages::IsRead).default(false))
                    .col(timestamp_with_time_zone(ChatMessages::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_messages_application")
                            .from(ChatMessages::Table, ChatMessages::ApplicationId)
                            .to(LoanApplications::Table, LoanApplications::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create support_tickets table
        manager
            .create_table(
                Table::create()
                    .table(SupportTickets::Table)
                    .if_not_exists()
                    .col(pk_auto(SupportTickets::Id))
                    .col(string(SupportTickets::TicketNumber).unique_key())
                    .col(integer(SupportTickets::UserId))
                    .col(string(SupportTickets::Subject))
                    .col(text(SupportTickets::Description))
                    .col(string(SupportTickets::Category))
                    .col(string_len(SupportTickets::Priority, 10))
                    .col(string_len(SupportTickets::Status, 20))
                    .col(integer_null(SupportTickets::AssignedTo))
                    .col(timestamp_with_time_zone(SupportTickets::CreatedAt))
                    .col(timestamp_with_time_zone(SupportTickets::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_support_tickets_user")
                            .from(SupportTickets::Table, SupportTickets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create ticket_responses table
        manager
            .create_table(
                Table::create()
                    .table(TicketResponses::Table)
                    .if_not_exists()
                    .col(pk_auto(TicketResponses::Id))
                    .col(integer(TicketResponses::TicketId))
                    .col(integer(TicketResponses::ResponderId))
                    .col(string_len(TicketResponses::ResponderRole, 10))
                    .col(text(TicketResponses::Message))
                    .col(timestamp_with_time_zone(TicketResponses::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_responses_ticket")
                            .from(TicketResponses::Table, TicketResponses::TicketId)
                            .to(SupportTickets::Table, SupportTickets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create dsa_activities table
        manager
            .create_table(
                Table::create()
                    .table(DsaActivities::Table)
                    .if_not_exists()
                    .col(pk_auto(DsaActivities::Id))
                    .col(integer(DsaActivities::DsaId))
                    .col(integer_null(DsaActivities::ApplicationId))
                    .col(string_len(DsaActivities::Action, 30))
                    .col(text_null(DsaActivities::Details))
                    .col(timestamp_with_time_zone(DsaActivities::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dsa_activities_dsa")
                            .from(DsaActivities::Table, DsaActivities::DsaId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create system_logs table
        manager
            .create_table(
                Table::create()
                    .table(SystemLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(SystemLogs::Id))
                    .col(string_len(SystemLogs::Level, 10))
                    .col(string(SystemLogs::Action))
                    .col(text(SystemLogs::Message))
                    .col(integer_null(SystemLogs::UserId))
                    .col(json_null(SystemLogs::Metadata))
                    .col(timestamp_with_time_zone(SystemLogs::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Lookup indexes for the role-scoped listings
        manager
            .create_index(
                Index::create()
                    .name("idx_loan_applications_status")
                    .table(LoanApplications::Table)
                    .col(LoanApplications::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_loan_applications_assigned_dsa")
                    .table(LoanApplications::Table)
                    .col(LoanApplications::AssignedDsaId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_status_history_application")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::ApplicationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_uploads_application")
                    .table(FileUploads::Table)
                    .col(FileUploads::ApplicationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(SystemLogs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DsaActivities::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TicketResponses::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SupportTickets::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ChatMessages::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(FileUploads::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LoanApplications::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

// Define identifiers for all tables
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    PasswordHash,
    Phone,
    Role,
    Bank,
    DsaId,
    AnnualIncome,
    Education,
    IsActive,
    IsVerified,
    NotificationsReadAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LoanApplications {
    Table,
    Id,
    ApplicationNumber,
    UserId,
    FullName,
    Email,
    Phone,
    DateOfBirth,
    Address,
    LoanType,
    LoanAmount,
    TenureMonths,
    Purpose,
    CourseName,
    Institution,
    Country,
    CourseDurationMonths,
    Priority,
    Status,
    AssignedDsaId,
    AssignedAt,
    ReviewDeadline,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StatusHistory {
    Table,
    Id,
    ApplicationId,
    Status,
    UpdatedBy,
    Comments,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FileUploads {
    Table,
    Id,
    ApplicationId,
    UserId,
    DocumentType,
    OriginalName,
    ContentType,
    SizeBytes,
    StorageKey,
    Url,
    IsDeleted,
    UploadedAt,
}

#[derive(DeriveIden)]
enum ChatMessages {
    Table,
    Id,
    ApplicationId,
    SenderId,
    SenderRole,
    Message,
    IsRead,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SupportTickets {
    Table,
    Id,
    TicketNumber,
    UserId,
    Subject,
    Description,
    Category,
    Priority,
    Status,
    AssignedTo,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TicketResponses {
    Table,
    Id,
    TicketId,
    ResponderId,
    ResponderRole,
    Message,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DsaActivities {
    Table,
    Id,
    DsaId,
    ApplicationId,
    Action,
    Details,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SystemLogs {
    Table,
    Id,
    Level,
    Action,
    Message,
    UserId,
    Metadata,
    CreatedAt,
}
