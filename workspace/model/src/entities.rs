//! This file serves as the root for all SeaORM entity modules.
//! Applications, their documents and history, conversations and the audit
//! tables all hang off the `users` table.

pub mod chat_message;
pub mod dsa_activity;
pub mod file_upload;
pub mod loan_application;
pub mod status_history;
pub mod support_ticket;
pub mod system_log;
pub mod ticket_response;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::chat_message::Entity as ChatMessage;
    pub use super::dsa_activity::Entity as DsaActivity;
    pub use super::file_upload::Entity as FileUpload;
    pub use super::loan_application::Entity as LoanApplication;
    pub use super::status_history::Entity as StatusHistory;
    pub use super::support_ticket::Entity as SupportTicket;
    pub use super::system_log::Entity as SystemLog;
    pub use super::ticket_response::Entity as TicketResponse;
    pub use super::user::Entity as User;
}
