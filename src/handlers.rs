pub mod activities;
pub mod applications;
pub mod auth;
pub mod documents;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod statistics;
pub mod tickets;
pub mod users;
