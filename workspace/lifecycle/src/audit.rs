//! Append-only DSA activity and system log records.

use chrono::{DateTime, Utc};
use model::entities::{dsa_activity, system_log};
use model::enums::{DsaAction, LogLevel};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::Result;

pub async fn record_dsa_activity<C: ConnectionTrait>(
    db: &C,
    dsa_id: i32,
    application_id: Option<i32>,
    action: DsaAction,
    details: Option<String>,
    now: DateTime<Utc>,
) -> Result<dsa_activity::Model> {
    debug!(dsa_id, ?application_id, %action, "Recording DSA activity");
    let activity = dsa_activity::ActiveModel {
        dsa_id: Set(dsa_id),
        application_id: Set(application_id),
        action: Set(action),
        details: Set(details),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(activity)
}

/// Fields of a system log entry.
#[derive(Debug, Clone)]
pub struct SystemEvent {
    pub level: LogLevel,
    pub action: String,
    pub message: String,
    pub user_id: Option<i32>,
    pub metadata: Option<JsonValue>,
}

impl SystemEvent {
    pub fn info(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            action: action.into(),
            message: message.into(),
            user_id: None,
            metadata: None,
        }
    }

    pub fn warn(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warn,
            ..Self::info(action, message)
        }
    }

    pub fn by(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub async fn record_system_event<C: ConnectionTrait>(
    db: &C,
    event: SystemEvent,
    now: DateTime<Utc>,
) -> Result<system_log::Model> {
    debug!(level = %event.level, action = %event.action, "Recording system event");
    let entry = system_log::ActiveModel {
        level: Set(event.level),
        action: Set(event.action),
        message: Set(event.message),
        user_id: Set(event.user_id),
        metadata: Set(event.metadata),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(entry)
}
