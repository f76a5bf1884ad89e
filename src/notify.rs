//! Notification sink
//!
//! Durably records notifications for later retrieval by the archive UI.
//! Dispatch is fire-and-forget relative to the state transition that
//! produced it: writes happen after the transaction commits, and a failed
//! write is logged and counted but never surfaced to the caller.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use tracing::warn;
use uuid::Uuid;

use crate::db::models::{NotificationActiveModel, NotificationKind};
use crate::db::DbPool;
use crate::errors::Result;
use crate::metrics;

/// A notification ready to be written
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub thesis_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct Notifier {
    db: DbPool,
}

impl Notifier {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Write one notification row
    pub async fn create(&self, notification: NewNotification) -> Result<()> {
        let row = NotificationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(notification.user_id),
            kind: Set(notification.kind),
            title: Set(notification.title),
            message: Set(notification.message),
            thesis_id: Set(notification.thesis_id),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        row.insert(self.db.write()).await?;
        Ok(())
    }

    /// Dispatch a batch in the background. No ordering guarantee between
    /// entries; each write is individually atomic.
    pub fn dispatch(&self, batch: Vec<NewNotification>) {
        if batch.is_empty() {
            return;
        }

        let notifier = self.clone();
        tokio::spawn(async move {
            for notification in batch {
                let user_id = notification.user_id;
                let kind = notification.kind;
                if let Err(e) = notifier.create(notification).await {
                    metrics::record_notification_failure();
                    warn!(
                        user_id = %user_id,
                        kind = ?kind,
                        error = %e,
                        "Failed to write notification"
                    );
                }
            }
        });
    }
}
