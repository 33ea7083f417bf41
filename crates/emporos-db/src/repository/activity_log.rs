//! # Activity Log Repository
//!
//! Append-only audit trail. There is no update or delete here.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use emporos_core::{ActionKind, ActivityLog};

const ACTIVITY_COLUMNS: &str = r#"
    id, actor_id, actor_name, action_time, action_kind,
    subject_type, subject_id, subject_repr, details
"#;

/// Filter for listing audit entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub actor_id: Option<String>,
    pub action_kind: Option<ActionKind>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        ActivityFilter {
            actor_id: None,
            action_kind: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Repository for the audit log.
#[derive(Debug, Clone)]
pub struct ActivityLogRepository {
    pool: SqlitePool,
}

impl ActivityLogRepository {
    /// Creates a new ActivityLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ActivityLogRepository { pool }
    }

    /// Newest entries first.
    pub async fn list(&self, filter: &ActivityFilter) -> DbResult<Vec<ActivityLog>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log \
             WHERE (?1 IS NULL OR actor_id = ?1) AND (?2 IS NULL OR action_kind = ?2) \
             ORDER BY action_time DESC, id DESC LIMIT ?3 OFFSET ?4"
        );
        let entries = sqlx::query_as::<_, ActivityLog>(&sql)
            .bind(&filter.actor_id)
            .bind(filter.action_kind)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Entries about one subject, oldest first.
    pub async fn list_for_subject(&self, subject_id: &str) -> DbResult<Vec<ActivityLog>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE subject_id = ?1 ORDER BY action_time, id"
        );
        let entries = sqlx::query_as::<_, ActivityLog>(&sql)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn insert(conn: &mut SqliteConnection, entry: &ActivityLog) -> DbResult<()> {
        debug!(actor = %entry.actor_id, kind = ?entry.action_kind, subject = %entry.subject_repr, "Writing audit entry");

        let sql = format!(
            "INSERT INTO activity_log ({ACTIVITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.actor_id)
            .bind(&entry.actor_name)
            .bind(entry.action_time)
            .bind(entry.action_kind)
            .bind(&entry.subject_type)
            .bind(&entry.subject_id)
            .bind(&entry.subject_repr)
            .bind(&entry.details)
            .execute(conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use emporos_core::new_id;

    fn entry(actor: &str, kind: ActionKind, seconds_ago: i64) -> ActivityLog {
        ActivityLog {
            id: new_id(),
            actor_id: actor.to_string(),
            actor_name: actor.to_string(),
            action_time: Utc::now() - Duration::seconds(seconds_ago),
            action_kind: kind,
            subject_type: Some("Order".to_string()),
            subject_id: Some("o1".to_string()),
            subject_repr: "ORDER-2025-0001".to_string(),
            details: String::new(),
        }
    }

    #[tokio::test]
    async fn test_filter_and_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_write().await.unwrap();
        ActivityLogRepository::insert(tx.conn(), &entry("alice", ActionKind::Create, 30)).await.unwrap();
        ActivityLogRepository::insert(tx.conn(), &entry("bob", ActionKind::Create, 20)).await.unwrap();
        ActivityLogRepository::insert(tx.conn(), &entry("alice", ActionKind::StatusChange, 10)).await.unwrap();
        tx.commit().await.unwrap();

        let all = db.activity_log().list(&ActivityFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action_kind, ActionKind::StatusChange);

        let alice_creates = db
            .activity_log()
            .list(&ActivityFilter {
                actor_id: Some("alice".to_string()),
                action_kind: Some(ActionKind::Create),
                ..ActivityFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(alice_creates.len(), 1);

        let paged = db
            .activity_log()
            .list(&ActivityFilter { limit: 1, offset: 1, ..ActivityFilter::default() })
            .await
            .unwrap();
        assert_eq!(paged[0].actor_id, "bob");
    }
}
