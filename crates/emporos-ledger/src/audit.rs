//! # Audit Log
//!
//! One entry per committed operation, written as the last statement of
//! its `WriteTx`: a rolled back operation leaves no entry.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use emporos_core::{new_id, ActionKind, Actor, ActivityLog};
use emporos_db::ActivityLogRepository;

use crate::error::LedgerResult;

/// What an audit entry is about.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    pub kind: &'static str,
    pub id: &'a str,
    /// Human-readable reference, usually the document number.
    pub repr: &'a str,
}

impl<'a> Subject<'a> {
    pub fn new(kind: &'static str, id: &'a str, repr: &'a str) -> Self {
        Subject { kind, id, repr }
    }
}

pub async fn record(
    conn: &mut SqliteConnection,
    actor: &Actor,
    action_kind: ActionKind,
    subject: Subject<'_>,
    details: impl Into<String>,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let entry = ActivityLog {
        id: new_id(),
        actor_id: actor.id.clone(),
        actor_name: actor.name.clone(),
        action_time: now,
        action_kind,
        subject_type: Some(subject.kind.to_string()),
        subject_id: Some(subject.id.to_string()),
        subject_repr: subject.repr.to_string(),
        details: details.into(),
    };
    ActivityLogRepository::insert(conn, &entry).await?;
    Ok(())
}

/// Login / logout entries have no subject.
pub async fn record_session(
    conn: &mut SqliteConnection,
    actor: &Actor,
    action_kind: ActionKind,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let entry = ActivityLog {
        id: new_id(),
        actor_id: actor.id.clone(),
        actor_name: actor.name.clone(),
        action_time: now,
        action_kind,
        subject_type: None,
        subject_id: None,
        subject_repr: String::new(),
        details: String::new(),
    };
    ActivityLogRepository::insert(conn, &entry).await?;
    Ok(())
}
