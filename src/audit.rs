//! Append-only trail of user-visible mutations (`audit_logs`).

use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

struct AuditEntry<'a> {
    user_id: Option<Uuid>,
    action: &'a str,
    resource: &'a str,
    metadata: Value,
}

async fn insert(pool: &DbPool, entry: &AuditEntry<'_>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO audit_logs (id, user_id, action, resource, metadata) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(entry.resource)
    .bind(&entry.metadata)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record `action` on `resource`. Never fails the caller: a failed write is
/// logged at `warn` and dropped.
pub async fn record(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    let entry = AuditEntry {
        user_id,
        action,
        resource,
        metadata,
    };
    if let Err(err) = insert(pool, &entry).await {
        tracing::warn!(error = %err, action, resource, "audit log write failed");
    }
}
