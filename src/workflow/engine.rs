use serde::Serialize;
use sqlx::MySqlPool;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::request::{RequestDetails, RequestHead, RequestKind};
use crate::workflow::capability::ActorContext;
use crate::workflow::guard::{self, Decision, TransitionError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("database error")]
    Db(#[from] sqlx::Error),
}

/// Outcome of a bulk decision. Successes are committed independently and are
/// never rolled back when other records fail.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkReport {
    #[schema(example = 3)]
    pub requested: usize,
    #[schema(example = 2)]
    pub updated: usize,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkFailure {
    #[schema(example = 17)]
    pub id: u64,
    #[schema(example = "not authorized to decide this request")]
    pub error: String,
}

pub async fn load_head(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
) -> Result<Option<RequestHead>, sqlx::Error> {
    sqlx::query_as::<_, RequestHead>(
        r#"
        SELECT id, employee_id, department_id, status, created_by
        FROM approval_requests
        WHERE id = ? AND kind = ?
        "#,
    )
    .bind(id)
    .bind(kind.db_value())
    .fetch_optional(pool)
    .await
}

/// Insert a new pending request. Details must already be validated.
pub async fn submit(
    pool: &MySqlPool,
    kind: RequestKind,
    employee_id: u64,
    department_id: u64,
    details: &RequestDetails,
    reason: &str,
    created_by: u64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO approval_requests
            (kind, employee_id, department_id, details, status, reason, created_by)
        VALUES (?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(kind.db_value())
    .bind(employee_id)
    .bind(department_id)
    .bind(details.to_value())
    .bind(reason)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}

/// Apply one decision to one record: load, guard, then a conditional update
/// on `status = 'pending'` so concurrent deciders race at the database row
/// and exactly one wins.
pub async fn decide(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
    actor: &ActorContext,
    decision: Decision,
    remarks: Option<&str>,
) -> Result<(), WorkflowError> {
    let head = load_head(pool, kind, id)
        .await?
        .ok_or(TransitionError::NotFound)?;

    guard::authorize_transition(actor, &head, decision, remarks)?;

    apply_transition(pool, kind, id, actor, decision, remarks).await
}

async fn apply_transition(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
    actor: &ActorContext,
    decision: Decision,
    remarks: Option<&str>,
) -> Result<(), WorkflowError> {
    let result = sqlx::query(
        r#"
        UPDATE approval_requests
        SET status = ?, remarks = ?, approved_by = ?, approved_at = NOW()
        WHERE id = ? AND kind = ? AND status = 'pending'
        "#,
    )
    .bind(decision.target_status().db_value())
    .bind(remarks)
    .bind(actor.user_id)
    .bind(id)
    .bind(kind.db_value())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Another decider won the row between our read and this update.
        return Err(TransitionError::AlreadyProcessed("processed".into()).into());
    }

    if decision == Decision::ForceApproved {
        tracing::warn!(
            target: "audit",
            actor = actor.user_id,
            request_id = id,
            kind = kind.db_value(),
            "force-approved, bypassing standard approval flow"
        );
    }

    Ok(())
}

/// Pure screening step of the bulk coordinator: re-checks the guard for every
/// record, no batch bypass of per-record authorization.
pub fn screen(
    actor: &ActorContext,
    requested: &[u64],
    heads: &[RequestHead],
    decision: Decision,
    remarks: Option<&str>,
) -> (Vec<u64>, Vec<BulkFailure>) {
    let mut authorized = Vec::new();
    let mut failed = Vec::new();

    for &id in requested {
        let Some(head) = heads.iter().find(|h| h.id == id) else {
            failed.push(BulkFailure {
                id,
                error: TransitionError::NotFound.to_string(),
            });
            continue;
        };

        match guard::authorize_transition(actor, head, decision, remarks) {
            Ok(()) => authorized.push(id),
            Err(e) => failed.push(BulkFailure {
                id,
                error: e.to_string(),
            }),
        }
    }

    (authorized, failed)
}

/// Bulk coordinator: one decision across many records. Each record is
/// committed independently; failures are reported, successes stand.
pub async fn decide_bulk(
    pool: &MySqlPool,
    kind: RequestKind,
    ids: &[u64],
    actor: &ActorContext,
    decision: Decision,
    remarks: Option<&str>,
) -> Result<BulkReport, sqlx::Error> {
    let heads = load_heads(pool, kind, ids).await?;
    let (authorized, mut failed) = screen(actor, ids, &heads, decision, remarks);

    let mut updated = 0usize;
    for id in authorized {
        match apply_transition(pool, kind, id, actor, decision, remarks).await {
            Ok(()) => updated += 1,
            Err(WorkflowError::Transition(e)) => failed.push(BulkFailure {
                id,
                error: e.to_string(),
            }),
            Err(WorkflowError::Db(e)) => {
                tracing::error!(error = %e, id, "bulk transition failed");
                failed.push(BulkFailure {
                    id,
                    error: "database error".into(),
                });
            }
        }
    }

    Ok(BulkReport {
        requested: ids.len(),
        updated,
        failed,
    })
}

async fn load_heads(
    pool: &MySqlPool,
    kind: RequestKind,
    ids: &[u64],
) -> Result<Vec<RequestHead>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, employee_id, department_id, status, created_by \
         FROM approval_requests WHERE kind = ? AND id IN ({placeholders})"
    );

    let mut query = sqlx::query_as::<_, RequestHead>(&sql).bind(kind.db_value());
    for id in ids {
        query = query.bind(id);
    }

    query.fetch_all(pool).await
}

/// Hard delete under the ownership rule checked by the guard.
pub async fn delete(
    pool: &MySqlPool,
    kind: RequestKind,
    id: u64,
    actor: &ActorContext,
) -> Result<(), WorkflowError> {
    let head = load_head(pool, kind, id)
        .await?
        .ok_or(TransitionError::NotFound)?;

    guard::authorize_delete(actor, &head)?;

    sqlx::query("DELETE FROM approval_requests WHERE id = ? AND kind = ?")
        .bind(id)
        .bind(kind.db_value())
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn head(id: u64, status: &str, department_id: u64) -> RequestHead {
        RequestHead {
            id,
            employee_id: 1000 + id,
            department_id,
            status: status.into(),
            created_by: 500,
        }
    }

    #[test]
    fn screen_reports_unauthorized_record_and_passes_the_rest() {
        // Dept manager of department 3; one record belongs to department 4.
        let actor = ActorContext::resolve(Role::DeptManager, 9, Some(90), Some(3));
        let ids = [1, 2, 3, 4];
        let heads = vec![
            head(1, "pending", 3),
            head(2, "pending", 3),
            head(3, "pending", 4),
            head(4, "pending", 3),
        ];

        let (authorized, failed) = screen(&actor, &ids, &heads, Decision::Approved, None);

        assert_eq!(authorized, vec![1, 2, 4]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, 3);
    }

    #[test]
    fn screen_flags_missing_and_processed_records() {
        let actor = ActorContext::resolve(Role::HrManager, 9, None, None);
        let ids = [1, 2, 99];
        let heads = vec![head(1, "approved", 3), head(2, "pending", 3)];

        let (authorized, failed) = screen(&actor, &ids, &heads, Decision::Approved, None);

        assert_eq!(authorized, vec![2]);
        let failed_ids: Vec<u64> = failed.iter().map(|f| f.id).collect();
        assert_eq!(failed_ids, vec![1, 99]);
    }

    #[test]
    fn screen_rejects_whole_batch_without_remarks() {
        let actor = ActorContext::resolve(Role::HrManager, 9, None, None);
        let ids = [1, 2];
        let heads = vec![head(1, "pending", 3), head(2, "pending", 3)];

        let (authorized, failed) = screen(&actor, &ids, &heads, Decision::Rejected, Some("  "));
        assert!(authorized.is_empty());
        assert_eq!(failed.len(), 2);
    }
}
