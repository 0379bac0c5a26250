use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::request::{RequestHead, RequestStatus};
use crate::workflow::capability::ActorContext;

/// Terminal decision an authorized actor can apply to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    ForceApproved,
}

impl Decision {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
            Decision::ForceApproved => RequestStatus::ForceApproved,
        }
    }
}

/// Per-field validation failure, surfaced to the caller as
/// `{"errors": {field: message}}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("request not found")]
    NotFound,
    #[error("request is already {0}")]
    AlreadyProcessed(String),
    #[error("not authorized to decide this request")]
    Forbidden,
    #[error("{0}")]
    Validation(FieldError),
}

/// Authorization and validation for a single status transition. Pure; the
/// caller loads the head row and applies the update afterwards.
pub fn authorize_transition(
    actor: &ActorContext,
    head: &RequestHead,
    decision: Decision,
    remarks: Option<&str>,
) -> Result<(), TransitionError> {
    match RequestStatus::parse(&head.status) {
        Some(RequestStatus::Pending) => {}
        Some(other) => return Err(TransitionError::AlreadyProcessed(other.db_value().into())),
        None => return Err(TransitionError::AlreadyProcessed(head.status.clone())),
    }

    if decision == Decision::Rejected && remarks.map_or(true, |r| r.trim().is_empty()) {
        return Err(TransitionError::Validation(FieldError::new(
            "remarks",
            "remarks are required when rejecting",
        )));
    }

    match decision {
        Decision::Approved | Decision::Rejected => {
            if !actor.authority.covers(head.department_id) {
                return Err(TransitionError::Forbidden);
            }
        }
        // Department scoping does not apply to a force-approval.
        Decision::ForceApproved => {
            if !actor.can_force_approve {
                return Err(TransitionError::Forbidden);
            }
        }
    }

    Ok(())
}

/// Deletion rule: a pending request may be removed only by its owner (the
/// submitter or the subject employee); processed requests only by
/// globally-scoped roles.
pub fn authorize_delete(actor: &ActorContext, head: &RequestHead) -> Result<(), TransitionError> {
    let is_owner = head.created_by == actor.user_id || actor.employee_id == Some(head.employee_id);
    let pending = RequestStatus::parse(&head.status) == Some(RequestStatus::Pending);

    if pending {
        if is_owner {
            Ok(())
        } else {
            Err(TransitionError::Forbidden)
        }
    } else if actor.authority == crate::workflow::capability::ApprovalAuthority::Global {
        Ok(())
    } else {
        Err(TransitionError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::workflow::capability::{ActorContext, ApprovalAuthority};

    fn head(status: &str, department_id: u64) -> RequestHead {
        RequestHead {
            id: 1,
            employee_id: 1000,
            department_id,
            status: status.into(),
            created_by: 500,
        }
    }

    fn actor(role: Role, department_id: Option<u64>) -> ActorContext {
        ActorContext::resolve(role, 9, Some(90), department_id)
    }

    #[test]
    fn hr_manager_approves_pending_request() {
        let ok = authorize_transition(
            &actor(Role::HrManager, None),
            &head("pending", 3),
            Decision::Approved,
            None,
        );
        assert_eq!(ok, Ok(()));
    }

    #[test]
    fn dept_manager_scoped_to_record_department() {
        let a = actor(Role::DeptManager, Some(3));
        assert_eq!(
            authorize_transition(&a, &head("pending", 3), Decision::Approved, None),
            Ok(())
        );
        assert_eq!(
            authorize_transition(&a, &head("pending", 4), Decision::Approved, None),
            Err(TransitionError::Forbidden)
        );
    }

    #[test]
    fn employee_cannot_decide() {
        assert_eq!(
            authorize_transition(
                &actor(Role::Employee, Some(3)),
                &head("pending", 3),
                Decision::Approved,
                None
            ),
            Err(TransitionError::Forbidden)
        );
    }

    #[test]
    fn reject_without_remarks_fails_validation() {
        for remarks in [None, Some(""), Some("   ")] {
            let err = authorize_transition(
                &actor(Role::HrManager, None),
                &head("pending", 3),
                Decision::Rejected,
                remarks,
            )
            .unwrap_err();
            assert!(matches!(err, TransitionError::Validation(f) if f.field == "remarks"));
        }
    }

    #[test]
    fn reject_with_remarks_succeeds() {
        assert_eq!(
            authorize_transition(
                &actor(Role::HrManager, None),
                &head("pending", 3),
                Decision::Rejected,
                Some("incomplete timesheet"),
            ),
            Ok(())
        );
    }

    #[test]
    fn force_approve_is_super_admin_only() {
        for role in [Role::HrManager, Role::DeptManager, Role::Employee] {
            assert_eq!(
                authorize_transition(
                    &actor(role, Some(3)),
                    &head("pending", 3),
                    Decision::ForceApproved,
                    None
                ),
                Err(TransitionError::Forbidden)
            );
        }
        assert_eq!(
            authorize_transition(
                &actor(Role::SuperAdmin, None),
                &head("pending", 3),
                Decision::ForceApproved,
                None
            ),
            Ok(())
        );
    }

    #[test]
    fn force_approve_ignores_department_scope() {
        // Super-admin has no department yet force-approves any record.
        let a = ActorContext::resolve(Role::SuperAdmin, 1, None, None);
        assert_eq!(
            authorize_transition(&a, &head("pending", 42), Decision::ForceApproved, None),
            Ok(())
        );
    }

    #[test]
    fn transitions_only_from_pending() {
        for status in ["approved", "rejected", "force_approved"] {
            let err = authorize_transition(
                &actor(Role::SuperAdmin, None),
                &head(status, 3),
                Decision::Approved,
                None,
            )
            .unwrap_err();
            assert_eq!(err, TransitionError::AlreadyProcessed(status.into()));
        }
    }

    #[test]
    fn owner_deletes_own_pending_request() {
        let mut h = head("pending", 3);
        h.created_by = 9; // same as actor user_id
        assert_eq!(authorize_delete(&actor(Role::Employee, None), &h), Ok(()));
    }

    #[test]
    fn subject_employee_counts_as_owner() {
        let mut h = head("pending", 3);
        h.employee_id = 90; // actor's employee profile
        assert_eq!(authorize_delete(&actor(Role::Employee, None), &h), Ok(()));
    }

    #[test]
    fn non_owner_never_deletes_pending() {
        for role in [Role::HrManager, Role::SuperAdmin, Role::DeptManager] {
            assert_eq!(
                authorize_delete(&actor(role, Some(3)), &head("pending", 3)),
                Err(TransitionError::Forbidden)
            );
        }
    }

    #[test]
    fn processed_requests_deleted_only_by_global_roles() {
        assert_eq!(
            authorize_delete(&actor(Role::HrManager, None), &head("approved", 3)),
            Ok(())
        );
        assert_eq!(
            authorize_delete(&actor(Role::DeptManager, Some(3)), &head("approved", 3)),
            Err(TransitionError::Forbidden)
        );
    }

    #[test]
    fn authority_covers_matches_department() {
        assert!(ApprovalAuthority::Global.covers(1));
        assert!(ApprovalAuthority::Department(1).covers(1));
        assert!(!ApprovalAuthority::Department(1).covers(2));
        assert!(!ApprovalAuthority::None.covers(1));
    }
}
