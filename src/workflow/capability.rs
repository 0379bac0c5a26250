use crate::model::role::Role;

/// Scope within which an actor may decide requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAuthority {
    /// Super-admins and HR managers decide for any department.
    Global,
    /// Department managers decide only for their own department.
    Department(u64),
    /// Plain employees hold no approval authority.
    None,
}

impl ApprovalAuthority {
    pub fn covers(&self, department_id: u64) -> bool {
        match self {
            ApprovalAuthority::Global => true,
            ApprovalAuthority::Department(own) => *own == department_id,
            ApprovalAuthority::None => false,
        }
    }
}

/// Everything the guard needs about the caller, resolved once per request
/// from the verified claims instead of re-checking role flags at every site.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub user_id: u64,
    pub employee_id: Option<u64>,
    pub authority: ApprovalAuthority,
    pub can_force_approve: bool,
}

impl ActorContext {
    pub fn resolve(
        role: Role,
        user_id: u64,
        employee_id: Option<u64>,
        department_id: Option<u64>,
    ) -> Self {
        let authority = match role {
            Role::SuperAdmin | Role::HrManager => ApprovalAuthority::Global,
            Role::DeptManager => department_id
                .map(ApprovalAuthority::Department)
                .unwrap_or(ApprovalAuthority::None),
            Role::Employee => ApprovalAuthority::None,
        };

        Self {
            user_id,
            employee_id,
            authority,
            can_force_approve: role == Role::SuperAdmin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_gets_global_authority_and_force() {
        let ctx = ActorContext::resolve(Role::SuperAdmin, 1, None, None);
        assert_eq!(ctx.authority, ApprovalAuthority::Global);
        assert!(ctx.can_force_approve);
    }

    #[test]
    fn hr_manager_is_global_but_cannot_force() {
        let ctx = ActorContext::resolve(Role::HrManager, 2, Some(20), Some(4));
        assert_eq!(ctx.authority, ApprovalAuthority::Global);
        assert!(!ctx.can_force_approve);
    }

    #[test]
    fn dept_manager_is_scoped_to_own_department() {
        let ctx = ActorContext::resolve(Role::DeptManager, 3, Some(30), Some(7));
        assert!(ctx.authority.covers(7));
        assert!(!ctx.authority.covers(8));
        assert!(!ctx.can_force_approve);
    }

    #[test]
    fn dept_manager_without_department_has_no_authority() {
        let ctx = ActorContext::resolve(Role::DeptManager, 3, Some(30), None);
        assert_eq!(ctx.authority, ApprovalAuthority::None);
    }

    #[test]
    fn employee_has_no_authority() {
        let ctx = ActorContext::resolve(Role::Employee, 4, Some(40), Some(7));
        assert_eq!(ctx.authority, ApprovalAuthority::None);
        assert!(!ctx.can_force_approve);
    }
}
