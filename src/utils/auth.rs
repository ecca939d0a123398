use uuid::Uuid;

use crate::utils::errorhandler::{AppError, AppResult};
use crate::utils::jwt::{AccessRole, Claims};

/// Caller identity, fixed once at the authentication boundary and consumed
/// as a closed type everywhere after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Subject(Uuid),
    Admin(Uuid),
    Officer(Uuid),
}

impl Role {
    pub fn from_claims(claims: &Claims) -> Self {
        match claims.role {
            AccessRole::Subject => Role::Subject(claims.id),
            AccessRole::Admin => Role::Admin(claims.id),
            AccessRole::Officer => Role::Officer(claims.id),
        }
    }

    pub fn actor_id(&self) -> Uuid {
        match self {
            Role::Subject(id) | Role::Admin(id) | Role::Officer(id) => *id,
        }
    }

    /// Admins and officers may read any subject; subjects only themselves.
    pub fn can_access(&self, target_subject_id: Uuid) -> bool {
        match self {
            Role::Admin(_) | Role::Officer(_) => true,
            Role::Subject(id) => *id == target_subject_id,
        }
    }

    /// Officers may read but not modify subject records.
    pub fn can_modify(&self, target_subject_id: Uuid) -> bool {
        match self {
            Role::Admin(_) => true,
            Role::Subject(id) | Role::Officer(id) => *id == target_subject_id,
        }
    }

    pub fn is_officer(&self) -> bool {
        matches!(self, Role::Officer(_))
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin(_))
    }

    /// Officer-gated operations call this first and keep the officer id.
    pub fn require_officer(&self) -> AppResult<Uuid> {
        match self {
            Role::Officer(id) => Ok(*id),
            _ => Err(AppError::forbidden("only security officers have access")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_is_wider_than_modify() {
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(Role::Admin(other).can_access(target));
        assert!(Role::Officer(other).can_access(target));
        assert!(Role::Subject(target).can_access(target));
        assert!(!Role::Subject(other).can_access(target));

        assert!(Role::Admin(other).can_modify(target));
        assert!(!Role::Officer(other).can_modify(target));
        assert!(Role::Subject(target).can_modify(target));
        assert!(!Role::Subject(other).can_modify(target));
    }

    #[test]
    fn officer_gate() {
        let id = Uuid::new_v4();
        assert_eq!(Role::Officer(id).require_officer().unwrap(), id);
        assert!(Role::Admin(id).require_officer().is_err());
        assert!(Role::Subject(id).require_officer().is_err());
    }
}
