//! Role gating for every engine entry point.
//!
//! Identity is resolved elsewhere; the engine only sees a [`Principal`] and
//! asks [`authorize`] before doing anything on its behalf.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DealEngineError;
use crate::DealEngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Sales,
    Finance,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Sales => "SALES",
            Role::Finance => "FINANCE",
            Role::Admin => "ADMIN",
        })
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn sales(id: impl Into<String>) -> Self {
        Self::new(id, Role::Sales)
    }

    pub fn finance(id: impl Into<String>) -> Self {
        Self::new(id, Role::Finance)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }
}

/// What the principal is trying to do. Proposal-scoped operations carry the
/// owner of the proposal they target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    CreateProposal,
    ViewProposal { owner: &'a str },
    EditProposal { owner: &'a str },
    PreviewProposal { owner: &'a str },
    Decide,
    RecalculateCommission,
    WriteVariable { write_role: Role },
    ViewVariables,
    ViewKpi,
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateProposal => f.write_str("create a proposal"),
            Operation::ViewProposal { .. } => f.write_str("view this proposal"),
            Operation::EditProposal { .. } => f.write_str("edit this proposal"),
            Operation::PreviewProposal { .. } => f.write_str("preview this proposal"),
            Operation::Decide => f.write_str("approve or reject proposals"),
            Operation::RecalculateCommission => f.write_str("recalculate commissions"),
            Operation::WriteVariable { write_role } => {
                write!(f, "update variables restricted to {write_role}")
            }
            Operation::ViewVariables => f.write_str("view master variables"),
            Operation::ViewKpi => f.write_str("view KPIs"),
        }
    }
}

/// Whether `principal` may perform `operation`.
pub fn is_allowed(principal: &Principal, operation: Operation<'_>) -> bool {
    match operation {
        Operation::CreateProposal | Operation::ViewVariables | Operation::ViewKpi => true,
        Operation::ViewProposal { owner }
        | Operation::EditProposal { owner }
        | Operation::PreviewProposal { owner } => {
            principal.role != Role::Sales || principal.id == owner
        }
        Operation::Decide | Operation::RecalculateCommission => {
            matches!(principal.role, Role::Finance | Role::Admin)
        }
        Operation::WriteVariable { write_role } => {
            principal.role == Role::Admin || principal.role == write_role
        }
    }
}

/// [`is_allowed`] as a `Result`, failing with `PermissionDenied`.
pub fn authorize(principal: &Principal, operation: Operation<'_>) -> DealEngineResult<()> {
    if is_allowed(principal, operation) {
        Ok(())
    } else {
        Err(DealEngineError::PermissionDenied(format!(
            "{} {} may not {}",
            principal.role, principal.id, operation
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_limited_to_own_proposals() {
        let ana = Principal::sales("ana");
        assert!(is_allowed(&ana, Operation::EditProposal { owner: "ana" }));
        assert!(!is_allowed(&ana, Operation::EditProposal { owner: "luis" }));
        assert!(!is_allowed(&ana, Operation::Decide));
        assert!(is_allowed(&Principal::finance("fin"), Operation::EditProposal { owner: "luis" }));
    }

    #[test]
    fn test_variable_writes_follow_registry_role() {
        let op = Operation::WriteVariable {
            write_role: Role::Finance,
        };
        assert!(is_allowed(&Principal::finance("f"), op));
        assert!(is_allowed(&Principal::admin("a"), op));
        assert!(!is_allowed(&Principal::sales("s"), op));
    }

    #[test]
    fn test_authorize_reports_permission_denied() {
        let err =
            authorize(&Principal::sales("ana"), Operation::RecalculateCommission).unwrap_err();
        assert!(matches!(err, DealEngineError::PermissionDenied(_)));
        assert!(err.to_string().contains("SALES ana"));
    }
}
