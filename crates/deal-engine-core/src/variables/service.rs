use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::model::{MasterVariable, VariableDefinition, REQUIRED_VARIABLES};
use super::snapshot::{resolve_current, MasterVariableSnapshot};
use super::store::{MasterVariableLog, NewMasterVariable};
use crate::access::{authorize, Operation, Principal};
use crate::error::DealEngineError;
use crate::types::Rate;
use crate::DealEngineResult;

/// Records and reads master variables against a registry of known names.
pub struct MasterVariableService {
    log: Arc<dyn MasterVariableLog>,
    registry: Vec<VariableDefinition>,
}

impl MasterVariableService {
    pub fn new(log: Arc<dyn MasterVariableLog>, registry: Vec<VariableDefinition>) -> Self {
        Self { log, registry }
    }

    pub fn log(&self) -> &dyn MasterVariableLog {
        self.log.as_ref()
    }

    pub fn definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.registry.iter().find(|d| d.name == name)
    }

    /// Append a new value for `name`. The previous rows stay untouched.
    pub fn record(
        &self,
        principal: &Principal,
        name: &str,
        value: Rate,
        comment: Option<String>,
    ) -> DealEngineResult<MasterVariable> {
        let definition = self.definition(name).ok_or_else(|| DealEngineError::InvalidInput {
            field: "variable_name".into(),
            reason: format!("'{name}' is not a registered master variable"),
        })?;
        authorize(
            principal,
            Operation::WriteVariable {
                write_role: definition.write_role,
            },
        )?;

        let stored = self.log.append(NewMasterVariable {
            variable_name: definition.name.clone(),
            value,
            category: definition.category.clone(),
            recorded_at: Utc::now(),
            recorded_by: principal.id.clone(),
            comment: comment.filter(|c| !c.trim().is_empty()),
        })?;
        info!(
            variable = %stored.variable_name,
            value = %stored.value,
            by = %stored.recorded_by,
            "master variable recorded"
        );
        Ok(stored)
    }

    /// History, newest first. Every role may read it.
    pub fn history(
        &self,
        principal: &Principal,
        category: Option<&str>,
    ) -> DealEngineResult<Vec<MasterVariable>> {
        authorize(principal, Operation::ViewVariables)?;
        self.log.history(category)
    }

    /// Snapshot of the required variables as of now.
    pub fn snapshot_now(&self) -> DealEngineResult<MasterVariableSnapshot> {
        let resolved = resolve_current(self.log.as_ref(), &REQUIRED_VARIABLES)?;
        MasterVariableSnapshot::from_resolved(&resolved, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::model::{default_registry, EXCHANGE_RATE};
    use crate::variables::store::InMemoryVariableLog;
    use rust_decimal_macros::dec;

    fn service() -> MasterVariableService {
        MasterVariableService::new(Arc::new(InMemoryVariableLog::new()), default_registry())
    }

    #[test]
    fn test_record_appends_history() {
        let svc = service();
        let fin = Principal::finance("fin");
        svc.record(&fin, EXCHANGE_RATE, dec!(3.70), Some("BCRP".into()))
            .unwrap();
        svc.record(&fin, EXCHANGE_RATE, dec!(3.72), None).unwrap();
        let history = svc.history(&fin, Some("FINANCIAL")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, dec!(3.72));
        assert_eq!(history[1].comment.as_deref(), Some("BCRP"));
    }

    #[test]
    fn test_record_rejects_unknown_names_and_wrong_roles() {
        let svc = service();
        let err = svc
            .record(&Principal::admin("root"), "inflation", dec!(0.03), None)
            .unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidInput { .. }));

        let err = svc
            .record(&Principal::sales("ana"), EXCHANGE_RATE, dec!(3.7), None)
            .unwrap_err();
        assert!(matches!(err, DealEngineError::PermissionDenied(_)));

        assert!(svc
            .record(&Principal::admin("root"), EXCHANGE_RATE, dec!(3.7), None)
            .is_ok());
    }

    #[test]
    fn test_snapshot_now_needs_all_three() {
        let svc = service();
        svc.record(&Principal::finance("fin"), EXCHANGE_RATE, dec!(3.7), None)
            .unwrap();
        assert!(matches!(
            svc.snapshot_now(),
            Err(DealEngineError::MissingMasterVariable(_))
        ));
    }
}
