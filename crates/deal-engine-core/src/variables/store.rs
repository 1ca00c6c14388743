use chrono::{DateTime, Utc};
use std::sync::RwLock;

use super::model::MasterVariable;
use crate::error::DealEngineError;
use crate::types::Rate;
use crate::DealEngineResult;

/// A row about to be appended; the log assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMasterVariable {
    pub variable_name: String,
    pub value: Rate,
    pub category: String,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    pub comment: Option<String>,
}

/// Append-only storage for master-variable history. There is no update or
/// delete: the current value of a name is the newest row for it.
pub trait MasterVariableLog: Send + Sync {
    fn append(&self, row: NewMasterVariable) -> DealEngineResult<MasterVariable>;

    /// Newest row for `name`; on equal timestamps the later append wins.
    fn latest(&self, name: &str) -> DealEngineResult<Option<MasterVariable>>;

    /// Rows, newest first, optionally restricted to one category.
    fn history(&self, category: Option<&str>) -> DealEngineResult<Vec<MasterVariable>>;
}

#[derive(Debug, Default)]
pub struct InMemoryVariableLog {
    rows: RwLock<Vec<MasterVariable>>,
}

impl InMemoryVariableLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(_: impl std::fmt::Display) -> DealEngineError {
    DealEngineError::Storage("variable log lock poisoned".into())
}

impl MasterVariableLog for InMemoryVariableLog {
    fn append(&self, row: NewMasterVariable) -> DealEngineResult<MasterVariable> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let stored = MasterVariable {
            id: rows.len() as u64 + 1,
            variable_name: row.variable_name,
            value: row.value,
            category: row.category,
            recorded_at: row.recorded_at,
            recorded_by: row.recorded_by,
            comment: row.comment,
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    fn latest(&self, name: &str) -> DealEngineResult<Option<MasterVariable>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|r| r.variable_name == name)
            .max_by_key(|r| (r.recorded_at, r.id))
            .cloned())
    }

    fn history(&self, category: Option<&str>) -> DealEngineResult<Vec<MasterVariable>> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut out: Vec<MasterVariable> = rows
            .iter()
            .filter(|r| category.map_or(true, |c| r.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));
        Ok(out)
    }
}
