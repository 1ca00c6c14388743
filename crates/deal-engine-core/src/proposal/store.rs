use std::collections::BTreeMap;
use std::sync::RwLock;

use super::model::Proposal;
use crate::error::DealEngineError;
use crate::DealEngineResult;

/// Persistence for proposals.
///
/// `update` is the compare-and-swap primitive: the closure sees the stored
/// proposal, and its changes are committed only if it returns `Ok`, as one
/// atomic unit with respect to every other `update` on the same id.
pub trait ProposalRepository: Send + Sync {
    fn insert(&self, proposal: Proposal) -> DealEngineResult<Proposal>;

    fn get(&self, id: &str) -> DealEngineResult<Proposal>;

    /// All proposals, oldest first.
    fn list(&self) -> DealEngineResult<Vec<Proposal>>;

    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Proposal) -> DealEngineResult<()>,
    ) -> DealEngineResult<Proposal>;
}

#[derive(Debug, Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<BTreeMap<String, Proposal>>,
}

impl InMemoryProposalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(_: impl std::fmt::Display) -> DealEngineError {
    DealEngineError::Storage("proposal store lock poisoned".into())
}

fn not_found(id: &str) -> DealEngineError {
    DealEngineError::NotFound(format!("proposal {id}"))
}

impl ProposalRepository for InMemoryProposalRepository {
    fn insert(&self, proposal: Proposal) -> DealEngineResult<Proposal> {
        let mut proposals = self.proposals.write().map_err(poisoned)?;
        if proposals.contains_key(proposal.id()) {
            return Err(DealEngineError::Storage(format!(
                "duplicate proposal id {}",
                proposal.id()
            )));
        }
        proposals.insert(proposal.id().to_string(), proposal.clone());
        Ok(proposal)
    }

    fn get(&self, id: &str) -> DealEngineResult<Proposal> {
        let proposals = self.proposals.read().map_err(poisoned)?;
        proposals.get(id).cloned().ok_or_else(|| not_found(id))
    }

    fn list(&self) -> DealEngineResult<Vec<Proposal>> {
        let proposals = self.proposals.read().map_err(poisoned)?;
        let mut all: Vec<Proposal> = proposals.values().cloned().collect();
        all.sort_by_key(|p| p.submitted_at());
        Ok(all)
    }

    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut Proposal) -> DealEngineResult<()>,
    ) -> DealEngineResult<Proposal> {
        let mut proposals = self.proposals.write().map_err(poisoned)?;
        let stored = proposals.get_mut(id).ok_or_else(|| not_found(id))?;
        let mut working = stored.clone();
        apply(&mut working)?;
        *stored = working.clone();
        Ok(working)
    }
}
