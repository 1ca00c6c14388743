//! Interactive recalculation: debounced edits, latest-result-wins.
//!
//! Every edit gets a sequence number. Edits arriving within the quiet window
//! coalesce into one recalculation of the newest candidate. A finished
//! recalculation is shown only if no newer edit has been issued meanwhile;
//! anything older is discarded whatever order results arrive in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::access::Principal;
use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::line_items::LineItem;
use crate::proposal::{calculate_proposal, BusinessFields, DealService, FinancialSummary};
use crate::variables::MasterVariableSnapshot;
use crate::DealEngineResult;

/// Content under edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub business: BusinessFields,
    pub line_items: Vec<LineItem>,
}

/// Computes figures for a candidate.
#[async_trait]
pub trait Recalculator: Send + Sync {
    async fn recalculate(&self, candidate: &Candidate) -> DealEngineResult<FinancialSummary>;
}

/// Preview against a stored proposal's frozen snapshot (review flow).
pub struct ProposalPreview {
    service: Arc<DealService>,
    principal: Principal,
    proposal_id: String,
}

impl ProposalPreview {
    pub fn new(service: Arc<DealService>, principal: Principal, proposal_id: &str) -> Self {
        Self {
            service,
            principal,
            proposal_id: proposal_id.to_string(),
        }
    }
}

#[async_trait]
impl Recalculator for ProposalPreview {
    async fn recalculate(&self, candidate: &Candidate) -> DealEngineResult<FinancialSummary> {
        self.service
            .recalculate(
                &self.principal,
                &self.proposal_id,
                candidate.line_items.clone(),
                &candidate.business,
            )
            .map(|out| out.result)
    }
}

/// Preview before a proposal exists (creation flow), against a snapshot the
/// caller resolved up front.
pub struct DraftPreview {
    config: EngineConfig,
    snapshot: MasterVariableSnapshot,
}

impl DraftPreview {
    pub fn new(config: EngineConfig, snapshot: MasterVariableSnapshot) -> Self {
        Self { config, snapshot }
    }
}

#[async_trait]
impl Recalculator for DraftPreview {
    async fn recalculate(&self, candidate: &Candidate) -> DealEngineResult<FinancialSummary> {
        let mut items = candidate.line_items.clone();
        calculate_proposal(&candidate.business, &mut items, &self.snapshot, &self.config)
            .map(|out| out.result)
    }
}

/// Monotonic edit counter shared by the editor and the result appliers.
#[derive(Debug, Default)]
pub struct SequenceGate {
    issued: AtomicU64,
}

impl SequenceGate {
    /// Number for a new edit; starts at 1.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, sequence: u64) -> bool {
        sequence == self.latest()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecalcOutcome {
    Ready { summary: Box<FinancialSummary> },
    Failed { kind: ErrorKind, message: String },
}

/// What the editor currently displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionView {
    /// Sequence of the edit the outcome belongs to; 0 before any result
    pub applied_sequence: u64,
    pub outcome: Option<RecalcOutcome>,
}

type Edit = (u64, Candidate);

pub struct RecalculationSession {
    gate: Arc<SequenceGate>,
    tx: mpsc::UnboundedSender<Edit>,
    view: watch::Receiver<SessionView>,
    worker: JoinHandle<()>,
}

impl RecalculationSession {
    /// Start the debounce worker. Must be called inside a tokio runtime.
    pub fn start(recalculator: Arc<dyn Recalculator>, debounce: Duration) -> Self {
        let gate = Arc::new(SequenceGate::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(SessionView::default());
        let worker = tokio::spawn(debounce_worker(
            rx,
            debounce,
            recalculator,
            gate.clone(),
            Arc::new(view_tx),
        ));
        Self {
            gate,
            tx,
            view,
            worker,
        }
    }

    /// Register an edit; returns its sequence number.
    pub fn edit(&self, candidate: Candidate) -> u64 {
        let sequence = self.gate.issue();
        if self.tx.send((sequence, candidate)).is_err() {
            debug!(sequence, "session closed; edit ignored");
        }
        sequence
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Stop accepting edits, flush the pending one and wait for the worker.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.worker.await;
    }
}

async fn debounce_worker(
    mut rx: mpsc::UnboundedReceiver<Edit>,
    debounce: Duration,
    recalculator: Arc<dyn Recalculator>,
    gate: Arc<SequenceGate>,
    view: Arc<watch::Sender<SessionView>>,
) {
    let mut pending: Option<Edit> = None;
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    loop {
        match pending.take() {
            Some(edit) => {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(newer) => {
                            debug!(superseded = edit.0, by = newer.0, "edit coalesced");
                            pending = Some(newer);
                        }
                        None => {
                            in_flight.push(dispatch(edit, &recalculator, &gate, &view));
                            break;
                        }
                    },
                    _ = tokio::time::sleep(debounce) => {
                        in_flight.retain(|h| !h.is_finished());
                        in_flight.push(dispatch(edit, &recalculator, &gate, &view));
                    }
                }
            }
            None => match rx.recv().await {
                Some(edit) => pending = Some(edit),
                None => break,
            },
        }
    }

    for handle in in_flight {
        let _ = handle.await;
    }
    info!("recalculation session closed");
}

fn dispatch(
    (sequence, candidate): Edit,
    recalculator: &Arc<dyn Recalculator>,
    gate: &Arc<SequenceGate>,
    view: &Arc<watch::Sender<SessionView>>,
) -> JoinHandle<()> {
    debug!(sequence, "recalculation dispatched");
    let recalculator = recalculator.clone();
    let gate = gate.clone();
    let view = view.clone();
    tokio::spawn(async move {
        let outcome = match recalculator.recalculate(&candidate).await {
            Ok(summary) => RecalcOutcome::Ready {
                summary: Box::new(summary),
            },
            Err(e) => RecalcOutcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        let applied = view.send_if_modified(|current| {
            if gate.is_latest(sequence) && sequence > current.applied_sequence {
                current.applied_sequence = sequence;
                current.outcome = Some(outcome);
                true
            } else {
                false
            }
        });
        if applied {
            debug!(sequence, "recalculation applied");
        } else {
            debug!(sequence, latest = gate.latest(), "stale recalculation discarded");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_tracks_latest() {
        let gate = SequenceGate::default();
        assert_eq!(gate.latest(), 0);
        let a = gate.issue();
        let b = gate.issue();
        assert_eq!((a, b), (1, 2));
        assert!(!gate.is_latest(a));
        assert!(gate.is_latest(b));
    }
}
