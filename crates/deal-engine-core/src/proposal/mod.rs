//! The proposal aggregate and everything that acts on it.

pub mod calculator;
pub mod model;
pub mod notify;
pub mod service;
pub mod state;
pub mod store;

pub use calculator::{calculate_proposal, FinancialCache, FinancialSummary};
pub use model::{ApprovalStatus, BusinessFields, Outcome, Proposal, ProposalDraft};
pub use notify::{
    spawn_notification_worker, LoggingNotifier, NotificationEvent, NotificationQueue, Notifier,
};
pub use service::DealService;
pub use state::validate_rejection_note;
pub use store::{InMemoryProposalRepository, ProposalRepository};
