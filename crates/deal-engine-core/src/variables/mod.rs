//! Global economic parameters: an append-only log, the service that writes
//! to it, and the per-proposal snapshot taken at creation.

pub mod model;
pub mod service;
pub mod snapshot;
pub mod store;

pub use model::{
    default_registry, MasterVariable, VariableDefinition, COST_OF_CAPITAL, EXCHANGE_RATE,
    GUARANTEE_LETTER_RATE, REQUIRED_VARIABLES,
};
pub use service::MasterVariableService;
pub use snapshot::{freeze, resolve_current, MasterVariableSnapshot};
pub use store::{InMemoryVariableLog, MasterVariableLog, NewMasterVariable};
