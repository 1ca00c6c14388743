pub mod access;
pub mod cash_flow;
pub mod config;
pub mod currency;
pub mod error;
pub mod kpi;
pub mod line_items;
pub mod proposal;
pub mod time_value;
pub mod types;
pub mod variables;

#[cfg(feature = "commission")]
pub mod commission;

#[cfg(feature = "session")]
pub mod session;

pub use config::EngineConfig;
pub use error::{DealEngineError, ErrorKind};
pub use types::*;

/// Standard result type for all deal-engine operations
pub type DealEngineResult<T> = Result<T, DealEngineError>;
