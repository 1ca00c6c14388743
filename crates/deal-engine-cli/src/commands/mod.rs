pub mod commission;
pub mod irr;
pub mod preview;
pub mod simulate;
pub mod timeline;

use deal_engine_core::line_items::LineItem;
use deal_engine_core::proposal::BusinessFields;
use deal_engine_core::variables::MasterVariableSnapshot;
use serde::Deserialize;

/// A proposal as accepted by `preview` and `timeline`: header, items and the
/// master-variable values to price them with.
#[derive(Debug, Deserialize)]
pub struct ProposalInput {
    pub business: BusinessFields,
    pub line_items: Vec<LineItem>,
    pub variables: MasterVariableSnapshot,
}
