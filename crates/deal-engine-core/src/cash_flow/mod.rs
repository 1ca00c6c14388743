pub mod metrics;
pub mod timeline;

pub use metrics::{calculate_metrics, revenue_ratio, Metrics};
pub use timeline::{
    build_timeline, CashFlowTimeline, CommissionPolicy, OneTimeCostSchedule, OverflowPolicy,
    TimelineInput, TimelinePeriod, MAX_CONTRACT_TERM_MONTHS,
};
