pub mod account;
pub mod allocation;
pub mod config;
pub mod money;
pub mod movement;
pub mod period;

pub use account::Collective;
pub use allocation::{
    round_confidence, AllocationRecord, MatchMethod, PendingItem, Suggestion, SuggestionKind,
};
pub use config::{ConfigError, ReconcileConfig};
pub use money::Money;
pub use movement::{compare_dates, day_gap, Movement, MovementKind};
pub use period::{DateRange, Quarter, ReportingPeriod};
