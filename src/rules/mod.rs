//! Alert rule groups: data model, write-path validation and read-path selectors

pub mod duration;
pub mod filter;
pub mod model;
pub mod validate;

pub use duration::{parse_duration, DurationError};
pub use filter::{DashboardFilter, FilterError, RuleSelectorParams};
pub use model::{
    AlertQuery, ExecErrState, NoDataState, RelativeTimeRange, Rule, RuleEvaluation, RuleGroup,
    RuleHealth, RuleState, RuleStatus,
};
pub use validate::{PostableRuleGroup, RuleSpecError, RuleValidationError};
