//! Prometheus-compatible rendering of rule groups

pub mod render;
pub mod view;

pub use render::{encode_queries, render_groups, RenderError};
pub use view::{AlertingRuleView, RuleDiscovery, RuleGroupView, RuleResponse};

/// Datasource name under which locally managed rules are served
pub const GRAFANA_DATASOURCE: &str = "grafana";
