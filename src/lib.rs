//! promrules: Grafana-managed alert rules in Prometheus format
//!
//! Serves the rule groups a user may see as a Prometheus-compatible
//! `/api/v1/rules` document, optionally narrowed to a dashboard or panel.
//!
//! # Features
//!
//! - **Rule Store**: Rule groups per organization, ordered by folder and name
//! - **Folder Permissions**: Cached per-user read scopes with explicit reload
//! - **Dashboard Filter**: `dashboard_uid` / `panel_id` selectors over rule annotations
//! - **Prometheus View**: Rule discovery JSON with Grafana's number and string encoding
//! - **Ruler API**: Validated rule group writes and deletes
//!
//! # Example
//!
//! ```no_run
//! use promrules::prometheus::render_groups;
//! use promrules::rules::{AlertQuery, RelativeTimeRange, Rule, RuleGroup};
//! use std::time::Duration;
//!
//! let model = serde_json::json!({"type": "math", "expression": "2 + 3 > 1"})
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! let query = AlertQuery::new(
//!     "A",
//!     "-100",
//!     RelativeTimeRange::new(Duration::from_secs(18000), Duration::from_secs(10800)),
//!     model,
//! );
//! let group = RuleGroup::new(1, "default", "arulegroup", Duration::from_secs(60))
//!     .with_rule(Rule::new("AlwaysFiring", "A", vec![query]).with_for(Duration::from_secs(10)));
//!
//! let discovery = render_groups(&[group]).unwrap();
//! println!("{}", serde_json::to_string(&discovery).unwrap());
//! ```

pub mod access;
pub mod api;
pub mod auth;
pub mod prometheus;
pub mod rules;
pub mod store;

// Re-export commonly used types
pub use api::{build_router, run_server, ServerConfig};
pub use rules::{DashboardFilter, Rule, RuleGroup};
pub use store::{InMemoryRuleStore, RuleGroupStore, StoreError};
