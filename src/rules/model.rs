//! Alert rule and rule group types

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation linking a rule to a dashboard
pub const DASHBOARD_UID_ANNOTATION: &str = "__dashboardUid__";
/// Annotation linking a rule to a panel of the dashboard named by [`DASHBOARD_UID_ANNOTATION`]
pub const PANEL_ID_ANNOTATION: &str = "__panelId__";

/// Injected into a query model when it declares no `intervalMs`
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
/// Injected into a query model when it declares no `maxDataPoints`
pub const DEFAULT_MAX_DATA_POINTS: u64 = 43200;

/// A named, ordered set of rules evaluated together
#[derive(Debug, Clone, PartialEq)]
pub struct RuleGroup {
    /// Owning organization
    pub org_id: i64,
    /// UID of the folder the group lives in
    pub namespace_uid: String,
    /// Group name, unique within the namespace
    pub name: String,
    /// Evaluation interval
    pub interval: Duration,
    /// Rules in declaration order
    pub rules: Vec<Rule>,
    /// Most recent evaluation of any rule in the group
    pub last_evaluation: Option<DateTime<Utc>>,
    /// Time spent evaluating the group
    pub evaluation_duration: Duration,
}

impl RuleGroup {
    pub fn new(
        org_id: i64,
        namespace_uid: impl Into<String>,
        name: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            org_id,
            namespace_uid: namespace_uid.into(),
            name: name.into(),
            interval,
            rules: Vec::new(),
            last_evaluation: None,
            evaluation_duration: Duration::ZERO,
        }
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_mut(&mut self, title: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.title == title)
    }
}

/// A single alerting rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Title, unique within the group
    pub title: String,
    /// Ref ID of the query whose result decides firing
    pub condition: String,
    pub data: Vec<AlertQuery>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub no_data_state: NoDataState,
    pub exec_err_state: ExecErrState,
    /// Grace period before a pending rule fires
    pub for_duration: Duration,
    /// Last persisted evaluation outcome
    pub status: RuleStatus,
}

impl Rule {
    pub fn new(
        title: impl Into<String>,
        condition: impl Into<String>,
        data: Vec<AlertQuery>,
    ) -> Self {
        Self {
            title: title.into(),
            condition: condition.into(),
            data,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            no_data_state: NoDataState::default(),
            exec_err_state: ExecErrState::default(),
            for_duration: Duration::ZERO,
            status: RuleStatus::default(),
        }
    }

    pub fn with_for(mut self, for_duration: Duration) -> Self {
        self.for_duration = for_duration;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Link the rule to a dashboard panel
    pub fn with_dashboard_panel(self, dashboard_uid: impl Into<String>, panel_id: i64) -> Self {
        self.with_annotation(DASHBOARD_UID_ANNOTATION, dashboard_uid)
            .with_annotation(PANEL_ID_ANNOTATION, panel_id.to_string())
    }

    pub fn with_no_data_state(mut self, state: NoDataState) -> Self {
        self.no_data_state = state;
        self
    }

    pub fn with_exec_err_state(mut self, state: ExecErrState) -> Self {
        self.exec_err_state = state;
        self
    }

    pub fn dashboard_uid(&self) -> Option<&str> {
        self.annotations
            .get(DASHBOARD_UID_ANNOTATION)
            .map(String::as_str)
    }

    /// Panel ID annotation, `None` when absent or not an integer
    pub fn panel_id(&self) -> Option<i64> {
        self.annotations
            .get(PANEL_ID_ANNOTATION)
            .and_then(|p| p.parse().ok())
    }
}

/// One query or expression feeding a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQuery {
    pub ref_id: String,
    #[serde(default)]
    pub query_type: String,
    pub relative_time_range: RelativeTimeRange,
    pub datasource_uid: String,
    /// Datasource-specific query document, kept opaque
    #[serde(default)]
    pub model: serde_json::Map<String, serde_json::Value>,
}

impl AlertQuery {
    pub fn new(
        ref_id: impl Into<String>,
        datasource_uid: impl Into<String>,
        relative_time_range: RelativeTimeRange,
        model: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            query_type: String::new(),
            relative_time_range,
            datasource_uid: datasource_uid.into(),
            model,
        }
    }

    /// Fill `intervalMs` and `maxDataPoints` into the model unless already set
    pub fn apply_model_defaults(&mut self) {
        self.model
            .entry("intervalMs")
            .or_insert_with(|| serde_json::json!(DEFAULT_INTERVAL_MS));
        self.model
            .entry("maxDataPoints")
            .or_insert_with(|| serde_json::json!(DEFAULT_MAX_DATA_POINTS));
    }
}

/// Query window relative to evaluation time, e.g. `[now-5h, now-3h]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeTimeRange {
    #[serde(with = "duration_secs")]
    pub from: Duration,
    #[serde(with = "duration_secs")]
    pub to: Duration,
}

impl RelativeTimeRange {
    pub fn new(from: Duration, to: Duration) -> Self {
        Self { from, to }
    }
}

/// State assumed when a query returns no data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoDataState {
    #[default]
    NoData,
    Alerting,
    #[serde(rename = "OK")]
    Ok,
}

/// State assumed when evaluation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecErrState {
    #[default]
    Alerting,
    #[serde(rename = "OK")]
    Ok,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleState {
    #[default]
    Inactive,
    Pending,
    Firing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleHealth {
    #[default]
    Ok,
    Error,
    NoData,
}

/// Evaluation outcome persisted alongside a rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleStatus {
    pub state: RuleState,
    pub health: RuleHealth,
    pub last_error: Option<String>,
    pub last_evaluation: Option<DateTime<Utc>>,
    pub evaluation_duration: Duration,
}

/// Result of one evaluation, reported by the evaluation engine
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEvaluation {
    pub state: RuleState,
    pub health: RuleHealth,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
    pub duration: Duration,
}

impl From<RuleEvaluation> for RuleStatus {
    fn from(eval: RuleEvaluation) -> Self {
        Self {
            state: eval.state,
            health: eval.health,
            last_error: eval.error,
            last_evaluation: Some(eval.evaluated_at),
            evaluation_duration: eval.duration,
        }
    }
}

/// Whole-second duration (de)serialization
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
