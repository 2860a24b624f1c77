//! Rule group write payloads and their validation

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use super::duration::{parse_duration, DurationError};
use super::model::{
    AlertQuery, ExecErrState, NoDataState, Rule, RuleGroup, DASHBOARD_UID_ANNOTATION,
    PANEL_ID_ANNOTATION,
};

/// Body of a rule group create/replace request
#[derive(Debug, Clone, Deserialize)]
pub struct PostableRuleGroup {
    pub name: String,
    /// Evaluation interval, e.g. `1m`; server default when absent
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub rules: Vec<PostableRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostableRule {
    #[serde(default, rename = "for")]
    pub for_duration: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub grafana_alert: PostableGrafanaRule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostableGrafanaRule {
    pub title: String,
    pub condition: String,
    #[serde(default)]
    pub data: Vec<AlertQuery>,
    #[serde(default)]
    pub no_data_state: Option<NoDataState>,
    #[serde(default)]
    pub exec_err_state: Option<ExecErrState>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule group name is empty")]
    EmptyGroupName,

    #[error("invalid group interval: {0}")]
    Interval(DurationError),

    #[error("group interval {0:?} must be a whole number of seconds")]
    IntervalNotWholeSeconds(String),

    #[error("invalid rule specification at index [{index}]: {reason}")]
    Rule { index: usize, reason: RuleSpecError },
}

/// Why a single rule was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleSpecError {
    #[error("both annotations __dashboardUid__ and __panelId__ must be specified")]
    DashboardPanelPair,

    #[error("annotation __panelId__ must be an integer, got {0:?}")]
    InvalidPanelId(String),

    #[error("title is empty")]
    EmptyTitle,

    #[error("condition is empty")]
    EmptyCondition,

    #[error("no queries or expressions are found")]
    NoQueries,

    #[error("condition {condition} does not exist, must be one of [{ref_ids}]")]
    UnknownCondition { condition: String, ref_ids: String },

    #[error("rule title '{0}' is not unique within the group")]
    DuplicateTitle(String),

    #[error("invalid for duration: {0}")]
    For(DurationError),
}

impl PostableRuleGroup {
    /// Validate the payload and build the group to store under `namespace_uid`
    pub fn into_rule_group(
        self,
        org_id: i64,
        namespace_uid: &str,
        default_interval: Duration,
    ) -> Result<RuleGroup, RuleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyGroupName);
        }

        let interval = match self.interval.as_deref() {
            None | Some("") => default_interval,
            Some(raw) => {
                let interval = parse_duration(raw).map_err(RuleValidationError::Interval)?;
                if interval.subsec_nanos() != 0 {
                    return Err(RuleValidationError::IntervalNotWholeSeconds(raw.to_string()));
                }
                interval
            }
        };

        let mut group = RuleGroup::new(org_id, namespace_uid, self.name, interval);
        let mut seen_titles = HashSet::new();

        for (index, postable) in self.rules.into_iter().enumerate() {
            let rule = postable
                .into_rule()
                .map_err(|reason| RuleValidationError::Rule { index, reason })?;

            if !seen_titles.insert(rule.title.clone()) {
                return Err(RuleValidationError::Rule {
                    index,
                    reason: RuleSpecError::DuplicateTitle(rule.title),
                });
            }
            group.rules.push(rule);
        }

        Ok(group)
    }
}

impl PostableRule {
    fn into_rule(self) -> Result<Rule, RuleSpecError> {
        let dashboard_uid = self.annotations.get(DASHBOARD_UID_ANNOTATION);
        let panel_id = self.annotations.get(PANEL_ID_ANNOTATION);
        match (dashboard_uid, panel_id) {
            (Some(_), None) | (None, Some(_)) => return Err(RuleSpecError::DashboardPanelPair),
            (Some(_), Some(panel)) if panel.parse::<i64>().is_err() => {
                return Err(RuleSpecError::InvalidPanelId(panel.clone()))
            }
            _ => {}
        }

        let alert = self.grafana_alert;
        if alert.title.trim().is_empty() {
            return Err(RuleSpecError::EmptyTitle);
        }
        if alert.condition.is_empty() {
            return Err(RuleSpecError::EmptyCondition);
        }
        if alert.data.is_empty() {
            return Err(RuleSpecError::NoQueries);
        }
        if !alert.data.iter().any(|q| q.ref_id == alert.condition) {
            let ref_ids = alert
                .data
                .iter()
                .map(|q| q.ref_id.as_str())
                .collect::<Vec<_>>()
                .join(",");
            return Err(RuleSpecError::UnknownCondition {
                condition: alert.condition,
                ref_ids,
            });
        }

        let for_duration = match self.for_duration.as_deref() {
            None | Some("") => Duration::ZERO,
            Some(raw) => parse_duration(raw).map_err(RuleSpecError::For)?,
        };

        let mut data = alert.data;
        data.iter_mut().for_each(AlertQuery::apply_model_defaults);

        let mut rule = Rule::new(alert.title, alert.condition, data)
            .with_for(for_duration)
            .with_no_data_state(alert.no_data_state.unwrap_or_default())
            .with_exec_err_state(alert.exec_err_state.unwrap_or_default());
        rule.labels = self.labels;
        rule.annotations = self.annotations;
        Ok(rule)
    }
}
