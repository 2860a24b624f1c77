//! Wire types of the Prometheus rules API

use std::collections::BTreeMap;

use serde::Serialize;

use crate::rules::{RuleHealth, RuleState};

/// `{"status": "success", "data": {...}}`
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    pub status: &'static str,
    pub data: RuleDiscovery,
}

impl RuleResponse {
    pub fn success(data: RuleDiscovery) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RuleDiscovery {
    pub groups: Vec<RuleGroupView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupView {
    pub name: String,
    /// Namespace (folder) UID
    pub file: String,
    pub rules: Vec<AlertingRuleView>,
    /// Evaluation interval in seconds
    pub interval: u64,
    pub last_evaluation: String,
    /// Seconds
    #[serde(serialize_with = "seconds::serialize")]
    pub evaluation_time: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingRuleView {
    pub state: RuleState,
    pub name: String,
    /// JSON-encoded query list
    pub query: String,
    /// "for" in seconds; absent when the rule has none
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "seconds::serialize_option"
    )]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    pub health: RuleHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub last_evaluation: String,
    /// Seconds
    #[serde(serialize_with = "seconds::serialize")]
    pub evaluation_time: f64,
}

/// Seconds as JSON numbers, whole values written without a fraction (`10`, not `10.0`)
mod seconds {
    use serde::Serializer;

    /// Largest integer an f64 holds exactly
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

    pub fn serialize<S>(secs: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if secs.fract() == 0.0 && (0.0..MAX_EXACT).contains(secs) {
            serializer.serialize_u64(*secs as u64)
        } else {
            serializer.serialize_f64(*secs)
        }
    }

    pub fn serialize_option<S>(secs: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match secs {
            Some(secs) => serialize(secs, serializer),
            None => serializer.serialize_none(),
        }
    }
}
