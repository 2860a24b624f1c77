//! Stored rule groups to Prometheus views

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::ser::Formatter;

use super::view::{AlertingRuleView, RuleDiscovery, RuleGroupView};
use crate::rules::{AlertQuery, Rule, RuleGroup};

/// Rendering of an unset timestamp
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

const ALERTING_RULE: &str = "alerting";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to encode rule queries: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("encoded rule queries are not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Compact JSON that also escapes `<`, `>`, `&`, U+2028 and U+2029
struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..idx].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Encode a rule's queries, with model defaults applied, as the `query` string
pub fn encode_queries(queries: &[AlertQuery]) -> Result<String, RenderError> {
    let queries: Vec<AlertQuery> = queries
        .iter()
        .cloned()
        .map(|mut q| {
            q.apply_model_defaults();
            q
        })
        .collect();

    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, HtmlSafeFormatter);
    queries.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => ZERO_TIME.to_string(),
    }
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then(|| map.clone())
}

fn non_zero_secs(duration: Duration) -> Option<f64> {
    (!duration.is_zero()).then(|| duration.as_secs_f64())
}

pub fn render_rule(rule: &Rule) -> Result<AlertingRuleView, RenderError> {
    Ok(AlertingRuleView {
        state: rule.status.state,
        name: rule.title.clone(),
        query: encode_queries(&rule.data)?,
        duration: non_zero_secs(rule.for_duration),
        annotations: non_empty(&rule.annotations),
        labels: non_empty(&rule.labels),
        health: rule.status.health,
        last_error: rule.status.last_error.clone(),
        kind: ALERTING_RULE,
        last_evaluation: format_timestamp(rule.status.last_evaluation),
        evaluation_time: rule.status.evaluation_duration.as_secs_f64(),
    })
}

pub fn render_group(group: &RuleGroup) -> Result<RuleGroupView, RenderError> {
    let rules = group
        .rules
        .iter()
        .map(render_rule)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleGroupView {
        name: group.name.clone(),
        file: group.namespace_uid.clone(),
        rules,
        interval: group.interval.as_secs(),
        last_evaluation: format_timestamp(group.last_evaluation),
        evaluation_time: group.evaluation_duration.as_secs_f64(),
    })
}

/// Render groups in order, skipping any without rules
pub fn render_groups(groups: &[RuleGroup]) -> Result<RuleDiscovery, RenderError> {
    let groups = groups
        .iter()
        .filter(|group| !group.rules.is_empty())
        .map(render_group)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleDiscovery { groups })
}
