use dashmap::DashMap;
use std::collections::BTreeMap;

use super::StoreError;
use crate::rules::{RuleEvaluation, RuleGroup};

/// Persistence for rule groups, scoped by organization
pub trait RuleGroupStore: Send + Sync {
    /// All groups of an org, ordered by namespace UID then group name
    fn list_rule_groups(&self, org_id: i64) -> Result<Vec<RuleGroup>, StoreError>;

    /// Insert or replace the group with the same (namespace, name)
    fn upsert_rule_group(&self, group: RuleGroup) -> Result<(), StoreError>;

    /// Returns false if no such group existed
    fn delete_rule_group(
        &self,
        org_id: i64,
        namespace_uid: &str,
        name: &str,
    ) -> Result<bool, StoreError>;

    /// Persist an evaluation outcome for one rule. Returns false if the rule is unknown.
    fn record_evaluation(
        &self,
        org_id: i64,
        namespace_uid: &str,
        group: &str,
        title: &str,
        evaluation: RuleEvaluation,
    ) -> Result<bool, StoreError>;
}

type GroupKey = (String, String);

/// In-memory rule group store
#[derive(Default)]
pub struct InMemoryRuleStore {
    /// Groups per org, keyed by (namespace UID, group name)
    orgs: DashMap<i64, BTreeMap<GroupKey, RuleGroup>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups stored for an org
    pub fn group_count(&self, org_id: i64) -> usize {
        self.orgs.get(&org_id).map(|groups| groups.len()).unwrap_or(0)
    }
}

impl RuleGroupStore for InMemoryRuleStore {
    fn list_rule_groups(&self, org_id: i64) -> Result<Vec<RuleGroup>, StoreError> {
        Ok(self
            .orgs
            .get(&org_id)
            .map(|groups| groups.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_rule_group(&self, mut group: RuleGroup) -> Result<(), StoreError> {
        let key = (group.namespace_uid.clone(), group.name.clone());
        let mut groups = self.orgs.entry(group.org_id).or_default();

        // Rules that survive a rewrite keep their last evaluation
        if let Some(previous) = groups.get(&key) {
            for rule in group.rules.iter_mut() {
                if let Some(old) = previous.rules.iter().find(|r| r.title == rule.title) {
                    rule.status = old.status.clone();
                }
            }
            group.last_evaluation = previous.last_evaluation;
            group.evaluation_duration = previous.evaluation_duration;
        }

        tracing::debug!(
            org_id = group.org_id,
            namespace = %group.namespace_uid,
            group = %group.name,
            rules = group.rules.len(),
            "Stored rule group"
        );
        groups.insert(key, group);
        Ok(())
    }

    fn delete_rule_group(
        &self,
        org_id: i64,
        namespace_uid: &str,
        name: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut groups) = self.orgs.get_mut(&org_id) else {
            return Ok(false);
        };
        Ok(groups
            .remove(&(namespace_uid.to_string(), name.to_string()))
            .is_some())
    }

    fn record_evaluation(
        &self,
        org_id: i64,
        namespace_uid: &str,
        group: &str,
        title: &str,
        evaluation: RuleEvaluation,
    ) -> Result<bool, StoreError> {
        let Some(mut groups) = self.orgs.get_mut(&org_id) else {
            return Ok(false);
        };
        let Some(group) = groups.get_mut(&(namespace_uid.to_string(), group.to_string())) else {
            return Ok(false);
        };
        let evaluated_at = evaluation.evaluated_at;
        let Some(rule) = group.rule_mut(title) else {
            return Ok(false);
        };
        rule.status = evaluation.into();

        if group.last_evaluation.map_or(true, |last| evaluated_at > last) {
            group.last_evaluation = Some(evaluated_at);
        }
        group.evaluation_duration = group
            .rules
            .iter()
            .map(|r| r.status.evaluation_duration)
            .sum();
        Ok(true)
    }
}
