//! Dashboard / panel selection of rules

use std::num::ParseIntError;

use serde::Deserialize;

use super::model::RuleGroup;

/// Raw selector query parameters
#[derive(Debug, Default, Deserialize)]
pub struct RuleSelectorParams {
    pub dashboard_uid: Option<String>,
    pub panel_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid panel_id: {0}")]
    InvalidPanelId(#[from] ParseIntError),

    #[error("panel_id must be set with dashboard_uid")]
    PanelWithoutDashboard,
}

/// Keeps only rules annotated with a given dashboard and, optionally, panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    dashboard_uid: Option<String>,
    panel_id: Option<i64>,
}

impl DashboardFilter {
    /// Validate selector parameters.
    ///
    /// Empty values count as absent and a panel ID of `0` selects no panel.
    pub fn from_params(params: &RuleSelectorParams) -> Result<Self, FilterError> {
        let dashboard_uid = params
            .dashboard_uid
            .as_deref()
            .filter(|uid| !uid.is_empty())
            .map(str::to_string);

        let panel_id = match params.panel_id.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>()?).filter(|id| *id != 0),
        };

        if dashboard_uid.is_none() && panel_id.is_some() {
            return Err(FilterError::PanelWithoutDashboard);
        }

        Ok(Self {
            dashboard_uid,
            panel_id,
        })
    }

    pub fn dashboard(uid: impl Into<String>) -> Self {
        Self {
            dashboard_uid: Some(uid.into()),
            panel_id: None,
        }
    }

    pub fn with_panel(mut self, panel_id: i64) -> Self {
        self.panel_id = Some(panel_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dashboard_uid.is_none()
    }

    /// Reduce each group to its matching rules, dropping groups left empty
    pub fn apply(&self, groups: Vec<RuleGroup>) -> Vec<RuleGroup> {
        let Some(dashboard_uid) = self.dashboard_uid.as_deref() else {
            return groups;
        };

        groups
            .into_iter()
            .filter_map(|mut group| {
                group.rules.retain(|rule| {
                    rule.dashboard_uid() == Some(dashboard_uid)
                        && self.panel_id.map_or(true, |id| rule.panel_id() == Some(id))
                });
                (!group.rules.is_empty()).then_some(group)
            })
            .collect()
    }
}
