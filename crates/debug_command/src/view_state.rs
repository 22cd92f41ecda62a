use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::CommandGroupData;
use crate::prefs::{keys, PrefsHandle};

#[derive(Debug, Default, Deserialize, Serialize)]
struct GroupFilterFile {
    filters: Vec<GroupFilterEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct GroupFilterEntry {
    category: String,
    hidden_groups: Vec<String>,
}

/// Groups the user removed from the floating window, per category.
#[derive(Debug)]
pub struct FloatingGroupFilter {
    hidden: IndexMap<String, Vec<String>>,
    prefs: PrefsHandle,
}

impl FloatingGroupFilter {
    /// Reads the saved filter. Unreadable JSON is logged and treated as "nothing hidden".
    pub fn load(prefs: PrefsHandle) -> Self {
        let raw = prefs.get_string(keys::GROUP_FILTER, "");
        let hidden = if raw.trim().is_empty() {
            IndexMap::new()
        } else {
            match serde_json::from_str::<GroupFilterFile>(&raw) {
                Ok(file) => file
                    .filters
                    .into_iter()
                    .map(|entry| (entry.category, entry.hidden_groups))
                    .collect(),
                Err(error) => {
                    warn!(%error, "saved group filter is not valid json; ignoring it");
                    IndexMap::new()
                }
            }
        };
        Self { hidden, prefs }
    }

    pub fn is_group_shown(&self, category: &str, group: &str) -> bool {
        !self
            .hidden
            .get(category)
            .is_some_and(|groups| groups.iter().any(|hidden| hidden == group))
    }

    pub fn hidden_groups(&self, category: &str) -> &[String] {
        self.hidden
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Updates one group and writes the whole filter back to prefs.
    pub fn set_group_shown(&mut self, category: &str, group: &str, shown: bool) {
        let hidden = self.hidden.entry(category.to_string()).or_default();
        if shown {
            hidden.retain(|name| name != group);
        } else if !hidden.iter().any(|name| name == group) {
            hidden.push(group.to_string());
        }
        if hidden.is_empty() {
            self.hidden.shift_remove(category);
        }
        self.save();
    }

    /// Groups of `category` that the floating window should render, in model order.
    pub fn visible_groups<'a>(
        &self,
        category: &str,
        groups: &'a IndexMap<String, CommandGroupData>,
    ) -> Vec<(&'a str, &'a CommandGroupData)> {
        groups
            .iter()
            .filter(|(name, _)| self.is_group_shown(category, name))
            .map(|(name, group)| (name.as_str(), group))
            .collect()
    }

    fn save(&self) {
        let file = GroupFilterFile {
            filters: self
                .hidden
                .iter()
                .map(|(category, hidden_groups)| GroupFilterEntry {
                    category: category.clone(),
                    hidden_groups: hidden_groups.clone(),
                })
                .collect(),
        };
        match serde_json::to_string(&file) {
            Ok(json) => self.prefs.set_string(keys::GROUP_FILTER, json),
            Err(error) => warn!(%error, "failed to encode group filter"),
        }
    }
}

/// Category the main window showed last.
#[derive(Debug, Clone)]
pub struct LastCategory {
    prefs: PrefsHandle,
}

impl LastCategory {
    pub fn new(prefs: PrefsHandle) -> Self {
        Self { prefs }
    }

    pub fn remember(&self, category: &str) {
        self.prefs.set_string(keys::LAST_CATEGORY, category);
    }

    pub fn name(&self) -> Option<String> {
        Some(self.prefs.get_string(keys::LAST_CATEGORY, "")).filter(|name| !name.is_empty())
    }

    /// Index of the remembered category in `category_names`, or 0 when it is gone.
    pub fn select_index(&self, category_names: &[&str]) -> usize {
        self.name()
            .and_then(|last| category_names.iter().position(|name| *name == last))
            .unwrap_or(0)
    }
}
