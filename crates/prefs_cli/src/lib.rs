use std::io::Write;
use std::path::PathBuf;

use debug_command::prefs::keys;
use debug_command::{CommandRegistry, PrefsHandle, PrefsStore};

pub const DEFAULT_PREFS_PATH: &str = "noa_debugger_prefs.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonOptions {
    pub prefs_path: PathBuf,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            prefs_path: PathBuf::from(DEFAULT_PREFS_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    List { prefix: Option<String> },
    Get { key: String },
    DeleteSaved {
        category: Option<String>,
        property: Option<String>,
    },
    AutoRefresh { enabled: Option<bool> },
    ResetView,
}

pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), String> {
    let store = PrefsStore::load(&opts.prefs_path).map_err(|error| error.to_string())?;

    match kind {
        CommandKind::List { prefix } => {
            let prefix = prefix.unwrap_or_default();
            for key in store.keys().filter(|key| key.starts_with(&prefix)) {
                emit(stdout, &format!("{key}={}", store.get_string(key, "")))?;
            }
            Ok(())
        }
        CommandKind::Get { key } => {
            if !store.has_key(&key) {
                return Err(format!("no pref named '{key}'"));
            }
            emit(stdout, &store.get_string(&key, ""))
        }
        CommandKind::DeleteSaved { category, property } => {
            let prefs = PrefsHandle::new(store);
            let removed = match (category.as_deref(), property.as_deref()) {
                (Some(category), Some(property)) => {
                    usize::from(CommandRegistry::delete_saved_property(&prefs, category, property))
                }
                (Some(category), None) => {
                    CommandRegistry::delete_all_properties_in_category(&prefs, category)
                }
                (None, None) => CommandRegistry::delete_all_saved_properties(&prefs),
                (None, Some(_)) => return Err("--property requires --category".to_string()),
            };
            prefs.save().map_err(|error| error.to_string())?;
            emit(stdout, &format!("deleted {removed} saved properties"))
        }
        CommandKind::AutoRefresh { enabled: None } => {
            let enabled = store.get_bool(keys::AUTO_REFRESH, false);
            emit(stdout, &format!("auto-refresh: {}", on_off(enabled)))
        }
        CommandKind::AutoRefresh {
            enabled: Some(enabled),
        } => {
            let mut store = store;
            store.set_bool(keys::AUTO_REFRESH, enabled);
            store.save().map_err(|error| error.to_string())?;
            emit(stdout, &format!("auto-refresh: {}", on_off(enabled)))
        }
        CommandKind::ResetView => {
            let mut store = store;
            let removed = [keys::GROUP_FILTER, keys::LAST_CATEGORY]
                .into_iter()
                .filter(|key| store.delete(key))
                .count();
            store.save().map_err(|error| error.to_string())?;
            emit(stdout, &format!("reset {removed} view prefs"))
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn emit<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("write output: {error}"))
}
