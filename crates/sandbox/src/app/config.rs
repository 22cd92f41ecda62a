use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub(crate) const CONFIG_PATH_ENV_VAR: &str = "NOA_SANDBOX_CONFIG";
const DEFAULT_FRAMES: u32 = 180;
const DEFAULT_FRAME_SECONDS: f32 = 1.0 / 60.0;

pub(crate) type ConfigResult<T> = Result<T, String>;

/// One property write applied before the first frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SetValue {
    pub(crate) category: String,
    pub(crate) command: String,
    pub(crate) value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct InvokeRequest {
    pub(crate) category: String,
    pub(crate) command: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SandboxConfig {
    /// Prefs file to load and save. Without one the session keeps prefs in memory.
    pub(crate) prefs_path: Option<PathBuf>,
    pub(crate) frames: u32,
    pub(crate) frame_seconds: f32,
    pub(crate) auto_refresh: bool,
    pub(crate) floating_window: bool,
    pub(crate) set_values: Vec<SetValue>,
    pub(crate) invoke: Vec<InvokeRequest>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            prefs_path: None,
            frames: DEFAULT_FRAMES,
            frame_seconds: DEFAULT_FRAME_SECONDS,
            auto_refresh: true,
            floating_window: false,
            set_values: Vec::new(),
            invoke: Vec::new(),
        }
    }
}

pub(crate) fn load_config_from_env() -> ConfigResult<SandboxConfig> {
    match std::env::var(CONFIG_PATH_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => load_config(Path::new(path.trim())),
        _ => Ok(SandboxConfig::default()),
    }
}

pub(crate) fn load_config(path: &Path) -> ConfigResult<SandboxConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("read config '{}': {error}", path.display()))?;
    let config = parse_config_json(&raw)?;
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn parse_config_json(raw: &str) -> ConfigResult<SandboxConfig> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SandboxConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(format!("parse config json: {source}"))
            } else {
                Err(format!("parse config json at {path}: {source}"))
            }
        }
    }
}

fn validation_err(path: &str, message: impl Into<String>) -> String {
    format!("validation failed at {path}: {}", message.into())
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

pub(crate) fn validate_config(config: &SandboxConfig) -> ConfigResult<()> {
    if !config.frame_seconds.is_finite() || config.frame_seconds <= 0.0 {
        return Err(expected_actual(
            "frame_seconds",
            "positive finite number",
            config.frame_seconds,
        ));
    }
    for (index, entry) in config.set_values.iter().enumerate() {
        require_name(&format!("set_values[{index}].category"), &entry.category)?;
        require_name(&format!("set_values[{index}].command"), &entry.command)?;
    }
    for (index, entry) in config.invoke.iter().enumerate() {
        require_name(&format!("invoke[{index}].category"), &entry.category)?;
        require_name(&format!("invoke[{index}].command"), &entry.command)?;
    }
    Ok(())
}

fn require_name(path: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(validation_err(path, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = parse_config_json(r#"{"frames": 12}"#).expect("parse");
        assert_eq!(config.frames, 12);
        assert!(config.auto_refresh);
        assert!(config.prefs_path.is_none());
        assert_eq!(config.frame_seconds, DEFAULT_FRAME_SECONDS);
    }

    #[test]
    fn parse_errors_name_the_offending_path() {
        let error = parse_config_json(r#"{"set_values": [{"category": "Player", "command": 3}]}"#)
            .expect_err("bad type");
        assert!(error.starts_with("parse config json at set_values[0].command:"), "{error}");

        let error = parse_config_json("{").expect_err("truncated");
        assert!(error.starts_with("parse config json"), "{error}");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = parse_config_json(r#"{"frame_count": 3}"#).expect_err("unknown field");
        assert!(error.contains("frame_count"), "{error}");
    }

    #[test]
    fn validation_rejects_bad_frame_time_and_blank_names() {
        let mut config = SandboxConfig {
            frame_seconds: 0.0,
            ..SandboxConfig::default()
        };
        let error = validate_config(&config).expect_err("zero frame time");
        assert_eq!(
            error,
            "validation failed at frame_seconds: expected positive finite number, got 0"
        );

        config.frame_seconds = 0.5;
        config.invoke.push(InvokeRequest {
            category: "Player".to_string(),
            command: " ".to_string(),
        });
        let error = validate_config(&config).expect_err("blank command");
        assert_eq!(error, "validation failed at invoke[0].command: must not be empty");
    }

    #[test]
    fn load_config_reads_and_validates_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"prefs_path": "prefs.json", "frames": 5, "invoke": [{{"category": "Player", "command": "Heal"}}]}}"#
        )
        .expect("write config");

        let config = load_config(file.path()).expect("load");
        assert_eq!(config.prefs_path, Some(PathBuf::from("prefs.json")));
        assert_eq!(config.invoke.len(), 1);
        assert_eq!(config.frames, 5);
    }
}
