//! Daemon settings. Precedence: env `AUTOANSWER__*` > `AUTOANSWER_CONFIG` file
//! (default `config/autoanswer.toml`) > built-in defaults.

use autoanswer_core::WorkerActivity;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSettings {
    /// Service configuration JSON, re-read on every evaluation.
    pub service_config_path: String,
    /// Use in-memory audio fakes instead of cpal/rodio.
    pub simulate_audio: bool,
    /// Queue depth between the stdin reader and the gate.
    pub event_buffer: usize,
    /// Activity the worker starts in.
    pub initial_activity: String,
    pub voice_enabled: bool,
    #[serde(default = "default_activities")]
    pub activities: Vec<WorkerActivity>,
}

fn default_activities() -> Vec<WorkerActivity> {
    vec![
        WorkerActivity::new("available", "Available", true),
        WorkerActivity::new("offline", "Offline", false),
        WorkerActivity::new("unavailable", "Unavailable", false),
        WorkerActivity::new("mic-error", "Microphone Error", false),
    ]
}

impl DaemonSettings {
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var("AUTOANSWER_CONFIG").unwrap_or_else(|_| "config/autoanswer".to_string());
        Self::load_from(&path)
    }

    /// Load with `path` (extension optional) as the file layer. A missing file is fine.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .set_default("service_config_path", "config/service-configuration.json")?
            .set_default("simulate_audio", false)?
            .set_default("event_buffer", 64_i64)?
            .set_default("initial_activity", "available")?
            .set_default("voice_enabled", true)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AUTOANSWER").separator("__"))
            .build()?;

        let mut settings: DaemonSettings = built.try_deserialize()?;
        settings.event_buffer = settings.event_buffer.max(1);
        if !settings
            .activities
            .iter()
            .any(|a| a.sid == settings.initial_activity)
        {
            return Err(config::ConfigError::Message(format!(
                "initial_activity '{}' is not a configured activity",
                settings.initial_activity
            )));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nothing-here");
        let settings = DaemonSettings::load_from(&missing.to_string_lossy()).unwrap();
        assert_eq!(settings.service_config_path, "config/service-configuration.json");
        assert!(!settings.simulate_audio);
        assert_eq!(settings.event_buffer, 64);
        assert_eq!(settings.activities.len(), 4);
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
simulate_audio = true
event_buffer = 0
initial_activity = "WAoffline"

[[activities]]
sid = "WAavailable"
name = "Available"
available = true

[[activities]]
sid = "WAoffline"
name = "Offline"
available = false
"#
        )
        .unwrap();

        let settings = DaemonSettings::load_from(&file.path().to_string_lossy()).unwrap();
        assert!(settings.simulate_audio);
        assert_eq!(settings.event_buffer, 1);
        assert_eq!(settings.initial_activity, "WAoffline");
        assert_eq!(settings.activities.len(), 2);
    }

    #[test]
    fn unknown_initial_activity_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, r#"initial_activity = "busy""#).unwrap();
        assert!(DaemonSettings::load_from(&file.path().to_string_lossy()).is_err());
    }
}
