use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlarmSettings {
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub volume: f32,
    pub low_stock_notices: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibration_enabled: true,
            volume: 1.0,
            low_stock_notices: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    alarm: AlarmSettings,
}

pub struct SettingsStore {
    /// `None` keeps settings in memory only.
    path: Option<PathBuf>,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(UserSettings::default()),
        }
    }

    pub fn alarm(&self) -> AlarmSettings {
        match self.data.read() {
            Ok(guard) => guard.alarm.clone(),
            Err(poisoned) => poisoned.into_inner().alarm.clone(),
        }
    }

    pub fn update_alarm(&self, mut settings: AlarmSettings) -> Result<AlarmSettings> {
        settings.volume = settings.volume.clamp(0.0, 1.0);
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.alarm = settings.clone();
        self.persist(&guard)?;
        Ok(settings)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir().join(format!("medminder-settings-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let store = SettingsStore::new(temp_settings_path()).unwrap();
        assert_eq!(store.alarm(), AlarmSettings::default());
    }

    #[test]
    fn updates_persist_across_reloads() {
        let path = temp_settings_path();
        let store = SettingsStore::new(path.clone()).unwrap();

        store
            .update_alarm(AlarmSettings {
                sound_enabled: false,
                volume: 3.0,
                ..AlarmSettings::default()
            })
            .unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        let alarm = reloaded.alarm();
        assert!(!alarm.sound_enabled);
        assert_eq!(alarm.volume, 1.0);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_and_corrupt_files_fall_back_to_defaults() {
        let path = temp_settings_path();

        fs::write(&path, r#"{"alarm":{"vibrationEnabled":false}}"#).unwrap();
        let alarm = SettingsStore::new(path.clone()).unwrap().alarm();
        assert!(!alarm.vibration_enabled);
        assert!(alarm.sound_enabled);

        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::new(path.clone()).unwrap().alarm(), AlarmSettings::default());

        let _ = fs::remove_file(path);
    }
}
