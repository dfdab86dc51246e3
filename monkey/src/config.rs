use crate::errors::MonkeyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LAUNCHER_PACKAGE: &str = "com.google.android.apps.nexuslauncher";
pub const DEFAULT_USERNAME: &str = "MyUsernameInput";
pub const DEFAULT_PASSWORD: &str = "MyPasswordInput";
pub const DEFAULT_URL: &str = "https://dud.inf.tu-dresden.de";

/// Settings of one exploration session.
///
/// Every field has a default except `package_name`; call
/// [`Configuration::validate`] before handing it to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Package of the app under test
    pub package_name: String,
    pub launcher_package_name: String,
    pub username: String,
    pub password: String,
    pub url: String,
    /// Delay before a pass is re-triggered when no new snapshot arrives
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    pub max_reps: u32,
    pub max_sets: u32,
    pub text_input_chance: f64,
    pub checkbox_tick_chance: f64,
    #[serde(alias = "radiobutton_tick_chance")]
    pub radio_tick_chance: f64,
    pub scroll_chance: f64,
    #[serde(alias = "OAuth_search_chance")]
    pub oauth_search_chance: f64,
    #[serde(alias = "backbutton_press_chance")]
    pub back_button_press_chance: f64,
    /// Whether the session may reset app data between sets
    pub root_access: bool,
    /// Seed for reproducible runs; entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            launcher_package_name: DEFAULT_LAUNCHER_PACKAGE.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            url: DEFAULT_URL.to_string(),
            timeout_ms: 200,
            max_reps: 1,
            max_sets: 1,
            text_input_chance: 0.5,
            checkbox_tick_chance: 0.5,
            radio_tick_chance: 0.5,
            scroll_chance: 0.25,
            oauth_search_chance: 0.5,
            back_button_press_chance: 0.2,
            root_access: false,
            seed: None,
        }
    }
}

impl Configuration {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            ..Default::default()
        }
    }

    pub fn with_root_access(mut self, root_access: bool) -> Self {
        self.root_access = root_access;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probabilities(&self) -> [(&'static str, f64); 6] {
        [
            ("text_input_chance", self.text_input_chance),
            ("checkbox_tick_chance", self.checkbox_tick_chance),
            ("radio_tick_chance", self.radio_tick_chance),
            ("scroll_chance", self.scroll_chance),
            ("oauth_search_chance", self.oauth_search_chance),
            ("back_button_press_chance", self.back_button_press_chance),
        ]
    }

    pub fn validate(&self) -> Result<(), MonkeyError> {
        if self.package_name.trim().is_empty() {
            return Err(MonkeyError::InvalidConfig(
                "package_name must not be empty".to_string(),
            ));
        }
        for (name, value) in self.probabilities() {
            if !(0.0..=1.0).contains(&value) {
                return Err(MonkeyError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.max_reps == 0 {
            return Err(MonkeyError::InvalidConfig(
                "max_reps must be at least 1".to_string(),
            ));
        }
        if self.max_sets == 0 {
            return Err(MonkeyError::InvalidConfig(
                "max_sets must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(MonkeyError::InvalidConfig(
                "timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::new("com.example.app");
        assert_eq!(config.timeout(), Duration::from_millis(200));
        assert_eq!(config.max_reps, 1);
        assert_eq!(config.max_sets, 1);
        assert_eq!(config.scroll_chance, 0.25);
        assert_eq!(config.back_button_press_chance, 0.2);
        assert_eq!(config.launcher_package_name, DEFAULT_LAUNCHER_PACKAGE);
        assert!(!config.root_access);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults_and_aliases() {
        let config: Configuration = serde_json::from_str(
            r#"{"package_name": "com.example.app", "timeout": 500, "OAuth_search_chance": 0.0}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.oauth_search_chance, 0.0);
        assert_eq!(config.username, DEFAULT_USERNAME);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = Configuration::new("com.example.app");

        assert!(Configuration::default().validate().is_err());
        assert!(Configuration {
            scroll_chance: 1.5,
            ..base.clone()
        }
        .validate()
        .is_err());
        assert!(Configuration {
            text_input_chance: f64::NAN,
            ..base.clone()
        }
        .validate()
        .is_err());
        assert!(Configuration {
            max_reps: 0,
            ..base.clone()
        }
        .validate()
        .is_err());
        assert!(Configuration {
            max_sets: 0,
            ..base.clone()
        }
        .validate()
        .is_err());
        assert!(Configuration {
            timeout_ms: 0,
            ..base
        }
        .validate()
        .is_err());
    }
}
