use anyhow::{bail, Context, Result};
use clap::Args;
use monkey::Configuration;
use std::path::Path;

/// Flags overriding values of the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Package of the app under test
    #[clap(long)]
    pub package_name: Option<String>,

    #[clap(long)]
    pub launcher_package_name: Option<String>,

    /// Passes per set
    #[clap(long)]
    pub max_reps: Option<u32>,

    /// Sets per session
    #[clap(long)]
    pub max_sets: Option<u32>,

    /// Retry delay in milliseconds
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    #[clap(long)]
    pub text_input_chance: Option<f64>,

    #[clap(long)]
    pub checkbox_tick_chance: Option<f64>,

    #[clap(long)]
    pub radio_tick_chance: Option<f64>,

    #[clap(long)]
    pub scroll_chance: Option<f64>,

    #[clap(long)]
    pub oauth_search_chance: Option<f64>,

    #[clap(long)]
    pub back_button_press_chance: Option<f64>,

    /// Allow resetting app data between sets
    #[clap(long)]
    pub root_access: bool,

    /// Seed for a reproducible run
    #[clap(long, env = "MONKEY_SEED")]
    pub seed: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: Configuration) -> Configuration {
        if let Some(package) = &self.package_name {
            config.package_name = package.clone();
        }
        if let Some(launcher) = &self.launcher_package_name {
            config.launcher_package_name = launcher.clone();
        }
        if let Some(reps) = self.max_reps {
            config.max_reps = reps;
        }
        if let Some(sets) = self.max_sets {
            config.max_sets = sets;
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        let chances = [
            (&mut config.text_input_chance, self.text_input_chance),
            (&mut config.checkbox_tick_chance, self.checkbox_tick_chance),
            (&mut config.radio_tick_chance, self.radio_tick_chance),
            (&mut config.scroll_chance, self.scroll_chance),
            (&mut config.oauth_search_chance, self.oauth_search_chance),
            (&mut config.back_button_press_chance, self.back_button_press_chance),
        ];
        for (field, value) in chances {
            if let Some(value) = value {
                *field = value;
            }
        }
        if self.root_access {
            config = config.with_root_access(true);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

/// Reads a JSON or YAML configuration, chosen by file extension
pub fn load_config(path: &Path) -> Result<Configuration> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let config = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        _ => bail!(
            "Unsupported config format for {}: expected .json, .yaml or .yml",
            path.display()
        ),
    };
    Ok(config)
}

/// Loads the file (or starts from defaults), applies the flags and validates
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Configuration> {
    let base = match path {
        Some(path) => load_config(path)?,
        None => Configuration::default(),
    };
    let config = overrides.apply(base);
    config.validate().context("Configuration rejected")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_yaml_config_with_legacy_keys() {
        let file = file_with(
            ".yaml",
            "package_name: com.example.app\ntimeout: 500\nbackbutton_press_chance: 0.1\nmax_sets: 3\n",
        );

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.package_name, "com.example.app");
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.back_button_press_chance, 0.1);
        assert_eq!(config.max_sets, 3);
        assert_eq!(config.max_reps, 1);
    }

    #[test]
    fn test_json_config() {
        let file = file_with(".json", r#"{"package_name": "com.example.app", "scroll_chance": 1.0}"#);

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scroll_chance, 1.0);
        assert_eq!(config.text_input_chance, 0.5);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let file = file_with(".toml", "package_name = 'x'");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = file_with(".json", r#"{"package_name": "com.example.app", "max_reps": 4}"#);
        let overrides = ConfigOverrides {
            max_reps: Some(9),
            scroll_chance: Some(0.0),
            seed: Some(42),
            root_access: true,
            ..Default::default()
        };

        let config = resolve_config(Some(file.path()), &overrides).unwrap();

        assert_eq!(config.package_name, "com.example.app");
        assert_eq!(config.max_reps, 9);
        assert_eq!(config.scroll_chance, 0.0);
        assert_eq!(config.seed, Some(42));
        assert!(config.root_access);
    }

    #[test]
    fn test_resolved_config_is_validated() {
        let missing_package = resolve_config(None, &ConfigOverrides::default());
        assert!(missing_package.is_err());

        let overrides = ConfigOverrides {
            package_name: Some("com.example.app".to_string()),
            back_button_press_chance: Some(1.5),
            ..Default::default()
        };
        assert!(resolve_config(None, &overrides).is_err());
    }

    #[test]
    fn test_demo_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/monkey.yaml");
        let config = resolve_config(Some(&path), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.package_name, "com.example.shop");
        assert_eq!(config.seed, Some(7));
    }
}
