use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rollcall_core::RollcallConfig;

/// Effective CLI settings: engine configuration plus the store location.
pub struct Settings {
    pub engine: RollcallConfig,
    pub store_dir: PathBuf,
}

impl Settings {
    /// Load the TOML file at `path` (defaults when absent), then apply
    /// `ROLLCALL_*` environment overrides and validate.
    pub fn load(path: Option<&Path>, store_dir: Option<PathBuf>) -> Result<Self> {
        let mut engine = match path {
            Some(path) => {
                let src = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                RollcallConfig::from_toml_str(&src)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => RollcallConfig::default(),
        };

        apply_env(&mut engine, |key| std::env::var(key).ok());
        engine.validate().context("invalid configuration after environment overrides")?;

        let store_dir = store_dir
            .or_else(|| std::env::var("ROLLCALL_STORE_DIR").map(PathBuf::from).ok())
            .unwrap_or_else(rollcall_store::default_store_dir);

        tracing::debug!(store = %store_dir.display(), "settings loaded");
        Ok(Self { engine, store_dir })
    }
}

/// Unparseable values leave the current setting in place.
fn apply_env(config: &mut RollcallConfig, var: impl Fn(&str) -> Option<String>) {
    let m = &mut config.matching;
    m.base_threshold = env_f32(&var, "ROLLCALL_BASE_THRESHOLD", m.base_threshold);
    m.group_threshold = env_f32(&var, "ROLLCALL_GROUP_THRESHOLD", m.group_threshold);
    m.group_face_count = env_usize(&var, "ROLLCALL_GROUP_FACE_COUNT", m.group_face_count);

    let e = &mut config.enrollment;
    e.target_accuracy = env_f32(&var, "ROLLCALL_TARGET_ACCURACY", e.target_accuracy);
    e.max_attempts = env_usize(&var, "ROLLCALL_MAX_ATTEMPTS", e.max_attempts);
}

fn env_f32(var: impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(var: impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_scalars() {
        let mut config = RollcallConfig::default();
        apply_env(
            &mut config,
            vars(&[
                ("ROLLCALL_BASE_THRESHOLD", "0.6"),
                ("ROLLCALL_GROUP_FACE_COUNT", "8"),
                ("ROLLCALL_MAX_ATTEMPTS", "3"),
            ]),
        );
        assert!((config.matching.base_threshold - 0.6).abs() < 1e-6);
        assert_eq!(config.matching.group_face_count, 8);
        assert_eq!(config.enrollment.max_attempts, 3);
        assert!((config.matching.group_threshold - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_env_values_fall_back() {
        let mut config = RollcallConfig::default();
        apply_env(
            &mut config,
            vars(&[
                ("ROLLCALL_TARGET_ACCURACY", "high"),
                ("ROLLCALL_MAX_ATTEMPTS", "-1"),
            ]),
        );
        assert!((config.enrollment.target_accuracy - 0.65).abs() < 1e-6);
        assert_eq!(config.enrollment.max_attempts, 10);
    }

    #[test]
    fn test_load_reads_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "[enrollment]\npolicy = \"majority\"\n").unwrap();

        let settings = Settings::load(Some(&path), Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(settings.engine.enrollment.policy, rollcall_core::EnrollmentPolicy::Majority);
        assert_eq!(settings.store_dir, dir.path());
    }

    #[test]
    fn test_load_rejects_bad_weights() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "[quality.weights]\nsharpness = 0.9\n").unwrap();
        assert!(Settings::load(Some(&path), Some(dir.path().to_path_buf())).is_err());
    }
}
