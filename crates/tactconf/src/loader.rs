//! Config file discovery, layered loading, and environment variable overlay.

use crate::{ConfigError, TactusConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tactus/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tactus/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tactus.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Merge `files` in order over the defaults, then apply overrides from `env`.
///
/// `env` is a lookup function so callers (and tests) decide where variables
/// come from; [`process_env`] reads the real environment.
pub fn load_layered(
    files: &[PathBuf],
    env: &mut dyn FnMut(&str) -> Option<String>,
) -> Result<(TactusConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let mut config: TactusConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: files.last().cloned().unwrap_or_default(),
            message: e.to_string(),
        })?;

    apply_env_overrides(&mut config, &mut sources, env)?;
    Ok((config, sources))
}

/// Lookup in the process environment.
pub fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Read a config file as a raw table, checking it deserializes on its own so
/// type errors name the offending file.
fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let parse_err = |e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let table: toml::Table = contents.parse().map_err(parse_err)?;
    let _: TactusConfig = toml::Value::Table(table.clone())
        .try_into()
        .map_err(parse_err)?;
    Ok(table)
}

/// Deep-merge `overlay` into `base`; overlay scalars win, tables merge.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(
    config: &mut TactusConfig,
    sources: &mut ConfigSources,
    env: &mut dyn FnMut(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = env("TACTUS_DATASETS_DIR") {
        config.paths.datasets_dir = expand_path(&v);
        sources.env_overrides.push("TACTUS_DATASETS_DIR".to_string());
    }
    if let Some(v) = env("TACTUS_VISUALIZATIONS_DIR") {
        config.paths.visualizations_dir = expand_path(&v);
        sources.env_overrides.push("TACTUS_VISUALIZATIONS_DIR".to_string());
    }

    if let Some(v) = env("TACTUS_TOLERANCE") {
        config.scoring.tolerance = parse_env("TACTUS_TOLERANCE", &v)?;
        sources.env_overrides.push("TACTUS_TOLERANCE".to_string());
    }
    if let Some(v) = env("TACTUS_LIMIT") {
        config.scoring.limit = Some(parse_env("TACTUS_LIMIT", &v)?);
        sources.env_overrides.push("TACTUS_LIMIT".to_string());
    }
    if let Some(v) = env("TACTUS_SKIP_FAILURES") {
        config.scoring.skip_failures = parse_env("TACTUS_SKIP_FAILURES", &v)?;
        sources.env_overrides.push("TACTUS_SKIP_FAILURES".to_string());
    }
    if let Some(v) = env("TACTUS_TIMEOUT_SECS") {
        config.scoring.timeout_secs = Some(parse_env("TACTUS_TIMEOUT_SECS", &v)?);
        sources.env_overrides.push("TACTUS_TIMEOUT_SECS".to_string());
    }
    if let Some(v) = env("TACTUS_MAX_PARALLEL") {
        config.scoring.max_parallel = parse_env("TACTUS_MAX_PARALLEL", &v)?;
        sources.env_overrides.push("TACTUS_MAX_PARALLEL".to_string());
    }

    if let Some(v) = env("TACTUS_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("TACTUS_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = env("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    Ok(())
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }

    if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = match stripped.find('/') {
            Some(slash_pos) => (&stripped[..slash_pos], Some(&stripped[slash_pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let (config, sources) = load_layered(&[], &mut no_env).unwrap();
        assert_eq!(config, TactusConfig::default());
        assert!(sources.files.is_empty());
        assert!(sources.env_overrides.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.toml", "[scoring]\nlimit = 5\n");
        let (config, _) = load_layered(&[path], &mut no_env).unwrap();
        assert_eq!(config.scoring.limit, Some(5));
        // Other values should be defaults
        assert_eq!(config.scoring.tolerance, 1.5);
        assert_eq!(config.tracker.eval_window, 8);
    }

    #[test]
    fn test_later_file_wins_field_by_field() {
        let dir = TempDir::new().unwrap();
        let system = write(
            &dir,
            "system.toml",
            "[scoring]\ntolerance = 2.0\nlimit = 10\n\n[tracker]\nmax_hypotheses = 12\n",
        );
        let local = write(&dir, "local.toml", "[scoring]\nlimit = 3\n");

        let (config, sources) = load_layered(&[system, local], &mut no_env).unwrap();
        assert_eq!(config.scoring.tolerance, 2.0);
        assert_eq!(config.scoring.limit, Some(3));
        assert_eq!(config.tracker.max_hypotheses, 12);
        assert_eq!(sources.files.len(), 2);
    }

    #[test]
    fn test_type_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "[scoring]\ntolerance = \"wide\"\n");
        let err = load_layered(&[path.clone()], &mut no_env).unwrap_err();
        match err {
            ConfigError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_layered(&[PathBuf::from("/nonexistent/tactus.toml")], &mut no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.toml", "[telemetry]\nlog_level = \"warn\"\n");
        let vars: HashMap<&str, &str> = [
            ("TACTUS_TOLERANCE", "2.5"),
            ("TACTUS_LIMIT", "7"),
            ("TACTUS_SKIP_FAILURES", "true"),
            ("TACTUS_LOG_LEVEL", "debug"),
            ("TACTUS_DATASETS_DIR", "/data/sets"),
        ]
        .into_iter()
        .collect();
        let mut env = |name: &str| vars.get(name).map(|v| v.to_string());

        let (config, sources) = load_layered(&[path], &mut env).unwrap();
        assert_eq!(config.scoring.tolerance, 2.5);
        assert_eq!(config.scoring.limit, Some(7));
        assert!(config.scoring.skip_failures);
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.paths.datasets_dir, PathBuf::from("/data/sets"));
        assert_eq!(sources.env_overrides.len(), 5);
    }

    #[test]
    fn test_unparseable_env_is_an_error() {
        let mut env = |name: &str| (name == "TACTUS_LIMIT").then(|| "many".to_string());
        let err = load_layered(&[], &mut env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files_with_override(None);
    }
}
