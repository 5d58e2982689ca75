use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Directory holding project-local defer state.
pub const PROJECT_DIR: &str = ".defer";

/// Default snapshot file name inside [`PROJECT_DIR`].
pub const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Reject blocking edges that would close a cycle. When false the edge
    /// is persisted and only a warning is logged. Self-dependency is
    /// rejected either way.
    #[serde(default = "default_true")]
    pub reject_cycles: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            reject_cycles: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_true")]
    pub unblocked_first: bool,
    #[serde(default)]
    pub include_completed: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            unblocked_first: default_true(),
            include_completed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
    pub snapshot_path: PathBuf,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    load_user_config_from(&config_dir.join("defer/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve configuration for a CLI invocation rooted at `project_root`.
///
/// Snapshot path precedence: `cli_snapshot`, then `DEFER_SNAPSHOT`, then the
/// user config, then `<project_root>/.defer/snapshot.json`.
pub fn resolve_config(
    project_root: &Path,
    cli_json: bool,
    cli_snapshot: Option<&Path>,
) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    );

    let env_snapshot = env::var_os("DEFER_SNAPSHOT").map(PathBuf::from);
    let snapshot_path = resolve_snapshot_path(
        project_root,
        cli_snapshot,
        env_snapshot.as_deref(),
        user.snapshot.as_deref(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
        snapshot_path,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if is_tty { "pretty" } else { "text" }.to_string()
}

fn resolve_snapshot_path(
    project_root: &Path,
    cli_snapshot: Option<&Path>,
    env_snapshot: Option<&Path>,
    user_snapshot: Option<&Path>,
) -> PathBuf {
    cli_snapshot
        .or(env_snapshot)
        .or(user_snapshot)
        .map_or_else(
            || project_root.join(PROJECT_DIR).join(SNAPSHOT_FILE),
            Path::to_path_buf,
        )
}

const fn default_true() -> bool {
    true
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert!(cfg.graph.reject_cycles);
        assert!(cfg.ranking.unblocked_first);
        assert!(!cfg.ranking.include_completed);
        assert_eq!(cfg.store.lock_timeout_ms, 5_000);
    }

    #[test]
    fn project_config_overrides_selected_keys() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).expect("create .defer");
        std::fs::write(
            dir.join("config.toml"),
            "[graph]\nreject_cycles = false\n\n[ranking]\ninclude_completed = true\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert!(!cfg.graph.reject_cycles);
        assert!(cfg.ranking.include_completed);
        assert!(cfg.ranking.unblocked_first, "unset keys keep defaults");
        assert_eq!(cfg.store.lock_timeout_ms, 5_000);
    }

    #[test]
    fn malformed_project_config_reports_path() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).expect("create .defer");
        std::fs::write(dir.join("config.toml"), "[graph\nreject_cycles = ").expect("write");

        let err = load_project_config(root.path()).unwrap_err();
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn user_config_parses_output_and_snapshot() {
        let root = tempfile::tempdir().expect("temp dir");
        let path = root.path().join("config.toml");
        std::fs::write(&path, "output = \"json\"\nsnapshot = \"/srv/defer/snap.json\"\n")
            .expect("write");

        let cfg = load_user_config_from(&path).expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.snapshot, Some(PathBuf::from("/srv/defer/snap.json")));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text"), true), "json");
    }

    #[test]
    fn env_format_beats_user_output() {
        assert_eq!(resolve_output(false, Some("json"), Some("human"), false), "pretty");
        assert_eq!(resolve_output(false, Some("json"), Some("bogus"), true), "json");
        assert_eq!(resolve_output(false, None, None, false), "text");
    }

    #[test]
    fn snapshot_path_precedence() {
        let root = Path::new("/work/project");
        let cli = Path::new("/tmp/cli.json");
        let env = Path::new("/tmp/env.json");
        let user = Path::new("/tmp/user.json");

        assert_eq!(
            resolve_snapshot_path(root, Some(cli), Some(env), Some(user)),
            PathBuf::from("/tmp/cli.json")
        );
        assert_eq!(
            resolve_snapshot_path(root, None, Some(env), Some(user)),
            PathBuf::from("/tmp/env.json")
        );
        assert_eq!(
            resolve_snapshot_path(root, None, None, Some(user)),
            PathBuf::from("/tmp/user.json")
        );
        assert_eq!(
            resolve_snapshot_path(root, None, None, None),
            PathBuf::from("/work/project/.defer/snapshot.json")
        );
    }
}
