use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from clustertrace.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TraceConfig {
    pub timeline: TimelineConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Year injected into year-less log stamps (default: current UTC year).
    pub reference_year: Option<i32>,
    /// Also write each delta as a metric record.
    pub emit_metrics: bool,
    pub metric_prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub command_timeout_secs: u64,
    /// Log file paths or glob patterns, read in order.
    pub files: Vec<String>,
    pub commands: Vec<CommandSource>,
}

/// An external command whose stdout is part of the corpus.
///
/// Arguments may contain `{since}` (RFC3339) and `{since_journal}`
/// (`YYYY-MM-DD HH:MM:SS`) placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSource {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Errors loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl TraceConfig {
    /// Load config from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// --- Default implementations ---

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            reference_year: None,
            emit_metrics: false,
            metric_prefix: "pod-startup".to_string(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 60,
            files: Vec::new(),
            commands: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = TraceConfig::load(&dir.path().join("clustertrace.toml")).unwrap();
        assert_eq!(config.timeline.reference_year, None);
        assert!(!config.timeline.emit_metrics);
        assert_eq!(config.timeline.metric_prefix, "pod-startup");
        assert_eq!(config.sources.command_timeout_secs, 60);
        assert!(config.sources.files.is_empty());
        assert!(config.sources.commands.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clustertrace.toml");
        std::fs::write(&path, "[timeline]\nreference_year = 2025\n").unwrap();
        let config = TraceConfig::load(&path).unwrap();
        assert_eq!(config.timeline.reference_year, Some(2025));
        assert_eq!(config.timeline.metric_prefix, "pod-startup");
        assert_eq!(config.sources.command_timeout_secs, 60);
    }

    #[test]
    fn test_full_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clustertrace.toml");
        std::fs::write(
            &path,
            r#"
[timeline]
emit_metrics = true
metric_prefix = "startup"

[sources]
command_timeout_secs = 10
files = ["/var/log/kube/*.log"]

[[sources.commands]]
name = "controllers"
command = "oc"
args = ["logs", "controllers-abc", "--namespace", "kube-system", "--since-time", "{since}"]

[[sources.commands]]
name = "kubelet"
command = "ssh"
args = ["root@node-1", "journalctl -u atomic-openshift-node --since \"{since_journal}\" -o cat"]
required = false
"#,
        )
        .unwrap();
        let config = TraceConfig::load(&path).unwrap();
        assert!(config.timeline.emit_metrics);
        assert_eq!(config.timeline.metric_prefix, "startup");
        assert_eq!(config.sources.command_timeout_secs, 10);
        assert_eq!(config.sources.files, vec!["/var/log/kube/*.log"]);
        assert_eq!(config.sources.commands.len(), 2);
        assert!(config.sources.commands[0].required);
        assert!(!config.sources.commands[1].required);
        assert_eq!(config.sources.commands[1].command, "ssh");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clustertrace.toml");
        std::fs::write(&path, "[timeline\nemit_metrics = maybe").unwrap();
        let err = TraceConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("clustertrace.toml"));
    }
}
