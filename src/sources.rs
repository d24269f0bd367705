/// Log acquisition: read files, globs, stdin and external command output,
/// and join them into one corpus for milestone extraction.
///
/// Typical command sources are `oc logs <pod> --since-time {since}` for the
/// control plane and `ssh root@<node> journalctl ... --since "{since_journal}"`
/// for the kubelet.
use crate::config::CommandSource;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// One contributor to the corpus.
#[derive(Debug, Clone)]
pub enum LogSource {
    File(PathBuf),
    Stdin,
    Command(CommandSource),
}

impl LogSource {
    fn describe(&self) -> String {
        match self {
            LogSource::File(path) => path.display().to_string(),
            LogSource::Stdin => "stdin".to_string(),
            LogSource::Command(cmd) => cmd.name.clone(),
        }
    }
}

/// Errors collecting log text.
#[derive(Debug)]
pub enum SourceError {
    Glob {
        pattern: String,
        source: glob::PatternError,
    },
    Read {
        source_name: String,
        source: std::io::Error,
    },
    /// An argument uses a `{since}` placeholder but no start time was given.
    MissingSince { source_name: String },
    Spawn {
        source_name: String,
        source: std::io::Error,
    },
    Exit {
        source_name: String,
        code: Option<i32>,
        stderr: String,
    },
    Timeout { source_name: String, secs: u64 },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Glob { pattern, source } => {
                write!(f, "invalid log file pattern {pattern:?}: {source}")
            }
            SourceError::Read {
                source_name,
                source,
            } => write!(f, "failed to read log source {source_name}: {source}"),
            SourceError::MissingSince { source_name } => write!(
                f,
                "log source {source_name} uses a since placeholder but no --since time was given"
            ),
            SourceError::Spawn {
                source_name,
                source,
            } => write!(f, "failed to spawn log source {source_name}: {source}"),
            SourceError::Exit {
                source_name,
                code,
                stderr,
            } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                write!(f, "log source {source_name} exited with {code}: {stderr}")
            }
            SourceError::Timeout { source_name, secs } => {
                write!(f, "log source {source_name} timed out after {secs}s")
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Glob { source, .. } => Some(source),
            SourceError::Read { source, .. } => Some(source),
            SourceError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Turn file arguments into sources: `-` is stdin, patterns with glob
/// metacharacters are expanded (sorted), anything else is a literal path.
pub fn expand_files(patterns: &[String]) -> Result<Vec<LogSource>, SourceError> {
    let mut sources = Vec::new();
    for pattern in patterns {
        if pattern == "-" {
            sources.push(LogSource::Stdin);
            continue;
        }
        if !pattern.contains(['*', '?', '[']) {
            sources.push(LogSource::File(PathBuf::from(pattern)));
            continue;
        }

        let paths = glob::glob(pattern).map_err(|e| SourceError::Glob {
            pattern: pattern.clone(),
            source: e,
        })?;
        let mut matched = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| SourceError::Read {
                source_name: pattern.clone(),
                source: e.into(),
            })?;
            matched.push(path);
        }
        if matched.is_empty() {
            tracing::warn!(pattern = %pattern, "log file pattern matched nothing");
        }
        matched.sort();
        sources.extend(matched.into_iter().map(LogSource::File));
    }
    Ok(sources)
}

/// Replace `{since}` and `{since_journal}` in a command argument.
fn fill_placeholders(arg: &str, since: DateTime<Utc>) -> String {
    let journal = since
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    arg.replace("{since_journal}", &journal)
        .replace("{since}", &since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn build_args(
    source: &CommandSource,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<String>, SourceError> {
    source
        .args
        .iter()
        .map(|arg| {
            if !arg.contains("{since") {
                return Ok(arg.clone());
            }
            match since {
                Some(since) => Ok(fill_placeholders(arg, since)),
                None => Err(SourceError::MissingSince {
                    source_name: source.name.clone(),
                }),
            }
        })
        .collect()
}

/// Run a command source and return its stdout.
pub async fn run_command(
    source: &CommandSource,
    since: Option<DateTime<Utc>>,
    timeout: Duration,
) -> Result<String, SourceError> {
    let args = build_args(source, since)?;
    tracing::info!(
        name = %source.name,
        command = %source.command,
        args = ?args,
        "collecting log source"
    );

    let child = Command::new(&source.command)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SourceError::Spawn {
            source_name: source.name.clone(),
            source: e,
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| SourceError::Timeout {
            source_name: source.name.clone(),
            secs: timeout.as_secs(),
        })?
        .map_err(|e| SourceError::Read {
            source_name: source.name.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(SourceError::Exit {
            source_name: source.name.clone(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Ordered set of sources plus the settings needed to collect them.
#[derive(Debug, Clone)]
pub struct CorpusPlan {
    pub sources: Vec<LogSource>,
    pub command_timeout: Duration,
    pub since: Option<DateTime<Utc>>,
}

impl CorpusPlan {
    /// Collect every source in order and concatenate the text.
    ///
    /// Each source ends with a newline so lines from adjacent sources never
    /// fuse. A failing command marked `required = false` is skipped with a
    /// warning; any other failure aborts.
    pub async fn assemble(&self) -> Result<String, SourceError> {
        let mut corpus = String::new();
        for source in &self.sources {
            let text = match self.collect(source).await {
                Ok(text) => text,
                Err(e) if matches!(source, LogSource::Command(c) if !c.required) => {
                    tracing::warn!(
                        source = %source.describe(),
                        error = %e,
                        "optional log source failed, continuing without it"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(source = %source.describe(), bytes = text.len(), "log source collected");
            corpus.push_str(&text);
            if !text.is_empty() && !text.ends_with('\n') {
                corpus.push('\n');
            }
        }
        Ok(corpus)
    }

    async fn collect(&self, source: &LogSource) -> Result<String, SourceError> {
        match source {
            LogSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| SourceError::Read {
                        source_name: path.display().to_string(),
                        source: e,
                    })
            }
            LogSource::Stdin => {
                let mut text = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut text)
                    .await
                    .map_err(|e| SourceError::Read {
                        source_name: "stdin".to_string(),
                        source: e,
                    })?;
                Ok(text)
            }
            LogSource::Command(cmd) => run_command(cmd, self.since, self.command_timeout).await,
        }
    }
}
