use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

/// Targets that receive `default_level`; everything else stays at `warn`.
const WORKSPACE_TARGETS: [&str; 2] = ["brandchat_client", "brandchat"];
const DEFAULT_LOG_FILE: &str = "brandchat.logs.jsonl";

/// Where log records are written.
#[derive(Clone, Debug, PartialEq, Eq)]
enum LogOutput {
    Disabled,
    /// Compact text on stderr. Stdout carries the rendered reply.
    Console,
    /// JSON lines appended to a file.
    JsonFile { dir: PathBuf, file_name: String },
}

impl LogOutput {
    fn resolve(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("BRANDCHAT_OBSERVABILITY_ENABLED")
            .and_then(|value| parse_bool_env(&value))
            .unwrap_or(true);
        if !enabled {
            return Self::Disabled;
        }
        let Some(raw) = lookup("BRANDCHAT_JSON_LOG_PATH").filter(|p| !p.trim().is_empty()) else {
            return Self::Console;
        };
        let path = PathBuf::from(raw.trim());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE)
            .to_string();
        Self::JsonFile { dir, file_name }
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `warn` globally, `default_level` for this workspace's crates.
fn default_directives(default_level: &str) -> String {
    let mut directives = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directives.push_str(&format!(",{target}={default_level}"));
    }
    directives
}

fn resolve_filter(lookup: &impl Fn(&str) -> Option<String>, default_level: &str) -> EnvFilter {
    lookup("BRANDCHAT_LOG_LEVEL")
        .or_else(|| lookup("RUST_LOG"))
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(default_level)))
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `BRANDCHAT_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `BRANDCHAT_LOG_LEVEL`, then `RUST_LOG`: full filter override. Without either,
///   `brandchat_client` and `brandchat` log at `default_level` and other crates at `warn`.
/// - `BRANDCHAT_JSON_LOG_PATH`: if set, records go to that file as JSON lines
///   instead of stderr.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        let lookup = |key: &str| std::env::var(key).ok();
        let filter = resolve_filter(&lookup, default_level);
        match LogOutput::resolve(&lookup) {
            LogOutput::Disabled => {}
            LogOutput::Console => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(console_layer)
                    .try_init();
            }
            LogOutput::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(json_layer)
                    .try_init();
            }
        }
    });
}
