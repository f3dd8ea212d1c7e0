//! ---
//! ah_section: "01-core-functionality"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Shared primitives and utilities for the healing pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "AUTOHEAL_LOG";

/// Third-party crates stay at warn; every `autoheal*` target logs at info.
pub const DEFAULT_DIRECTIVE: &str = "warn,autoheal=info";

static GUARDS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

/// Stdout rendering. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Install the global subscriber for one CLI invocation.
///
/// `component` names the subcommand being run; each component writes its own
/// daily file, `<prefix>-<component>.log`. Filter directives come from
/// `AUTOHEAL_LOG`, then `RUST_LOG`, then [`DEFAULT_DIRECTIVE`]. Every line
/// carries the emitting thread id.
pub fn init_tracing(component: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("unable to create log directory {}", config.directory.display())
    })?;
    let file_name = log_file_name(config.file_prefix.as_deref(), component);
    let log_path = config.directory.join(&file_name);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &file_name));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set((file_guard, stdout_guard));

    let directive = pick_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .json()
            .with_thread_ids(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .compact()
            .with_thread_ids(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
    };
    let file_layer = fmt::layer()
        .json()
        .with_thread_ids(true)
        .with_current_span(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(build_filter(&directive))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        target: "autoheal::logging",
        component,
        log_file = %rolled_path(&log_path).display(),
        filter = %directive,
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

/// Base file name for a component's daily log.
fn log_file_name(prefix: Option<&str>, component: &str) -> String {
    let prefix = prefix.map(str::trim).filter(|p| !p.is_empty()).unwrap_or("autoheal");
    format!("{prefix}-{component}.log")
}

/// The daily appender suffixes the base name with the current UTC date.
fn rolled_path(base: &Path) -> PathBuf {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{date}"));
    PathBuf::from(name)
}

fn pick_directive(autoheal_log: Option<String>, rust_log: Option<String>) -> String {
    [autoheal_log, rust_log]
        .into_iter()
        .flatten()
        .map(|d| d.trim().to_owned())
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("invalid log directive '{directive}' ({err}); using '{DEFAULT_DIRECTIVE}'");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}
