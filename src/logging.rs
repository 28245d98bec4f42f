// src/logging.rs
//! Tracing subscriber setup. Logs go to a file when configured, otherwise stderr.
//!
//! stderr shares the terminal with the renderer, so its output can be held
//! back through a [`StderrGate`] while the bars are on screen.

use std::{
    fs::File,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use tracing::Metadata;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, writer::MakeWriterExt, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

use crate::config::LogConfig;

/// Discards stderr log lines while held.
#[derive(Debug, Clone, Default)]
pub struct StderrGate(Arc<AtomicBool>);

impl StderrGate {
    pub fn hold(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Wrap `make` so that nothing is written while the gate is held.
    pub fn wrap<M>(self, make: M) -> impl for<'a> MakeWriter<'a> + Send + Sync + 'static
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        make.with_filter(move |_: &Metadata<'_>| !self.is_held())
    }
}

/// Installed logging. Keep it alive for the whole run; the file writer
/// thread flushes when it is dropped.
pub struct Logging {
    /// Gate on the stderr writer; holding it has no effect when logging to a file
    pub stderr: StderrGate,
    _guard: Option<WorkerGuard>,
}

/// Build the level filter. `RUST_LOG` takes precedence over the configured level.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.parse_level()).into())
        .from_env_lossy()
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) -> Result<Logging> {
    let filter = env_filter(config);
    let stderr = StderrGate::default();

    let Some(path) = &config.file else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(stderr.clone().wrap(std::io::stderr))
                    .with_target(false)
                    .with_filter(filter),
            )
            .try_init()
            .context("Failed to install log subscriber")?;
        return Ok(Logging {
            stderr,
            _guard: None,
        });
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    tracing::info!(level = %config.level, path = %path.display(), "logging to file");
    Ok(Logging {
        stderr,
        _guard: Some(guard),
    })
}
