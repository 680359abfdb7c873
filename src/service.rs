//! Long-running publish loop.
//!
//! Each pass optionally checks all feeds, then delivers everything pending
//! for ready feeds. Passes are separated by the configured interval. SIGINT
//! or SIGTERM stop the loop between passes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::app::{AppContext, RelayError, Result};
use crate::config::ServiceConfig;
use crate::sync::check_all;

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub struct Service {
    ctx: Arc<AppContext>,
    interval: Duration,
    sync_before_publish: bool,
}

impl Service {
    pub fn new(ctx: Arc<AppContext>, config: &ServiceConfig) -> Result<Self> {
        let secs = config
            .interval_secs()
            .map_err(|e| RelayError::Config(e.to_string()))?;
        if secs == 0 {
            return Err(RelayError::Config("service interval must be positive".into()));
        }

        Ok(Self {
            ctx,
            interval: Duration::from_secs(secs),
            sync_before_publish: config.sync_before_publish,
        })
    }

    /// Run passes until a shutdown signal arrives or a pass hits a fatal error.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            interval = %format_interval(self.interval.as_secs()),
            pid = std::process::id(),
            "Service started"
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            self.run_pass().await?;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Service shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// A single sync-then-publish cycle. Only fatal errors are returned.
    pub async fn run_pass(&self) -> Result<()> {
        let start = Utc::now();

        if self.sync_before_publish {
            if let Err(e) = check_all(
                self.ctx.store.as_ref(),
                self.ctx.source.as_ref(),
                self.ctx.config.sync.check_limit,
            )
            .await
            {
                tracing::warn!(error = %e, "Feed check finished with errors");
            }
        }

        let publisher = self.ctx.publisher()?;
        match publisher.publish_all_ready().await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::warn!(error = %e, "Publish pass aborted"),
        }

        let elapsed = Utc::now().signed_duration_since(start);
        tracing::info!(
            elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0,
            next_in = %format_interval(self.interval.as_secs()),
            "Pass complete"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = tokio::signal::ctrl_c() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
