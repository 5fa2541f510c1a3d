use anyhow::Result;
use bdaysync_core::Settings;
use bdaysync_core::scheduler::Scheduler;
use tokio_util::sync::CancellationToken;

use crate::app::DavJobs;

pub async fn run(settings: &Settings) -> Result<()> {
    settings.validate()?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let mut scheduler = Scheduler::new(settings.schedule_config(), DavJobs::new(settings.clone()), cancel);
    scheduler.run().await;

    tracing::info!("daemon stopped");
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received, shutting down"),
            _ = terminate() => tracing::info!("SIGTERM received, shutting down"),
        }
        token.cancel();
    });
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::warn!(%e, "cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
