use anyhow::Result;
use bdaysync_core::Settings;
use bdaysync_core::scheduler::Jobs;

use crate::app::DavJobs;

/// Check the configuration. With `HEALTH_CHECK_CONNECTIVITY` set, also
/// make sure the address book can be read.
pub async fn run(settings: &Settings) -> Result<()> {
    settings.validate()?;
    tracing::info!("configuration is complete");

    if settings.health_check_connectivity {
        let report = DavJobs::new(settings.clone()).diagnose().await?;
        tracing::info!(%report, "address book reachable");
    }

    println!("✓ healthy");
    Ok(())
}
