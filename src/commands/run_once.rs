use anyhow::Result;
use bdaysync_core::Settings;
use bdaysync_core::scheduler::Jobs;

use crate::app::DavJobs;

pub async fn run(settings: &Settings) -> Result<()> {
    settings.validate()?;

    let report = DavJobs::new(settings.clone()).sync().await?;

    if report.failed > 0 {
        tracing::warn!(%report, "sync finished with failures");
    } else {
        tracing::info!(%report, "sync finished");
    }
    Ok(())
}
