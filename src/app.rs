//! Wires the DAV clients to the core jobs.

use async_trait::async_trait;
use bdaysync_core::scheduler::Jobs;
use bdaysync_core::{DiagnosticReport, PassReport, Settings, SyncResult, run_diagnostic, run_sync_pass};
use bdaysync_dav::{CalDavSink, CardDavSource};
use chrono::Local;

/// Jobs against the configured CardDAV and CalDAV servers.
///
/// Clients are built fresh for every run so a server that was down at
/// startup is picked up on the next tick.
pub struct DavJobs {
    settings: Settings,
}

impl DavJobs {
    pub fn new(settings: Settings) -> Self {
        DavJobs { settings }
    }
}

#[async_trait]
impl Jobs for DavJobs {
    async fn sync(&self) -> SyncResult<PassReport> {
        let source = CardDavSource::new(&self.settings.carddav_account()?)?;
        let sink = CalDavSink::connect(&self.settings.caldav_account()?).await?;
        let template = self.settings.event_template();

        run_sync_pass(&source, &sink, &template, Local::now().date_naive()).await
    }

    async fn diagnose(&self) -> SyncResult<DiagnosticReport> {
        let source = CardDavSource::new(&self.settings.carddav_account()?)?;
        run_diagnostic(&source).await
    }
}
