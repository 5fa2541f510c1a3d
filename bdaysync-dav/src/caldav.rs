//! Birthday events on a CalDAV calendar.
//!
//! Lookups use a calendar-query REPORT for the birthday's date; writes are
//! conditional PUTs (`If-None-Match: *` to create, `If-Match` to replace).

use async_trait::async_trait;
use bdaysync_core::ics::{generate_ics, parse_existing, patch_event};
use bdaysync_core::{BirthdayEvent, DavAccount, EventQuery, EventSink, ExistingEvent, SyncError, SyncResult};
use libdav::CalDavClient;
use libdav::dav::{GetEtag, PutResource, mime_types};

use crate::client::{Failure, HttpClient, create_webdav_client, resource_href, timed, url_to_href};
use crate::discovery::{Collection, CollectionKind, collections_below, collections_of_principal, is_collection, optional_step};
use crate::requests::GetEventsOnDate;

/// Type alias for our CalDAV client.
pub type BirthdayCalDavClient = CalDavClient<HttpClient>;

/// Writes birthday events to one calendar collection.
pub struct CalDavSink {
    client: BirthdayCalDavClient,
    calendar: Collection,
}

impl CalDavSink {
    /// Connect and pick the calendar to write to.
    ///
    /// The server URL is used directly when it is a calendar. Otherwise the
    /// first calendar in the user's calendar-home-set is used, and failing
    /// that the first calendar below the server URL.
    pub async fn connect(account: &DavAccount) -> SyncResult<Self> {
        let client = CalDavClient::new(create_webdav_client(account)?);
        let base_href = url_to_href(&account.url);

        let calendar = match is_collection(&client, &base_href, CollectionKind::Calendar, Failure::Connection).await? {
            Some(calendar) => calendar,
            None => Self::discover(&client, &base_href)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SyncError::Connection(format!("no calendar found at {}", account.url)))?,
        };

        tracing::info!(calendar = %calendar.name, href = %calendar.href, "using calendar");
        Ok(CalDavSink { client, calendar })
    }

    async fn discover(client: &BirthdayCalDavClient, base_href: &str) -> SyncResult<Vec<Collection>> {
        let found = optional_step(
            "calendar-home-set",
            collections_of_principal(client, base_href, CollectionKind::Calendar, Failure::Connection).await,
        )?;
        if !found.is_empty() {
            return Ok(found);
        }
        collections_below(client, base_href, CollectionKind::Calendar, Failure::Connection).await
    }

    pub fn calendar(&self) -> &Collection {
        &self.calendar
    }

    async fn put_new(&self, href: &str, ics: &str) -> SyncResult<()> {
        timed(
            &format!("PUT {href}"),
            Failure::Sink,
            self.client
                .request(PutResource::new(href).create(ics, mime_types::CALENDAR)),
        )
        .await?;
        Ok(())
    }

    async fn put_existing(&self, href: &str, ics: &str, etag: &str) -> SyncResult<()> {
        timed(
            &format!("PUT {href}"),
            Failure::Sink,
            self.client
                .request(PutResource::new(href).update(ics, mime_types::CALENDAR, etag)),
        )
        .await?;
        Ok(())
    }

    async fn current_etag(&self, href: &str) -> SyncResult<String> {
        let response = timed(
            &format!("etag of {href}"),
            Failure::Sink,
            self.client.request(GetEtag::new(href)),
        )
        .await?;
        Ok(response.etag)
    }
}

#[async_trait]
impl EventSink for CalDavSink {
    async fn find_event(&self, query: &EventQuery) -> SyncResult<Option<ExistingEvent>> {
        let resources = timed(
            &format!("REPORT {} on {}", self.calendar.href, query.date),
            Failure::Sink,
            self.client
                .request(GetEventsOnDate::new(&self.calendar.href, query.date)),
        )
        .await?;

        let (found, extra) = query.pick(
            resources
                .into_iter()
                .filter_map(|r| parse_existing(&url_to_href(&r.href), r.etag, &r.data)),
        );
        if extra > 0 {
            tracing::warn!(contact = %query.name, date = %query.date, extra, "several birthday events on the same day, using the best match");
        }
        Ok(found)
    }

    async fn create_event(&self, event: &BirthdayEvent) -> SyncResult<()> {
        let href = resource_href(&self.calendar.href, &event.uid);
        self.put_new(&href, &generate_ics(event)).await
    }

    async fn replace_event(&self, existing: &ExistingEvent, event: &BirthdayEvent) -> SyncResult<()> {
        let etag = match &existing.etag {
            Some(etag) => etag.clone(),
            None => self.current_etag(&existing.href).await?,
        };
        self.put_existing(&existing.href, &patch_event(&existing.data, event), &etag)
            .await
    }
}
