//! Contacts from a CardDAV server.

use async_trait::async_trait;
use bdaysync_core::{ContactRecord, DavAccount, RecordSource, SourceRecord, SyncError, SyncResult};
use libdav::dav::WebDavClient;

use crate::client::{Failure, HttpClient, create_webdav_client, timed, url_to_href};
use crate::discovery::{Collection, CollectionKind, collections_below, collections_of_principal, optional_step};
use crate::requests::{GetResource, Propfind};

/// Reads birthday contacts from every address book of one account.
pub struct CardDavSource {
    client: WebDavClient<HttpClient>,
    base_href: String,
}

impl CardDavSource {
    /// Build a client for `account`. No request is made until contacts are listed.
    pub fn new(account: &DavAccount) -> SyncResult<Self> {
        let client = create_webdav_client(account)?;
        Ok(CardDavSource {
            client,
            base_href: url_to_href(&account.url),
        })
    }

    /// Address books below the server URL, then the base URL itself, then
    /// those of the current user principal.
    pub async fn discover(&self) -> SyncResult<Vec<Collection>> {
        let found = collections_below(
            &self.client,
            &self.base_href,
            CollectionKind::AddressBook,
            Failure::Connection,
        )
        .await?;
        if !found.is_empty() {
            return Ok(found);
        }

        optional_step(
            "addressbook-home-set",
            collections_of_principal(
                &self.client,
                &self.base_href,
                CollectionKind::AddressBook,
                Failure::Connection,
            )
            .await,
        )
    }

    /// Hrefs of the vCards in one address book.
    async fn vcard_hrefs(&self, book: &Collection) -> SyncResult<Vec<String>> {
        let entries = timed(
            &format!("PROPFIND {}", book.href),
            Failure::Connection,
            self.client.request(Propfind::children(&book.href)),
        )
        .await?;

        Ok(entries
            .into_iter()
            .filter(|e| e.is_vcard())
            .map(|e| url_to_href(&e.href))
            .collect())
    }

    async fn fetch_vcard(&self, href: &str) -> SyncResult<String> {
        let resource = timed(
            &format!("GET {href}"),
            Failure::Connection,
            self.client.request(GetResource::new(href)),
        )
        .await?;
        Ok(resource.data)
    }
}

#[async_trait]
impl RecordSource for CardDavSource {
    async fn list_contacts(&self) -> SyncResult<Vec<SourceRecord>> {
        let books = self.discover().await?;
        if books.is_empty() {
            return Err(SyncError::Connection(format!(
                "no address books found at {}",
                self.base_href
            )));
        }

        let mut records = Vec::new();

        for book in &books {
            let hrefs = self.vcard_hrefs(book).await?;
            tracing::info!(address_book = %book.name, cards = hrefs.len(), "reading address book");

            for href in hrefs {
                let content = match self.fetch_vcard(&href).await {
                    Ok(content) => content,
                    Err(e @ SyncError::Auth(_)) => return Err(e),
                    Err(e) => {
                        tracing::warn!(%href, %e, "could not fetch vCard");
                        records.push(Err(e));
                        continue;
                    }
                };

                match ContactRecord::from_vcard(&content) {
                    Ok(Some(mut contact)) => {
                        tracing::debug!(contact = %contact.name, birthday = %contact.birthday, "found birthday");
                        contact.address_book = Some(book.name.clone());
                        records.push(Ok(contact));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(%href, "vCard has an unreadable birthday");
                        records.push(Err(e));
                    }
                }
            }
        }

        Ok(records)
    }

    async fn address_books(&self) -> SyncResult<Vec<String>> {
        Ok(self
            .discover()
            .await?
            .into_iter()
            .map(|book| format!("{} ({})", book.name, book.href))
            .collect())
    }
}
