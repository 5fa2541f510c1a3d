//! Finding address books and calendars on a DAV server.

use bdaysync_core::{SyncError, SyncResult};
use libdav::dav::WebDavClient;

use crate::client::{Failure, HttpClient, same_href, timed, url_to_href};
use crate::requests::{Propfind, PropfindEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    AddressBook,
    Calendar,
}

impl CollectionKind {
    fn resource_type(self) -> &'static str {
        match self {
            CollectionKind::AddressBook => "addressbook",
            CollectionKind::Calendar => "calendar",
        }
    }

    fn home_set(self, entry: &PropfindEntry) -> Option<&str> {
        match self {
            CollectionKind::AddressBook => entry.addressbook_home_set.as_deref(),
            CollectionKind::Calendar => entry.calendar_home_set.as_deref(),
        }
    }
}

/// An address book or calendar collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub href: String,
    pub name: String,
}

impl Collection {
    fn from_entry(entry: &PropfindEntry) -> Self {
        Collection {
            href: url_to_href(&entry.href),
            name: entry.label(),
        }
    }
}

/// Properties of `href` and its children, split into (self, children).
async fn list(
    client: &WebDavClient<HttpClient>,
    href: &str,
    failure: Failure,
) -> SyncResult<(Option<PropfindEntry>, Vec<PropfindEntry>)> {
    let entries = timed(
        &format!("PROPFIND {href}"),
        failure,
        client.request(Propfind::children(href)),
    )
    .await?;

    let (own, children): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| same_href(&e.href, href));
    Ok((own.into_iter().next(), children))
}

/// Collections of `kind` directly below `href`.
///
/// If there are none and `href` is itself such a collection, that is returned.
pub async fn collections_below(
    client: &WebDavClient<HttpClient>,
    href: &str,
    kind: CollectionKind,
    failure: Failure,
) -> SyncResult<Vec<Collection>> {
    let (own, children) = list(client, href, failure).await?;

    let found: Vec<Collection> = children
        .iter()
        .filter(|e| e.is(kind.resource_type()))
        .map(Collection::from_entry)
        .collect();
    if !found.is_empty() {
        return Ok(found);
    }

    Ok(own
        .filter(|e| e.is(kind.resource_type()))
        .map(|e| vec![Collection::from_entry(&e)])
        .unwrap_or_default())
}

/// Whether `href` is itself a collection of `kind`.
pub async fn is_collection(
    client: &WebDavClient<HttpClient>,
    href: &str,
    kind: CollectionKind,
    failure: Failure,
) -> SyncResult<Option<Collection>> {
    let entries = timed(
        &format!("PROPFIND {href}"),
        failure,
        client.request(Propfind::resource(href)),
    )
    .await?;

    Ok(entries
        .iter()
        .find(|e| e.is(kind.resource_type()))
        .map(Collection::from_entry))
}

/// Follow current-user-principal and the home set to the user's collections.
///
/// Returns an empty list when the server does not advertise either property.
pub async fn collections_of_principal(
    client: &WebDavClient<HttpClient>,
    base_href: &str,
    kind: CollectionKind,
    failure: Failure,
) -> SyncResult<Vec<Collection>> {
    let base = timed(
        &format!("PROPFIND {base_href}"),
        failure,
        client.request(Propfind::resource(base_href)),
    )
    .await?;

    let Some(principal) = base.iter().find_map(|e| e.current_user_principal.clone()) else {
        tracing::debug!(href = base_href, "no current-user-principal advertised");
        return Ok(Vec::new());
    };
    let principal = url_to_href(&principal);

    let props = timed(
        &format!("PROPFIND {principal}"),
        failure,
        client.request(Propfind::resource(&principal)),
    )
    .await?;

    let Some(home) = props.iter().find_map(|e| kind.home_set(e).map(url_to_href)) else {
        tracing::debug!(%principal, "principal has no home set");
        return Ok(Vec::new());
    };
    tracing::debug!(%principal, %home, "found home set");

    let (_, children) = list(client, &home, failure).await?;
    Ok(children
        .iter()
        .filter(|e| e.is(kind.resource_type()))
        .map(Collection::from_entry)
        .collect())
}

/// Log and swallow a discovery step failure, unless the credentials are wrong.
pub fn optional_step(step: &str, result: SyncResult<Vec<Collection>>) -> SyncResult<Vec<Collection>> {
    match result {
        Ok(found) => Ok(found),
        Err(e @ SyncError::Auth(_)) => Err(e),
        Err(e) => {
            tracing::debug!(%e, step, "discovery step failed");
            Ok(Vec::new())
        }
    }
}
