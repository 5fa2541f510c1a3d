//! Shared HTTP plumbing for the CardDAV and CalDAV clients.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bdaysync_core::{DavAccount, SyncError, SyncResult};
use http::{StatusCode, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use libdav::dav::{WebDavClient, WebDavError};
use tokio::time::timeout;
use tower::ServiceBuilder;
use tower_http::follow_redirect::{FollowRedirect, FollowRedirectLayer};

use crate::auth::{DavAuth, DavAuthLayer};

/// Every request to either server is bounded by this.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client with basic (or digest) auth and redirect following.
pub type HttpClient = FollowRedirect<
    DavAuth<Client<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, String>>,
>;

/// Create a libdav WebDavClient for `account`.
///
/// The client is configured with:
/// - Basic authentication using the account's credentials, retried with
///   Digest when the server asks for it
/// - Automatic redirect following (hosted services often redirect to per-user servers)
/// - HTTPS support, with plain HTTP allowed for self-hosted servers
pub fn create_webdav_client(account: &DavAccount) -> SyncResult<WebDavClient<HttpClient>> {
    let uri: Uri = account
        .url
        .parse()
        .map_err(|e| SyncError::Config(format!("Invalid server URL '{}': {e}", account.url)))?;

    let https_connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| SyncError::Connection(format!("Failed to load native TLS roots: {e}")))?
        .https_or_http()
        .enable_http1()
        .build();

    let http_client = Client::builder(TokioExecutor::new()).build(https_connector);

    let client = ServiceBuilder::new()
        .layer(FollowRedirectLayer::new())
        .layer(DavAuthLayer::new(&account.username, &account.password))
        .service(http_client);

    Ok(WebDavClient::new(uri, client))
}

/// Extract the href path from a full URL.
///
/// Converts "https://dav.example.com/123/calendars/abc/" to "/123/calendars/abc/".
/// Paths are returned unchanged.
pub fn url_to_href(url: &str) -> String {
    match url.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() => uri.path().to_string(),
        _ => url.to_string(),
    }
}

/// Compare two hrefs ignoring a trailing slash.
pub fn same_href(a: &str, b: &str) -> bool {
    url_to_href(a).trim_end_matches('/') == url_to_href(b).trim_end_matches('/')
}

/// Href of a child resource named after `uid` inside `collection`.
pub fn resource_href(collection: &str, uid: &str) -> String {
    format!(
        "{}/{}.ics",
        collection.trim_end_matches('/'),
        urlencoding::encode(uid)
    )
}

/// What a failed request is reported as, when it is not an authentication problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Connection,
    Sink,
}

impl Failure {
    fn error(self, message: String) -> SyncError {
        match self {
            Failure::Connection => SyncError::Connection(message),
            Failure::Sink => SyncError::Sink(message),
        }
    }
}

/// Map a libdav error: 401 is always [`SyncError::Auth`], everything else
/// becomes `failure`.
pub fn classify<E: fmt::Debug>(context: &str, failure: Failure, err: WebDavError<E>) -> SyncError {
    match err {
        WebDavError::BadStatusCode(StatusCode::UNAUTHORIZED) => {
            SyncError::Auth(format!("{context}: server rejected the credentials (401)"))
        }
        WebDavError::BadStatusCode(StatusCode::PRECONDITION_FAILED) => {
            failure.error(format!("{context}: resource changed on the server (412)"))
        }
        WebDavError::BadStatusCode(status) => failure.error(format!("{context}: HTTP {status}")),
        other => failure.error(format!("{context}: {other:?}")),
    }
}

/// Run a libdav request under [`REQUEST_TIMEOUT`] and classify its error.
pub async fn timed<T, E, F>(context: &str, failure: Failure, request: F) -> SyncResult<T>
where
    E: fmt::Debug,
    F: Future<Output = Result<T, WebDavError<E>>>,
{
    match timeout(REQUEST_TIMEOUT, request).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(classify(context, failure, e)),
        Err(_) => Err(failure.error(format!(
            "{context}: no response after {}s",
            REQUEST_TIMEOUT.as_secs()
        ))),
    }
}
