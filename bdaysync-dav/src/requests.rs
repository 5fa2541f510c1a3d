//! Custom WebDAV requests.
//!
//! libdav covers PUT and etag lookups; the PROPFIND, GET and calendar-query
//! requests here follow the same [`DavRequest`] shape and parse their
//! multistatus bodies with roxmltree.

use chrono::NaiveDate;
use http::Method;
use libdav::requests::{DavRequest, ParseResponseError, PreparedRequest};

// ============================================================================
// PROPFIND
// ============================================================================

const PROPFIND_BODY: &str = r#"<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:card="urn:ietf:params:xml:ns:carddav">
    <d:prop>
        <d:resourcetype/>
        <d:displayname/>
        <d:getetag/>
        <d:getcontenttype/>
        <d:current-user-principal/>
        <c:calendar-home-set/>
        <card:addressbook-home-set/>
    </d:prop>
</d:propfind>"#;

/// PROPFIND for the handful of properties discovery and listing need.
pub struct Propfind<'a> {
    href: &'a str,
    depth: u8,
}

impl<'a> Propfind<'a> {
    /// Properties of `href` itself.
    pub fn resource(href: &'a str) -> Self {
        Self { href, depth: 0 }
    }

    /// Properties of `href` and its direct children.
    pub fn children(href: &'a str) -> Self {
        Self { href, depth: 1 }
    }
}

/// One `<response>` of a PROPFIND multistatus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropfindEntry {
    pub href: String,
    /// Local names inside `<resourcetype>` (`collection`, `calendar`, `addressbook`).
    pub resource_types: Vec<String>,
    pub display_name: Option<String>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub current_user_principal: Option<String>,
    pub calendar_home_set: Option<String>,
    pub addressbook_home_set: Option<String>,
}

impl PropfindEntry {
    pub fn is(&self, resource_type: &str) -> bool {
        self.resource_types.iter().any(|t| t == resource_type)
    }

    /// A vCard resource, judged by file name or content type.
    pub fn is_vcard(&self) -> bool {
        self.href.to_ascii_lowercase().ends_with(".vcf")
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("vcard"))
    }

    /// Display name, or the last path segment.
    pub fn label(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| {
            self.href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }
}

impl DavRequest for Propfind<'_> {
    type Response = Vec<PropfindEntry>;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        Ok(PreparedRequest {
            method: Method::from_bytes(b"PROPFIND")?,
            path: self.href.to_string(),
            body: PROPFIND_BODY.to_string(),
            headers: vec![("Depth".to_string(), self.depth.to_string())],
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }
        parse_propfind(body)
    }
}

/// Parse a PROPFIND multistatus body.
pub fn parse_propfind(body: &[u8]) -> Result<Vec<PropfindEntry>, ParseResponseError> {
    let text = std::str::from_utf8(body)?;
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let mut entries = Vec::new();

    for response in root.descendants().filter(|n| n.tag_name().name() == "response") {
        let Some(href) = child_text(response, "href") else {
            continue;
        };

        let prop = |name: &str| {
            response
                .descendants()
                .find(|n| n.tag_name().name() == name)
        };
        let text = |name: &str| {
            prop(name)
                .and_then(|n| n.text())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let nested_href = |name: &str| prop(name).and_then(|n| child_text(n, "href"));

        let resource_types = prop("resourcetype")
            .map(|n| {
                n.children()
                    .filter(|c| c.is_element())
                    .map(|c| c.tag_name().name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        entries.push(PropfindEntry {
            href,
            resource_types,
            display_name: text("displayname"),
            etag: text("getetag"),
            content_type: text("getcontenttype"),
            current_user_principal: nested_href("current-user-principal"),
            calendar_home_set: nested_href("calendar-home-set"),
            addressbook_home_set: nested_href("addressbook-home-set"),
        });
    }

    Ok(entries)
}

fn child_text(node: roxmltree::Node, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============================================================================
// GET
// ============================================================================

/// Fetch a single resource body.
pub struct GetResource<'a> {
    href: &'a str,
}

impl<'a> GetResource<'a> {
    pub fn new(href: &'a str) -> Self {
        Self { href }
    }
}

#[derive(Debug)]
pub struct FetchedResource {
    pub etag: Option<String>,
    pub data: String,
}

impl DavRequest for GetResource<'_> {
    type Response = FetchedResource;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        Ok(PreparedRequest {
            method: Method::GET,
            path: self.href.to_string(),
            body: String::new(),
            headers: Vec::new(),
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }

        let etag = parts
            .headers
            .get(http::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = std::str::from_utf8(body)?.to_string();

        Ok(FetchedResource { etag, data })
    }
}

// ============================================================================
// calendar-query REPORT for a single day
// ============================================================================

/// Fetch calendar resources with a VEVENT overlapping `[date, date + 1)`.
///
/// Uses the CalDAV calendar-query REPORT with a time-range filter, so the
/// server does the date matching.
pub struct GetEventsOnDate<'a> {
    collection_href: &'a str,
    date: NaiveDate,
}

impl<'a> GetEventsOnDate<'a> {
    pub fn new(collection_href: &'a str, date: NaiveDate) -> Self {
        Self { collection_href, date }
    }
}

/// A fetched calendar resource with its ICS data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarResource {
    pub href: String,
    pub etag: Option<String>,
    pub data: String,
}

impl DavRequest for GetEventsOnDate<'_> {
    type Response = Vec<CalendarResource>;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        let start = self.date.format("%Y%m%dT000000Z");
        let end = self
            .date
            .succ_opt()
            .unwrap_or(self.date)
            .format("%Y%m%dT000000Z");

        let body = format!(
            r#"<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{start}" end="{end}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#
        );

        Ok(PreparedRequest {
            method: Method::from_bytes(b"REPORT")?,
            path: self.collection_href.to_string(),
            body,
            headers: vec![("Depth".to_string(), "1".to_string())],
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }
        parse_calendar_resources(body)
    }
}

/// Parse calendar resources from a CalDAV multistatus response.
pub fn parse_calendar_resources(body: &[u8]) -> Result<Vec<CalendarResource>, ParseResponseError> {
    let text = std::str::from_utf8(body)?;
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let mut resources = Vec::new();

    for response in root.descendants().filter(|n| n.tag_name().name() == "response") {
        let Some(href) = child_text(response, "href") else {
            continue;
        };

        let etag = response
            .descendants()
            .find(|n| n.tag_name().name() == "getetag")
            .and_then(|n| n.text())
            .map(|s| s.to_string());

        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text())
            .map(|s| s.to_string());

        // Only include resources that have calendar data
        if let Some(data) = data {
            resources.push(CalendarResource { href, etag, data });
        }
    }

    Ok(resources)
}
