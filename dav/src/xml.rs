// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML helpers for reading multistatus replies and resolving hrefs.

use minidom::Element;
use url::Url;

use crate::error::{DavError, ErrorKind};

/// XML namespaces used by the DAV dialects.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// `CardDAV` namespace.
    pub const CARDDAV: &str = "urn:ietf:params:xml:ns:carddav";

    /// Calendar server extensions, home of `getctag`.
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal extensions, home of `calendar-color`.
    pub const APPLE_ICAL: &str = "http://apple.com/ns/ical/";

    /// `GroupDAV` namespace.
    pub const GROUPDAV: &str = "http://groupdav.org/";

    /// Returns the prefix used for a known namespace in request bodies.
    #[must_use]
    pub fn prefix(namespace: &str) -> Option<&'static str> {
        match namespace {
            DAV => Some("D"),
            CALDAV => Some("C"),
            CARDDAV => Some("CR"),
            CALENDARSERVER => Some("CS"),
            APPLE_ICAL => Some("ICAL"),
            GROUPDAV => Some("G"),
            _ => None,
        }
    }
}

/// Parses a response body into a DOM tree.
///
/// # Errors
///
/// Returns the parser message if the body is not well formed XML.
pub fn parse_document(body: &[u8]) -> Result<Element, String> {
    let text = std::str::from_utf8(body).map_err(|e| e.to_string())?;
    text.trim_start_matches('\u{feff}')
        .parse::<Element>()
        .map_err(|e| e.to_string())
}

/// Returns true if `root` is a `DAV:multistatus` element.
#[must_use]
pub fn is_multistatus(root: &Element) -> bool {
    root.is("multistatus", ns::DAV)
}

/// Iterates over the direct children of `parent` with the given name.
pub fn children<'a>(
    parent: &'a Element,
    namespace: &'a str,
    name: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    parent.children().filter(move |c| c.is(name, namespace))
}

/// Returns the trimmed text of the first matching child, if any.
#[must_use]
pub fn child_text(parent: &Element, namespace: &str, name: &str) -> Option<String> {
    parent
        .get_child(name, namespace)
        .map(|c| c.text().trim().to_string())
}

/// Returns the first `DAV:propstat` of a response whose status line reports 200.
#[must_use]
pub fn ok_propstat(response: &Element) -> Option<&Element> {
    children(response, ns::DAV, "propstat").find(|propstat| {
        child_text(propstat, ns::DAV, "status").is_some_and(|status| status.contains("200"))
    })
}

/// Returns the `DAV:prop` of the successful propstat of a response.
#[must_use]
pub fn ok_prop(response: &Element) -> Option<&Element> {
    ok_propstat(response).and_then(|propstat| propstat.get_child("prop", ns::DAV))
}

/// Extracts the numeric code from a status line such as `HTTP/1.1 424 Failed Dependency`.
#[must_use]
pub fn status_code(status_line: &str) -> Option<u16> {
    status_line.split_whitespace().nth(1)?.parse().ok()
}

/// Returns the `DAV:href` of a response or a property element.
#[must_use]
pub fn href(element: &Element) -> Option<String> {
    child_text(element, ns::DAV, "href").filter(|href| !href.is_empty())
}

/// Resolves an href against the URL it was received from.
///
/// Both absolute URLs and paths are accepted. The credentials of `base` are
/// carried over when the href has none of its own.
///
/// # Errors
///
/// Returns an [`ErrorKind::InvalidUrl`] error if the href cannot be resolved.
pub fn resolve_href(base: &Url, href: &str) -> Result<Url, DavError> {
    let mut url = base.join(href.trim())?;
    if url.username().is_empty() && !base.username().is_empty() {
        url.set_username(base.username())
            .and_then(|()| url.set_password(base.password()))
            .map_err(|()| {
                DavError::new(ErrorKind::InvalidUrl)
                    .with_detail(format!("cannot carry credentials to {}", display_url(&url)))
            })?;
    }
    Ok(url)
}

/// Formats a URL without its credentials.
#[must_use]
pub fn display_url(url: &Url) -> String {
    let mut url = url.clone();
    // Fails only for URLs that cannot carry credentials at all.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/calendars/user/work/</d:href>
    <d:propstat>
      <d:prop><d:displayname/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:displayname> Work </d:displayname></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn picks_successful_propstat() {
        let root = parse_document(MULTISTATUS.as_bytes()).unwrap();
        assert!(is_multistatus(&root));
        let response = children(&root, ns::DAV, "response").next().unwrap();
        assert_eq!(href(response).as_deref(), Some("/calendars/user/work/"));
        let prop = ok_prop(response).unwrap();
        assert_eq!(
            child_text(prop, ns::DAV, "displayname").as_deref(),
            Some("Work")
        );
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_document(b"<d:multistatus xmlns:d=\"DAV:\">").is_err());
        assert!(parse_document(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn parses_status_codes() {
        assert_eq!(status_code("HTTP/1.1 424 Failed Dependency"), Some(424));
        assert_eq!(status_code("HTTP/1.1 200 OK"), Some(200));
        assert_eq!(status_code("garbage"), None);
    }

    #[test]
    fn resolves_paths_and_carries_credentials() {
        let base = Url::parse("https://user:pw@dav.example.com/dav/").unwrap();
        let url = resolve_href(&base, "/calendars/user/").unwrap();
        assert_eq!(url.as_str(), "https://user:pw@dav.example.com/calendars/user/");

        let url = resolve_href(&base, "https://other.example.com/x/").unwrap();
        assert_eq!(url.username(), "user");
        assert_eq!(url.password(), Some("pw"));
        assert_eq!(display_url(&url), "https://other.example.com/x/");
    }
}
