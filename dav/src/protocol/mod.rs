// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Protocol dialects.
//!
//! Each dialect answers the same questions: which capabilities it has, how
//! to query collections and items, and how to read its replies. Jobs never
//! branch on the protocol themselves, they ask the dialect.

mod caldav;
mod carddav;
mod groupdav;

use std::fmt;

use minidom::Element;

use crate::error::DavError;
use crate::http::Verb;
use crate::request::Prop;
use crate::types::{Collection, ContentTypes, Protocol, TimeRange};
use crate::xml::{self, ns};

pub use caldav::CalDavProtocol;
pub use carddav::CardDavProtocol;
pub use groupdav::GroupDavProtocol;

/// One query used to list the items of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemsQuery {
    /// Content type of the items this query returns. Queries without one
    /// are never filtered out.
    pub content_type: Option<&'static str>,

    /// XML request body.
    pub body: String,
}

/// Request that creates a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Method to send, `MKCOL` or `MKCALENDAR`.
    pub verb: Verb,

    /// XML request body, if any.
    pub body: Option<String>,
}

/// Capabilities and query builders of a DAV dialect.
pub trait DavProtocol: fmt::Debug + Send + Sync {
    /// The protocol this dialect implements.
    fn protocol(&self) -> Protocol;

    /// Whether collections are found through principals and home sets.
    fn supports_principals(&self) -> bool;

    /// Whether collections carry a `getctag`.
    fn supports_ctags(&self) -> bool;

    /// Whether items are listed with REPORT instead of PROPFIND.
    fn use_report(&self) -> bool;

    /// Whether items can be fetched in bulk with a multiget report.
    fn use_multiget(&self) -> bool;

    /// Suffix of the well known discovery URL, e.g. `caldav`.
    fn well_known_suffix(&self) -> Option<&'static str> {
        None
    }

    /// Property of a principal that lists its home sets.
    fn principal_home_set(&self) -> Option<Prop> {
        None
    }

    /// Body of the depth 1 PROPFIND that lists collections.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    fn collections_query(&self) -> Result<String, DavError>;

    /// Whether a `DAV:response` describes a collection of this dialect.
    fn is_collection(&self, response: &Element) -> bool;

    /// Content types of a collection, read from its successful propstat.
    fn collection_content_types(&self, propstat: &Element) -> ContentTypes;

    /// Queries that list the items of a collection, optionally time bounded.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    fn items_queries(&self, range: Option<&TimeRange>) -> Result<Vec<ItemsQuery>, DavError>;

    /// Body of a multiget report for the given hrefs, `None` if the dialect
    /// has no multiget support.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    fn multiget_query(&self, hrefs: &[String]) -> Result<Option<String>, DavError> {
        let _ = hrefs;
        Ok(None)
    }

    /// Namespace of the data element in multiget replies.
    fn response_namespace(&self) -> &'static str {
        ns::DAV
    }

    /// Name of the data element in multiget replies.
    fn data_tag_name(&self) -> &'static str {
        ""
    }

    /// Content type of the payload carried in multiget replies.
    fn data_content_type(&self) -> Option<&'static str> {
        None
    }

    /// MIME type of contact items, if the dialect carries contacts.
    fn contacts_mime_type(&self) -> Option<&'static str> {
        None
    }

    /// Request that creates `collection` on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    fn create_request(&self, collection: &Collection) -> Result<CreateRequest, DavError>;
}

impl Protocol {
    /// Returns the dialect implementing this protocol.
    #[must_use]
    pub fn dialect(self) -> &'static dyn DavProtocol {
        match self {
            Self::CalDav => &CalDavProtocol,
            Self::CardDav => &CardDavProtocol,
            Self::GroupDav => &GroupDavProtocol,
        }
    }
}

/// Returns the `DAV:resourcetype` elements of all propstats of a response.
pub(crate) fn resource_types(response: &Element) -> impl Iterator<Item = &Element> {
    xml::children(response, ns::DAV, "propstat")
        .filter_map(|propstat| propstat.get_child("prop", ns::DAV))
        .filter_map(|prop| prop.get_child("resourcetype", ns::DAV))
}

/// Returns the `DAV:resourcetype` of a successful propstat.
pub(crate) fn propstat_resource_type(propstat: &Element) -> Option<&Element> {
    propstat
        .get_child("prop", ns::DAV)
        .and_then(|prop| prop.get_child("resourcetype", ns::DAV))
}
