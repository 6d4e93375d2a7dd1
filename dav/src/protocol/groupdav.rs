// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use minidom::Element;

use crate::error::DavError;
use crate::http::Verb;
use crate::protocol::{
    CreateRequest, DavProtocol, ItemsQuery, propstat_resource_type, resource_types,
};
use crate::request::{Prop, PropFindRequest};
use crate::types::{Collection, ContentTypes, Protocol, TimeRange};
use crate::xml::ns;

/// `GroupDAV` collection resource types and what they hold.
const COLLECTION_TYPES: [(&str, ContentTypes); 3] = [
    ("vevent-collection", ContentTypes::EVENTS),
    ("vtodo-collection", ContentTypes::TODOS),
    ("vcard-collection", ContentTypes::CONTACTS),
];

/// `GroupDAV` dialect.
///
/// No principals, tags, reports or multiget: collections are plain folders
/// listed with PROPFIND.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupDavProtocol;

impl DavProtocol for GroupDavProtocol {
    fn protocol(&self) -> Protocol {
        Protocol::GroupDav
    }

    fn supports_principals(&self) -> bool {
        false
    }

    fn supports_ctags(&self) -> bool {
        false
    }

    fn use_report(&self) -> bool {
        false
    }

    fn use_multiget(&self) -> bool {
        false
    }

    fn collections_query(&self) -> Result<String, DavError> {
        PropFindRequest::new()
            .prop(Prop::DisplayName)
            .prop(Prop::ResourceType)
            .build()
    }

    fn is_collection(&self, response: &Element) -> bool {
        resource_types(response).any(|rt| {
            COLLECTION_TYPES
                .iter()
                .any(|(name, _)| rt.has_child(name, ns::GROUPDAV))
        })
    }

    fn collection_content_types(&self, propstat: &Element) -> ContentTypes {
        let Some(rt) = propstat_resource_type(propstat) else {
            return ContentTypes::empty();
        };
        COLLECTION_TYPES
            .iter()
            .filter(|(name, _)| rt.has_child(name, ns::GROUPDAV))
            .fold(ContentTypes::empty(), |types, (_, flag)| types | *flag)
    }

    fn items_queries(&self, _range: Option<&TimeRange>) -> Result<Vec<ItemsQuery>, DavError> {
        let body = PropFindRequest::new()
            .prop(Prop::ResourceType)
            .prop(Prop::GetETag)
            .build()?;
        Ok(vec![ItemsQuery {
            content_type: None,
            body,
        }])
    }

    fn contacts_mime_type(&self) -> Option<&'static str> {
        Some("text/x-vcard")
    }

    fn create_request(&self, _collection: &Collection) -> Result<CreateRequest, DavError> {
        Ok(CreateRequest {
            verb: Verb::MkCol,
            body: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    const RESPONSE: &[u8] = br#"<D:response xmlns:D="DAV:" xmlns:G="http://groupdav.org/">
        <D:href>/groupdav/Calendar/</D:href>
        <D:propstat>
          <D:prop>
            <D:resourcetype><D:collection/><G:vevent-collection/><G:vtodo-collection/></D:resourcetype>
          </D:prop>
          <D:status>HTTP/1.1 200 OK</D:status>
        </D:propstat>
      </D:response>"#;

    #[test]
    fn detects_groupdav_folders() {
        let response = xml::parse_document(RESPONSE).unwrap();
        assert!(GroupDavProtocol.is_collection(&response));

        let propstat = xml::ok_propstat(&response).unwrap();
        assert_eq!(
            GroupDavProtocol.collection_content_types(propstat),
            ContentTypes::EVENTS | ContentTypes::TODOS
        );
    }

    #[test]
    fn lists_items_with_one_unfiltered_propfind() {
        let queries = GroupDavProtocol.items_queries(None).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].content_type, None);
        assert!(queries[0].body.contains("<D:propfind"));
    }
}
