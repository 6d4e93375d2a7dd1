// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use minidom::Element;

use crate::error::DavError;
use crate::http::Verb;
use crate::protocol::{CreateRequest, DavProtocol, ItemsQuery, resource_types};
use crate::request::{BodyWriter, Prop, PropFindRequest};
use crate::types::{Collection, ContentTypes, Protocol, TimeRange};
use crate::xml::ns;

const VCARD_MIME_TYPE: &str = "text/vcard";

/// `CardDAV` dialect (RFC 6352).
#[derive(Debug, Clone, Copy, Default)]
pub struct CardDavProtocol;

impl DavProtocol for CardDavProtocol {
    fn protocol(&self) -> Protocol {
        Protocol::CardDav
    }

    fn supports_principals(&self) -> bool {
        true
    }

    fn supports_ctags(&self) -> bool {
        true
    }

    fn use_report(&self) -> bool {
        true
    }

    fn use_multiget(&self) -> bool {
        true
    }

    fn well_known_suffix(&self) -> Option<&'static str> {
        Some("carddav")
    }

    fn principal_home_set(&self) -> Option<Prop> {
        Some(Prop::AddressbookHomeSet)
    }

    fn collections_query(&self) -> Result<String, DavError> {
        PropFindRequest::new()
            .prop(Prop::DisplayName)
            .prop(Prop::ResourceType)
            .prop(Prop::CurrentUserPrivilegeSet)
            .prop(Prop::GetCTag)
            .build()
    }

    fn is_collection(&self, response: &Element) -> bool {
        resource_types(response).any(|rt| rt.has_child("addressbook", ns::CARDDAV))
    }

    fn collection_content_types(&self, _propstat: &Element) -> ContentTypes {
        ContentTypes::CONTACTS
    }

    // Contacts have no time bounds, the range is ignored.
    fn items_queries(&self, _range: Option<&TimeRange>) -> Result<Vec<ItemsQuery>, DavError> {
        let mut body = BodyWriter::new("CR:addressbook-query", &[ns::CARDDAV])?;
        body.props(&[Prop::GetETag, Prop::ResourceType])?;
        Ok(vec![ItemsQuery {
            content_type: Some(VCARD_MIME_TYPE),
            body: body.finish("CR:addressbook-query")?,
        }])
    }

    fn multiget_query(&self, hrefs: &[String]) -> Result<Option<String>, DavError> {
        if hrefs.is_empty() {
            return Ok(None);
        }

        let mut body = BodyWriter::new("CR:addressbook-multiget", &[ns::CARDDAV])?;
        body.props(&[Prop::GetETag, Prop::AddressData])?;
        for href in hrefs {
            body.text("D:href", href)?;
        }
        body.finish("CR:addressbook-multiget").map(Some)
    }

    fn response_namespace(&self) -> &'static str {
        ns::CARDDAV
    }

    fn data_tag_name(&self) -> &'static str {
        "address-data"
    }

    fn contacts_mime_type(&self) -> Option<&'static str> {
        Some(VCARD_MIME_TYPE)
    }

    fn data_content_type(&self) -> Option<&'static str> {
        Some(VCARD_MIME_TYPE)
    }

    fn create_request(&self, collection: &Collection) -> Result<CreateRequest, DavError> {
        let mut body = BodyWriter::new("D:mkcol", &[ns::CARDDAV])?;
        body.open("D:set")?;
        body.open("D:prop")?;
        body.open("D:resourcetype")?;
        body.empty("D:collection")?;
        body.empty("CR:addressbook")?;
        body.close("D:resourcetype")?;
        body.text("D:displayname", &collection.display_name)?;
        body.close("D:prop")?;
        body.close("D:set")?;
        Ok(CreateRequest {
            verb: Verb::MkCol,
            body: Some(body.finish("D:mkcol")?),
        })
    }
}
