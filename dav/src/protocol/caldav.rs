// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use minidom::Element;

use crate::error::DavError;
use crate::http::Verb;
use crate::protocol::{CreateRequest, DavProtocol, ItemsQuery, resource_types};
use crate::request::{BodyWriter, Prop, PropFindRequest};
use crate::types::{Collection, ContentTypes, Protocol, TimeRange};
use crate::xml::{self, ns};

/// Components listed by separate calendar queries.
const LISTED_COMPONENTS: [&str; 3] = ["VEVENT", "VTODO", "VJOURNAL"];

/// `CalDAV` dialect (RFC 4791).
#[derive(Debug, Clone, Copy, Default)]
pub struct CalDavProtocol;

impl DavProtocol for CalDavProtocol {
    fn protocol(&self) -> Protocol {
        Protocol::CalDav
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
        Some("caldav")
    }

    fn principal_home_set(&self) -> Option<Prop> {
        Some(Prop::CalendarHomeSet)
    }

    fn collections_query(&self) -> Result<String, DavError> {
        PropFindRequest::new()
            .prop(Prop::DisplayName)
            .prop(Prop::ResourceType)
            .prop(Prop::CalendarColor)
            .prop(Prop::SupportedCalendarComponentSet)
            .prop(Prop::CurrentUserPrivilegeSet)
            .prop(Prop::GetCTag)
            .build()
    }

    fn is_collection(&self, response: &Element) -> bool {
        resource_types(response).any(|rt| rt.has_child("calendar", ns::CALDAV))
    }

    fn collection_content_types(&self, propstat: &Element) -> ContentTypes {
        let comps: Vec<&Element> = propstat
            .get_child("prop", ns::DAV)
            .and_then(|prop| prop.get_child("supported-calendar-component-set", ns::CALDAV))
            .map(|set| xml::children(set, ns::CALDAV, "comp").collect())
            .unwrap_or_default();

        // Without the property the server accepts every component type.
        if comps.is_empty() {
            return ContentTypes::CALENDAR
                | ContentTypes::EVENTS
                | ContentTypes::TODOS
                | ContentTypes::FREE_BUSY
                | ContentTypes::JOURNAL;
        }

        comps
            .into_iter()
            .filter_map(|comp| comp.attr("name"))
            .fold(ContentTypes::empty(), |types, name| {
                types | component_content_type(name)
            })
    }

    fn items_queries(&self, range: Option<&TimeRange>) -> Result<Vec<ItemsQuery>, DavError> {
        LISTED_COMPONENTS
            .into_iter()
            .map(|component| {
                Ok(ItemsQuery {
                    content_type: Some(component),
                    body: calendar_query(component, range)?,
                })
            })
            .collect()
    }

    fn multiget_query(&self, hrefs: &[String]) -> Result<Option<String>, DavError> {
        if hrefs.is_empty() {
            return Ok(None);
        }

        let mut body = BodyWriter::new("C:calendar-multiget", &[ns::CALDAV])?;
        body.props(&[Prop::GetETag, Prop::CalendarData])?;
        for href in hrefs {
            body.text("D:href", href)?;
        }
        body.finish("C:calendar-multiget").map(Some)
    }

    fn response_namespace(&self) -> &'static str {
        ns::CALDAV
    }

    fn data_tag_name(&self) -> &'static str {
        "calendar-data"
    }

    fn data_content_type(&self) -> Option<&'static str> {
        Some("text/calendar")
    }

    fn create_request(&self, collection: &Collection) -> Result<CreateRequest, DavError> {
        let mut body = BodyWriter::new("C:mkcalendar", &[ns::CALDAV, ns::APPLE_ICAL])?;
        body.open("D:set")?;
        body.open("D:prop")?;

        body.text("D:displayname", &collection.display_name)?;
        if let Some(color) = collection.color {
            body.text("ICAL:calendar-color", &color.to_dav_hex())?;
        }

        body.open("C:supported-calendar-component-set")?;
        for (flag, name) in [
            (ContentTypes::EVENTS, "VEVENT"),
            (ContentTypes::TODOS, "VTODO"),
            (ContentTypes::FREE_BUSY, "VFREEBUSY"),
            (ContentTypes::JOURNAL, "VJOURNAL"),
        ] {
            if collection.content_types.contains(flag) {
                body.empty_with("C:comp", &[("name", name)])?;
            }
        }
        body.close("C:supported-calendar-component-set")?;

        body.close("D:prop")?;
        body.close("D:set")?;
        Ok(CreateRequest {
            verb: Verb::MkCalendar,
            body: Some(body.finish("C:mkcalendar")?),
        })
    }
}

fn component_content_type(name: &str) -> ContentTypes {
    match name.to_ascii_lowercase().as_str() {
        "vcalendar" => ContentTypes::CALENDAR,
        "vevent" => ContentTypes::EVENTS,
        "vtodo" => ContentTypes::TODOS,
        "vfreebusy" => ContentTypes::FREE_BUSY,
        "vjournal" => ContentTypes::JOURNAL,
        _ => ContentTypes::empty(),
    }
}

fn calendar_query(component: &str, range: Option<&TimeRange>) -> Result<String, DavError> {
    let mut body = BodyWriter::new("C:calendar-query", &[ns::CALDAV])?;
    body.props(&[Prop::GetETag, Prop::ResourceType])?;

    body.open("C:filter")?;
    body.open_with("C:comp-filter", &[("name", "VCALENDAR")])?;
    match range.filter(|r| !r.is_unbounded()) {
        Some(range) => {
            body.open_with("C:comp-filter", &[("name", component)])?;
            let start = range.caldav_start();
            let end = range.caldav_end();
            let mut attrs = Vec::new();
            if let Some(start) = &start {
                attrs.push(("start", start.as_str()));
            }
            if let Some(end) = &end {
                attrs.push(("end", end.as_str()));
            }
            body.empty_with("C:time-range", &attrs)?;
            body.close("C:comp-filter")?;
        }
        None => body.empty_with("C:comp-filter", &[("name", component)])?,
    }
    body.close("C:comp-filter")?;
    body.close("C:filter")?;

    body.finish("C:calendar-query")
}
