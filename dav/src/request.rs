// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request body builders shared by all DAV dialects.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{DavError, ErrorKind};
use crate::xml::ns;

/// Well known properties requested in PROPFIND and REPORT bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Collection tag.
    GetCTag,
    /// Calendar color.
    CalendarColor,
    /// Supported calendar components.
    SupportedCalendarComponentSet,
    /// Privileges of the current user.
    CurrentUserPrivilegeSet,
    /// Principal of the authenticated user.
    CurrentUserPrincipal,
    /// Principal of the resource.
    PrincipalUrl,
    /// Calendar home set of a principal.
    CalendarHomeSet,
    /// Address book home set of a principal.
    AddressbookHomeSet,
    /// Calendar data.
    CalendarData,
    /// Address data.
    AddressData,
}

impl Prop {
    /// Returns the local name of the property element.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::GetCTag => "getctag",
            Self::CalendarColor => "calendar-color",
            Self::SupportedCalendarComponentSet => "supported-calendar-component-set",
            Self::CurrentUserPrivilegeSet => "current-user-privilege-set",
            Self::CurrentUserPrincipal => "current-user-principal",
            Self::PrincipalUrl => "principal-URL",
            Self::CalendarHomeSet => "calendar-home-set",
            Self::AddressbookHomeSet => "addressbook-home-set",
            Self::CalendarData => "calendar-data",
            Self::AddressData => "address-data",
        }
    }

    /// Returns the namespace of the property element.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::DisplayName
            | Self::ResourceType
            | Self::GetETag
            | Self::CurrentUserPrivilegeSet
            | Self::CurrentUserPrincipal
            | Self::PrincipalUrl => ns::DAV,
            Self::GetCTag => ns::CALENDARSERVER,
            Self::CalendarColor => ns::APPLE_ICAL,
            Self::SupportedCalendarComponentSet | Self::CalendarHomeSet | Self::CalendarData => {
                ns::CALDAV
            }
            Self::AddressbookHomeSet | Self::AddressData => ns::CARDDAV,
        }
    }
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    #[must_use]
    pub fn prop(mut self, prop: Prop) -> Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, DavError> {
        let namespaces: Vec<&str> = self.props.iter().map(|p| p.namespace()).collect();
        let mut body = BodyWriter::new("D:propfind", &namespaces)?;
        body.props(&self.props)?;
        body.finish("D:propfind")
    }
}

/// A property addressed by namespace and name, for PROPPATCH.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    /// Namespace URI.
    pub namespace: String,

    /// Local name.
    pub name: String,
}

impl Property {
    /// Creates a property.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl From<Prop> for Property {
    fn from(prop: Prop) -> Self {
        Self::new(prop.namespace(), prop.name())
    }
}

/// PROPPATCH request builder: properties to set and to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyUpdate {
    set: Vec<(Property, String)>,
    remove: Vec<Property>,
}

impl PropertyUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property to a text value.
    #[must_use]
    pub fn set(mut self, property: impl Into<Property>, value: impl Into<String>) -> Self {
        self.set.push((property.into(), value.into()));
        self
    }

    /// Removes a property.
    #[must_use]
    pub fn remove(mut self, property: impl Into<Property>) -> Self {
        self.remove.push(property.into());
        self
    }

    /// Returns true if there is nothing to set or remove.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Builds the XML body for the PROPPATCH request.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::CollectionModifyNoProperties`] error if the
    /// update is empty, or an error if XML building fails.
    pub fn build(&self) -> Result<String, DavError> {
        if self.is_empty() {
            return Err(DavError::new(ErrorKind::CollectionModifyNoProperties));
        }

        let namespaces: Vec<&str> = self
            .set
            .iter()
            .map(|(p, _)| p.namespace.as_str())
            .chain(self.remove.iter().map(|p| p.namespace.as_str()))
            .collect();
        let mut body = BodyWriter::new("D:propertyupdate", &namespaces)?;

        if !self.set.is_empty() {
            body.open("D:set")?;
            body.open("D:prop")?;
            for (property, value) in &self.set {
                body.property(property, Some(value))?;
            }
            body.close("D:prop")?;
            body.close("D:set")?;
        }

        if !self.remove.is_empty() {
            body.open("D:remove")?;
            body.open("D:prop")?;
            for property in &self.remove {
                body.property(property, None)?;
            }
            body.close("D:prop")?;
            body.close("D:remove")?;
        }

        body.finish("D:propertyupdate")
    }
}

/// Thin wrapper around the XML writer used to assemble request bodies.
///
/// Known namespaces are declared once on the root with the prefixes from
/// [`ns::prefix`]; element names passed in are already prefixed.
pub(crate) struct BodyWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl BodyWriter {
    /// Starts a document with the given root element.
    pub(crate) fn new(root: &str, namespaces: &[&str]) -> Result<Self, DavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut start = BytesStart::new(root);
        start.push_attribute(("xmlns:D", ns::DAV));
        let mut declared = vec![ns::DAV];
        for &namespace in namespaces {
            if declared.contains(&namespace) {
                continue;
            }
            if let Some(prefix) = ns::prefix(namespace) {
                start.push_attribute((format!("xmlns:{prefix}").as_str(), namespace));
                declared.push(namespace);
            }
        }
        writer.write_event(Event::Start(start))?;
        Ok(Self { writer })
    }

    pub(crate) fn open(&mut self, name: &str) -> Result<(), DavError> {
        self.open_with(name, &[])
    }

    pub(crate) fn open_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DavError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    pub(crate) fn close(&mut self, name: &str) -> Result<(), DavError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, name: &str) -> Result<(), DavError> {
        self.empty_with(name, &[])
    }

    pub(crate) fn empty_with(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DavError> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    pub(crate) fn text(&mut self, name: &str, text: &str) -> Result<(), DavError> {
        self.open(name)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Writes `<D:prop>` with an empty element for each property.
    pub(crate) fn props(&mut self, props: &[Prop]) -> Result<(), DavError> {
        self.open("D:prop")?;
        for prop in props {
            self.property(&Property::from(*prop), None)?;
        }
        self.close("D:prop")
    }

    /// Writes a property element, with a text value if given.
    ///
    /// Properties outside the known namespaces declare their namespace as
    /// the default namespace of the element.
    fn property(&mut self, property: &Property, value: Option<&str>) -> Result<(), DavError> {
        let (name, attrs) = match ns::prefix(&property.namespace) {
            Some(prefix) => (format!("{prefix}:{}", property.name), Vec::new()),
            None => (
                property.name.clone(),
                vec![("xmlns", property.namespace.as_str())],
            ),
        };
        match value {
            Some(value) => {
                self.open_with(&name, &attrs)?;
                self.writer.write_event(Event::Text(BytesText::new(value)))?;
                self.close(&name)
            }
            None => self.empty_with(&name, &attrs),
        }
    }

    /// Closes the root element and returns the document.
    pub(crate) fn finish(mut self, root: &str) -> Result<String, DavError> {
        self.close(root)?;
        let bytes = self.writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| {
            DavError::new(ErrorKind::RequestProblem).with_detail(format!("UTF-8 error: {e}"))
        })
    }
}
