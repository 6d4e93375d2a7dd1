// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aimcal_dav::{
    DavClient, DavConfig, DavRequest, DavUrl, Protocol, Transport, TransportError,
    TransportResponse,
};
use async_trait::async_trait;
use wiremock::{MockServer, ResponseTemplate};

/// Transport replaying scripted replies and recording what was sent.
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    sent: Mutex<Vec<DavRequest>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `delay` before answering each request.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.push(Ok(TransportResponse {
            status,
            body: body.as_bytes().to_vec(),
            ..TransportResponse::default()
        }))
    }

    pub fn fail(self, err: TransportError) -> Self {
        self.push(Err(err))
    }

    pub fn sent(&self) -> Vec<DavRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn push(self, reply: Result<TransportResponse, TransportError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &DavRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(TransportResponse {
                    status: 404,
                    ..TransportResponse::default()
                })
            })
    }
}

/// Creates a client whose requests go to `transport`.
pub fn fake_client(transport: Arc<FakeTransport>) -> DavClient {
    DavClient::with_transport(transport, DavConfig::default())
}

/// Creates an HTTP client without authentication.
pub fn http_client() -> DavClient {
    DavClient::new(DavConfig::default()).expect("Failed to create client")
}

/// Returns a URL on the mock server.
pub fn dav_url(server: &MockServer, path: &str, protocol: Protocol) -> DavUrl {
    DavUrl::parse(&format!("{}{path}", server.uri()), protocol).expect("Invalid URL")
}

/// Wraps `responses` into a multistatus reply.
pub fn multistatus(responses: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CR="urn:ietf:params:xml:ns:carddav" xmlns:CS="http://calendarserver.org/ns/" xmlns:ICAL="http://apple.com/ns/ical/" xmlns:G="http://groupdav.org/">
{responses}
</D:multistatus>"#
    )
}

/// One `DAV:response` with a successful propstat holding `props`.
pub fn response(href: &str, props: &str) -> String {
    format!(
        r"<D:response>
  <D:href>{href}</D:href>
  <D:propstat>
    <D:prop>{props}</D:prop>
    <D:status>HTTP/1.1 200 OK</D:status>
  </D:propstat>
</D:response>"
    )
}

/// A calendar collection entry.
pub fn calendar(href: &str, name: &str, ctag: Option<&str>) -> String {
    let ctag = ctag
        .map(|ctag| format!("<CS:getctag>{ctag}</CS:getctag>"))
        .unwrap_or_default();
    response(
        href,
        &format!(
            "<D:displayname>{name}</D:displayname>\
             <D:resourcetype><D:collection/><C:calendar/></D:resourcetype>{ctag}"
        ),
    )
}

/// An item entry as returned by listings.
pub fn item(href: &str, etag: &str) -> String {
    response(href, &format!("<D:getetag>{etag}</D:getetag><D:resourcetype/>"))
}

/// A 207 reply carrying `body`.
pub fn xml_reply(body: String) -> ResponseTemplate {
    ResponseTemplate::new(207).set_body_raw(body, "application/xml; charset=utf-8")
}
