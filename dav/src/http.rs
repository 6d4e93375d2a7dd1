// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction, the reqwest transport and the request executor.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use url::Url;

use crate::cancel::CancelToken;
use crate::config::{AuthMethod, DavConfig};
use crate::error::{DavError, ErrorKind, TransportError, TransportErrorKind};
use crate::types::ETag;
use crate::xml::{display_url, resolve_href};

/// Number of redirects followed for a single request.
pub const MAX_REDIRECTS: usize = 4;

/// HTTP methods used by DAV jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PROPFIND`
    PropFind,
    /// `PROPPATCH`
    PropPatch,
    /// `REPORT`
    Report,
    /// `MKCOL`
    MkCol,
    /// `MKCALENDAR`
    MkCalendar,
}

impl Verb {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::PropFind => "PROPFIND",
            Self::PropPatch => "PROPPATCH",
            Self::Report => "REPORT",
            Self::MkCol => "MKCOL",
            Self::MkCalendar => "MKCALENDAR",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The resource itself.
    Zero,
    /// The resource and its direct members.
    One,
}

impl Depth {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// A request as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    /// Method.
    pub verb: Verb,

    /// Target, possibly with credentials in its userinfo.
    pub url: Url,

    /// Extra headers.
    pub headers: Vec<(HeaderName, String)>,

    /// Body, if any.
    pub body: Option<Vec<u8>>,
}

impl DavRequest {
    /// Creates a request without headers or body.
    #[must_use]
    pub const fn new(verb: Verb, url: Url) -> Self {
        Self {
            verb,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a PROPFIND request.
    #[must_use]
    pub fn propfind(url: Url, depth: Depth, body: String) -> Self {
        Self::new(Verb::PropFind, url)
            .depth(depth)
            .xml_body(body)
    }

    /// Creates a REPORT request.
    #[must_use]
    pub fn report(url: Url, depth: Depth, body: String) -> Self {
        Self::new(Verb::Report, url)
            .depth(depth)
            .xml_body(body)
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Sets the `Depth` header.
    #[must_use]
    pub fn depth(self, depth: Depth) -> Self {
        self.header(HeaderName::from_static("depth"), depth.as_str())
    }

    /// Sets an XML body.
    #[must_use]
    pub fn xml_body(self, body: String) -> Self {
        self.body(body.into_bytes(), "application/xml; charset=utf-8")
    }

    /// Sets a body with its content type.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = Some(body);
        self.header(header::CONTENT_TYPE, content_type)
    }

    /// Returns the value of a header set on this request.
    #[must_use]
    pub fn header_value(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A raw reply from a [`Transport`].
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Vec<u8>,
}

/// Sends single HTTP requests. Redirects must not be followed.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Sends `request` and returns the reply, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if no reply was received.
    async fn send(&self, request: &DavRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by [`reqwest`].
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    auth: AuthMethod,
}

impl HttpTransport {
    /// Creates a new HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &DavConfig) -> Result<Self, DavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|e| DavError::from_transport(e.into()))?;
        Ok(Self {
            client,
            auth: config.auth.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DavRequest) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(request.verb.as_str().as_bytes())
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;

        // reqwest moves URL credentials into a basic auth header by itself.
        let mut req = self.client.request(method, request.url.clone());
        if request.url.username().is_empty() {
            match &self.auth {
                AuthMethod::Basic { username, password } => {
                    req = req.basic_auth(username, Some(password));
                }
                AuthMethod::Bearer { token } => {
                    req = req.bearer_auth(token);
                }
                AuthMethod::None => {}
            }
        }

        for (name, value) in &request.headers {
            req = req.header(name, value);
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// A successful reply, with the URL it finally came from.
#[derive(Debug, Clone)]
pub struct DavResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Vec<u8>,

    /// URL after following redirects.
    pub url: Url,
}

impl DavResponse {
    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `ETag` header, if present.
    #[must_use]
    pub fn etag(&self) -> Option<ETag> {
        self.header(&header::ETAG).map(ETag::from)
    }

    /// Returns the media type without parameters, if present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(&header::CONTENT_TYPE)
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
    }

    /// Returns the `Location` header resolved against the final URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be resolved.
    pub fn location(&self) -> Result<Option<Url>, DavError> {
        self.header(&header::LOCATION)
            .map(|location| resolve_href(&self.url, location))
            .transpose()
    }
}

/// Runs requests through a [`Transport`]: follows redirects, classifies
/// failures and honours cancellation.
#[derive(Debug, Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    cancel: CancelToken,
}

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, cancel: CancelToken) -> Self {
        Self { transport, cancel }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns an executor on the same transport observing another token.
    #[must_use]
    pub fn with_cancel_token(&self, cancel: CancelToken) -> Self {
        Self::new(self.transport.clone(), cancel)
    }

    /// Sends a request, following up to [`MAX_REDIRECTS`] redirects.
    ///
    /// Credentials of the original URL are carried to each redirect target.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails, the job is cancelled, the
    /// server redirects too often or answers with a 4xx/5xx status.
    pub async fn execute(&self, mut request: DavRequest) -> Result<DavResponse, DavError> {
        let mut redirects = 0;
        loop {
            tracing::debug!(
                method = %request.verb,
                url = %display_url(&request.url),
                depth = request.header_value(&HeaderName::from_static("depth")),
                "sending request"
            );
            let resp = self.send(&request).await?;

            if is_redirect(resp.status) {
                if redirects == MAX_REDIRECTS {
                    return Err(DavError::new(ErrorKind::TooManyRedirects)
                        .with_status(resp.status)
                        .with_detail(display_url(&request.url)));
                }

                let location = resp
                    .headers
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        DavError::classify(None, resp.status, "redirect without location")
                    })?;
                let target = resolve_href(&request.url, location)?;
                redirects += 1;
                tracing::debug!(
                    from = %display_url(&request.url),
                    to = %display_url(&target),
                    status = resp.status,
                    "following redirect"
                );
                request.url = target;
                continue;
            }

            if resp.status >= 400 {
                let reason = StatusCode::from_u16(resp.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("HTTP error");
                return Err(DavError::classify(None, resp.status, reason));
            }

            return Ok(DavResponse {
                status: resp.status,
                headers: resp.headers,
                body: resp.body,
                url: request.url,
            });
        }
    }

    async fn send(&self, request: &DavRequest) -> Result<TransportResponse, DavError> {
        if self.cancel.is_cancelled() {
            return Err(DavError::cancelled());
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(DavError::cancelled()),
            resp = self.transport.send(request) => resp.map_err(DavError::from_transport),
        }
    }
}

const fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 307 | 308)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_propfind_requests() {
        let url = Url::parse("https://dav.example.com/").unwrap();
        let req = DavRequest::propfind(url, Depth::One, "<x/>".to_string());
        assert_eq!(req.verb, Verb::PropFind);
        assert_eq!(
            req.header_value(&HeaderName::from_static("depth")),
            Some("1")
        );
        assert_eq!(
            req.header_value(&header::CONTENT_TYPE),
            Some("application/xml; charset=utf-8")
        );
        assert_eq!(req.body.as_deref(), Some(b"<x/>".as_slice()));
    }

    #[test]
    fn response_content_type_without_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "text/calendar; charset=utf-8".parse().unwrap(),
        );
        headers.insert(header::LOCATION, "/cal/new/".parse().unwrap());
        let resp = DavResponse {
            status: 201,
            headers,
            body: Vec::new(),
            url: Url::parse("https://u:p@dav.example.com/cal/").unwrap(),
        };
        assert_eq!(resp.content_type(), Some("text/calendar"));
        assert_eq!(
            resp.location().unwrap().unwrap().as_str(),
            "https://u:p@dav.example.com/cal/new/"
        );
        assert_eq!(resp.etag(), None);
    }

    #[test]
    fn redirect_statuses() {
        for status in [301, 302, 307, 308] {
            assert!(is_redirect(status));
        }
        for status in [200, 207, 303, 304, 404] {
            assert!(!is_redirect(status));
        }
    }
}
