// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::types::Item;

/// What went wrong while running a DAV job.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic request failure, usually a non-success HTTP status.
    RequestProblem,

    /// The server redirected more often than allowed.
    TooManyRedirects,

    /// The job was cancelled before it completed.
    Cancelled,

    /// A URL or href could not be parsed or resolved.
    InvalidUrl,

    /// The protocol does not support multiget reports.
    NoMultigetSupport,

    /// The server failed in a way that retrying will not fix.
    ServerUnrecoverable,

    /// Deleting a collection failed.
    CollectionDelete,

    /// Fetching collections failed or the reply was not a multistatus.
    CollectionFetch,

    /// A collection reply could not be parsed.
    CollectionFetchUnparsable,

    /// Modifying a collection failed.
    CollectionModify,

    /// A collection modification had nothing to set or remove.
    CollectionModifyNoProperties,

    /// The server rejected at least one property of a modification.
    CollectionModifyResponse,

    /// Creating a collection failed.
    CollectionCreate,

    /// Creating an item failed.
    ItemCreate,

    /// Deleting an item failed.
    ItemDelete,

    /// Modifying an item failed.
    ItemModify,

    /// Fetching an item failed.
    ItemFetch,

    /// Listing the items of a collection failed.
    ItemList,

    /// The requested content types are not supported.
    Unsupported,

    /// The resource changed on the server since it was last read (HTTP 412).
    ConflictDetected,
}

/// Failure below HTTP, when no status code is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request timed out.
    Timeout,

    /// The connection could not be established.
    Connect,

    /// The request or response body could not be transferred.
    Body,

    /// Any other transport failure.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::Connect => "connection error",
            Self::Body => "body error",
            Self::Other => "transport error",
        })
    }
}

/// Error reported by a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Classification of the failure.
    pub kind: TransportErrorKind,

    /// Human readable message from the underlying client.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, e.to_string())
    }
}

/// State of a resource re-read after a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fresh {
    item: Option<Item>,
    status: u16,
}

/// Error of a DAV job.
///
/// A plain record of what failed: the [`ErrorKind`], the HTTP status (0 when
/// none), the transport failure if any, and a detail text. The user facing
/// message is derived from those by [`DavError::description`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.description())]
pub struct DavError {
    kind: ErrorKind,
    http_status: u16,
    transport: Option<TransportErrorKind>,
    detail: String,
    fresh: Option<Box<Fresh>>,
}

impl DavError {
    /// Creates an error of the given kind without status or detail.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            http_status: 0,
            transport: None,
            detail: String::new(),
            fresh: None,
        }
    }

    /// Classifies a failed request.
    ///
    /// HTTP 412 becomes [`ErrorKind::ConflictDetected`], server errors that
    /// retrying cannot fix become [`ErrorKind::ServerUnrecoverable`], and
    /// everything else a [`ErrorKind::RequestProblem`] that the calling job
    /// may narrow down with [`DavError::within`].
    #[must_use]
    pub fn classify(
        transport: Option<TransportErrorKind>,
        http_status: u16,
        detail: impl Into<String>,
    ) -> Self {
        let kind = match http_status {
            412 => ErrorKind::ConflictDetected,
            500..=599 if !is_retryable_status(http_status) => ErrorKind::ServerUnrecoverable,
            _ => ErrorKind::RequestProblem,
        };
        Self {
            kind,
            http_status,
            transport,
            detail: detail.into(),
            fresh: None,
        }
    }

    /// Creates an error from a transport failure.
    #[must_use]
    pub fn from_transport(err: TransportError) -> Self {
        Self::classify(Some(err.kind), 0, err.message)
    }

    /// Creates a cancellation error.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Attaches a detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attaches an HTTP status.
    #[must_use]
    pub fn with_status(mut self, http_status: u16) -> Self {
        self.http_status = http_status;
        self
    }

    /// Narrows a generic request failure to the kind of the job it occurred in.
    ///
    /// Errors that are already specific, e.g. conflicts or cancellations,
    /// keep their kind.
    #[must_use]
    pub fn within(mut self, kind: ErrorKind) -> Self {
        if matches!(self.kind, ErrorKind::RequestProblem) {
            self.kind = kind;
        }
        self
    }

    /// Reports a failed collection modification as a failure of the job
    /// that ran it, keeping status and detail.
    #[must_use]
    pub(crate) fn modify_within(mut self, kind: ErrorKind) -> Self {
        if matches!(
            self.kind,
            ErrorKind::RequestProblem
                | ErrorKind::CollectionModify
                | ErrorKind::CollectionModifyResponse
        ) {
            self.kind = kind;
        }
        self
    }

    /// Records the state of the resource as re-read after a conflict.
    #[must_use]
    pub(crate) fn with_fresh(mut self, item: Option<Item>, status: u16) -> Self {
        self.fresh = Some(Box::new(Fresh { item, status }));
        self
    }

    /// Returns the kind of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the HTTP status, 0 when the request never got a response.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Returns the transport failure, if any.
    #[must_use]
    pub const fn transport_error(&self) -> Option<TransportErrorKind> {
        self.transport
    }

    /// Returns the detail text.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the server's current version of the resource after a conflict,
    /// if it could be fetched.
    #[must_use]
    pub fn fresh_item(&self) -> Option<&Item> {
        self.fresh.as_ref().and_then(|f| f.item.as_ref())
    }

    /// Returns the HTTP status of the re-read after a conflict.
    #[must_use]
    pub fn fresh_status(&self) -> Option<u16> {
        self.fresh.as_ref().map(|f| f.status)
    }

    /// Returns true if the error was caused by a conflicting change (HTTP 412).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        self.http_status == 412
    }

    /// Returns true if the same request may succeed when retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self.http_status {
            0 => self.transport.is_some(),
            status => is_retryable_status(status),
        }
    }

    /// Returns the user facing message.
    #[must_use]
    pub fn description(&self) -> String {
        let status = self.http_status;
        let detail = &self.detail;
        match self.kind {
            ErrorKind::RequestProblem => match self.transport {
                Some(_) if status == 0 => {
                    format!("There was a problem with the request.\n{detail}.")
                }
                _ => format!(
                    "There was a problem with the request.\n{} ({status}).",
                    status_text(status)
                ),
            },
            ErrorKind::TooManyRedirects => {
                format!("There was a problem with the request. Too many redirects ({status}).")
            }
            ErrorKind::Cancelled => "The request was cancelled.".to_string(),
            ErrorKind::InvalidUrl => format!("Invalid URL: {detail}"),
            ErrorKind::NoMultigetSupport => {
                "Protocol for the collection does not support MULTIGET".to_string()
            }
            ErrorKind::ServerUnrecoverable => format!(
                "The server encountered an error that prevented it from completing your request: {detail} ({status})"
            ),
            ErrorKind::CollectionDelete => format!(
                "There was a problem with the request. The collection has not been deleted from the server.\n{detail} ({status})."
            ),
            ErrorKind::CollectionFetch => "Invalid responses from backend".to_string(),
            ErrorKind::CollectionFetchUnparsable => {
                format!("The collection response could not be parsed: {detail}")
            }
            ErrorKind::CollectionModify => format!(
                "There was a problem with the request. The collection has not been modified on the server.\n{detail} ({status})."
            ),
            ErrorKind::CollectionModifyNoProperties => {
                "No properties to change or remove".to_string()
            }
            ErrorKind::CollectionModifyResponse => {
                let mut text = "There was an error when modifying the properties".to_string();
                if !detail.is_empty() {
                    text.push_str("\nThe server returned more information:\n");
                    text.push_str(detail);
                }
                text
            }
            ErrorKind::CollectionCreate => {
                "There was an error when creating the collection".to_string()
            }
            ErrorKind::ItemCreate => format!(
                "There was a problem with the request. The item has not been created on the server.\n{detail} ({status})."
            ),
            ErrorKind::ItemDelete => format!(
                "There was a problem with the request. The item has not been deleted from the server.\n{detail} ({status})."
            ),
            ErrorKind::ItemModify => format!(
                "There was a problem with the request. The item was not modified on the server.\n{detail} ({status})."
            ),
            ErrorKind::ItemFetch => format!(
                "There was a problem with the request. The item could not be fetched from the server.\n{detail} ({status})."
            ),
            ErrorKind::ItemList => "There was a problem with the request.".to_string(),
            ErrorKind::Unsupported => {
                "There was a problem with the request. The requested mimetypes are not supported."
                    .to_string()
            }
            ErrorKind::ConflictDetected => format!(
                "The resource was changed on the server in the meantime.\n{detail} ({status})."
            ),
        }
    }
}

impl From<url::ParseError> for DavError {
    fn from(e: url::ParseError) -> Self {
        Self::new(ErrorKind::InvalidUrl).with_detail(e.to_string())
    }
}

impl From<quick_xml::Error> for DavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::new(ErrorKind::RequestProblem).with_detail(format!("XML error: {e}"))
    }
}

impl From<std::io::Error> for DavError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::RequestProblem).with_detail(format!("IO error: {e}"))
    }
}

const fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        401 | 402 | 407 | 408 | 423 | 429 | 501 | 502 | 503 | 504 | 507 | 511
    )
}

const fn status_text(status: u16) -> &'static str {
    match status {
        401 => "Invalid username/password",
        403 => "Access forbidden",
        404 => "Resource not found",
        _ => "HTTP error",
    }
}
