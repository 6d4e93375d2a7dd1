// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! DAV client for discovering, listing and synchronizing `CalDAV` calendars,
//! `CardDAV` address books and `GroupDAV` collections.
//!
//! The entry point is [`DavClient`]. Every operation is a job that talks to the
//! server through a [`Transport`], follows redirects, and reports exactly one
//! [`DavError`] on failure.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::option_option,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod cancel;
mod client;
mod collection;
mod config;
mod discovery;
mod error;
mod etag_cache;
mod http;
mod item;
pub mod protocol;
mod request;
mod types;
pub mod xml;

pub use crate::cancel::CancelToken;
pub use crate::client::DavClient;
pub use crate::config::{AuthMethod, DavConfig};
pub use crate::discovery::HomeSets;
pub use crate::error::{DavError, ErrorKind, TransportError, TransportErrorKind};
pub use crate::etag_cache::{EtagCache, MemoryEtagCache};
pub use crate::http::{
    DavRequest, DavResponse, Depth, Executor, HttpTransport, MAX_REDIRECTS, Transport,
    TransportResponse, Verb,
};
pub use crate::item::{ItemChanges, ListOptions};
pub use crate::protocol::{DavProtocol, ItemsQuery};
pub use crate::request::{Prop, PropFindRequest, Property, PropertyUpdate};
pub use crate::types::{
    CTag, Collection, Color, ContentTypes, DavUrl, ETag, Item, Privileges, Protocol, TimeRange,
};
