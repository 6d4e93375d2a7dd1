// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! DAV client for collection and item jobs.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::collection;
use crate::config::DavConfig;
use crate::discovery::{self, HomeSets};
use crate::error::DavError;
use crate::etag_cache::EtagCache;
use crate::http::{DavRequest, DavResponse, Executor, HttpTransport, Transport};
use crate::item::{self, ItemChanges, ListOptions};
use crate::request::PropertyUpdate;
use crate::types::{Collection, DavUrl, Item};

/// Client for `CalDAV`, `CardDAV` and `GroupDAV` servers.
///
/// Every method is one job: it may issue several requests, but it finishes
/// with exactly one result. Jobs started from clones of the same client share
/// the transport and the cancellation token.
///
/// # Example
///
/// ```ignore
/// use aimcal_dav::{AuthMethod, DavClient, DavConfig, DavUrl, Protocol};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DavConfig {
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let client = DavClient::new(config)?;
/// let root = DavUrl::parse("https://dav.example.com/", Protocol::CalDav)?;
/// let calendars = client.fetch_collections(&root).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DavClient {
    exec: Executor,
    config: DavConfig,
}

impl DavClient {
    /// Creates a client talking HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: DavConfig) -> Result<Self, DavError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            exec: Executor::new(Arc::new(transport), CancelToken::new()),
            config,
        })
    }

    /// Creates a client on top of a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: DavConfig) -> Self {
        Self {
            exec: Executor::new(transport, CancelToken::new()),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DavConfig {
        &self.config
    }

    /// Returns the token that cancels the jobs of this client.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        self.exec.cancel_token()
    }

    /// Returns a client on the same transport whose jobs observe `cancel`.
    #[must_use]
    pub fn with_cancel_token(&self, cancel: CancelToken) -> Self {
        Self {
            exec: self.exec.with_cancel_token(cancel),
            config: self.config.clone(),
        }
    }

    /// Sends a raw request through the redirect-following executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers 4xx/5xx.
    pub async fn execute(&self, request: DavRequest) -> Result<DavResponse, DavError> {
        self.exec.execute(request).await
    }

    /// Finds the principal URL behind a server root.
    ///
    /// # Errors
    ///
    /// Returns an error if the discovery request fails.
    pub async fn discover(&self, root: &DavUrl) -> Result<DavUrl, DavError> {
        discovery::discover(&self.exec, root).await
    }

    /// Reads the home sets of a principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or its reply cannot be parsed.
    pub async fn resolve_home_sets(&self, principal: &DavUrl) -> Result<HomeSets, DavError> {
        discovery::resolve_home_sets(&self.exec, principal).await
    }

    /// Fetches the properties of a single collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply holds no collection.
    pub async fn fetch_collection(&self, url: &DavUrl) -> Result<Collection, DavError> {
        collection::fetch_one(&self.exec, url).await
    }

    /// Fetches every collection reachable from `root`, following principals
    /// and home sets where the protocol has them.
    ///
    /// # Errors
    ///
    /// Returns the first error of any of the underlying requests.
    pub async fn fetch_collections(&self, root: &DavUrl) -> Result<Vec<Collection>, DavError> {
        collection::fetch_all(&self.exec, root).await
    }

    /// Fetches every collection reachable from any of `roots`, without
    /// duplicates.
    ///
    /// # Errors
    ///
    /// Returns the first error of any of the underlying requests.
    pub async fn fetch_collections_from(
        &self,
        roots: &[DavUrl],
    ) -> Result<Vec<Collection>, DavError> {
        collection::fetch_from(&self.exec, roots).await
    }

    /// Creates a collection and returns it as the server reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if creating, naming or re-reading the collection fails.
    pub async fn create_collection(&self, collection: &Collection) -> Result<Collection, DavError> {
        collection::create(&self.exec, collection).await
    }

    /// Applies a property update to a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is empty, the request fails, or the
    /// server rejects any of the properties.
    pub async fn modify_collection(
        &self,
        url: &DavUrl,
        update: &PropertyUpdate,
    ) -> Result<(), DavError> {
        collection::modify(&self.exec, url, update).await
    }

    /// Deletes a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_collection(&self, url: &DavUrl) -> Result<(), DavError> {
        collection::delete(&self.exec, url).await
    }

    /// Lists the items of a collection and diffs them against `cache`.
    ///
    /// # Errors
    ///
    /// Returns an error if no query of the protocol passes the filter, or if
    /// any listing request fails.
    pub async fn list_items(
        &self,
        collection: &DavUrl,
        cache: &dyn EtagCache,
        options: &ListOptions,
    ) -> Result<ItemChanges, DavError> {
        item::list(&self.exec, collection, cache, options).await
    }

    /// Fetches one item with its payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fetch_item(&self, url: &DavUrl) -> Result<Item, DavError> {
        item::fetch(&self.exec, url).await
    }

    /// Fetches several items of a collection in one multiget report, keyed
    /// by [`DavUrl::key`].
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol has no multiget, the request fails or
    /// its reply cannot be parsed.
    pub async fn fetch_items(
        &self,
        collection: &DavUrl,
        urls: &[DavUrl],
    ) -> Result<BTreeMap<String, Item>, DavError> {
        item::fetch_many(&self.exec, collection, urls).await
    }

    /// Uploads a new item. Fails rather than overwrite an existing resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub async fn create_item(&self, item: &Item) -> Result<Item, DavError> {
        item::create(&self.exec, item).await
    }

    /// Uploads a new version of an item, guarded by its `ETag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails. On a conflict the error carries
    /// the server's current version, see [`DavError::fresh_item`].
    pub async fn modify_item(&self, item: &Item) -> Result<Item, DavError> {
        item::modify(&self.exec, item).await
    }

    /// Deletes an item, guarded by its `ETag`. An already missing item counts
    /// as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. On a conflict the error carries
    /// the server's current version, see [`DavError::fresh_item`].
    pub async fn delete_item(&self, item: &Item) -> Result<(), DavError> {
        item::delete(&self.exec, item).await
    }
}
