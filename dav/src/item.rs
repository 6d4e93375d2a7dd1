// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Item jobs: differential listing, fetch, multiget, create, modify, delete.

use std::collections::{BTreeMap, HashSet};

use futures::future::try_join_all;
use reqwest::header::{IF_MATCH, IF_NONE_MATCH};

use crate::error::{DavError, ErrorKind};
use crate::etag_cache::EtagCache;
use crate::http::{DavRequest, DavResponse, Depth, Executor, Verb};
use crate::protocol::ItemsQuery;
use crate::types::{DavUrl, ETag, Item, TimeRange};
use crate::xml::{self, display_url, ns};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Options of an item listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only run the queries for these content types. Empty means all.
    pub content_types: Vec<String>,

    /// Only list items overlapping this range, where the protocol supports it.
    pub time_range: Option<TimeRange>,
}

impl ListOptions {
    /// Creates options listing everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the listing to a content type. May be called repeatedly.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_types.push(content_type.into());
        self
    }

    /// Restricts the listing to a time range.
    #[must_use]
    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    fn accepts(&self, query: &ItemsQuery) -> bool {
        match query.content_type {
            Some(ct) => {
                self.content_types.is_empty() || self.content_types.iter().any(|t| t == ct)
            }
            None => true,
        }
    }
}

/// Result of listing a collection against an [`EtagCache`].
///
/// Every item in `changed` is also in `items`; no URL in `deleted` is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    /// Every item currently in the collection, without payload.
    pub items: Vec<Item>,

    /// Items that are new or whose tag differs from the cache.
    pub changed: Vec<Item>,

    /// Keys of cached items no longer on the server, sorted.
    pub deleted: Vec<String>,
}

/// Lists a collection and diffs it against `cache`.
///
/// One request is issued per query of the protocol that passes the content
/// type filter; they run concurrently and the first failure aborts the rest.
pub(crate) async fn list(
    exec: &Executor,
    collection: &DavUrl,
    cache: &dyn EtagCache,
    options: &ListOptions,
) -> Result<ItemChanges, DavError> {
    let dialect = collection.protocol().dialect();
    let queries: Vec<ItemsQuery> = dialect
        .items_queries(options.time_range.as_ref())?
        .into_iter()
        .filter(|query| options.accepts(query))
        .collect();
    if queries.is_empty() {
        return Err(DavError::new(ErrorKind::Unsupported)
            .with_detail(options.content_types.join(", ")));
    }

    let partials = try_join_all(
        queries
            .into_iter()
            .map(|query| list_query(exec, collection, query)),
    )
    .await
    .map_err(|e| e.within(ErrorKind::ItemList))?;

    let mut seen = HashSet::new();
    let mut changes = ItemChanges::default();
    for item in partials.into_iter().flatten() {
        let key = item.url.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        if cache.etag_changed(&key, &item.etag) {
            changes.changed.push(item.clone());
        }
        changes.items.push(item);
    }

    changes.deleted = cache
        .urls()
        .into_iter()
        .filter(|url| !seen.contains(url))
        .collect();
    changes.deleted.sort();

    tracing::debug!(
        url = %collection,
        items = changes.items.len(),
        changed = changes.changed.len(),
        deleted = changes.deleted.len(),
        "items listed"
    );
    Ok(changes)
}

/// Runs one listing query and returns its items in reply order.
async fn list_query(
    exec: &Executor,
    collection: &DavUrl,
    query: ItemsQuery,
) -> Result<Vec<Item>, DavError> {
    let url = collection.url().clone();
    let request = if collection.protocol().dialect().use_report() {
        DavRequest::report(url, Depth::One, query.body)
    } else {
        DavRequest::propfind(url, Depth::One, query.body)
    };
    let resp = exec.execute(request).await?;

    let root = xml::parse_document(&resp.body)
        .map_err(|detail| DavError::new(ErrorKind::ItemList).with_detail(detail))?;
    let content_type = query.content_type.unwrap_or_default();

    let mut items = Vec::new();
    for response in xml::children(&root, ns::DAV, "response") {
        let Some(href) = xml::href(response) else {
            tracing::warn!(url = %collection, "skipping item response without href");
            continue;
        };
        let Some(prop) = xml::ok_prop(response) else {
            continue;
        };

        // Listings never recurse into sub-collections.
        let is_collection = prop
            .get_child("resourcetype", ns::DAV)
            .is_some_and(|rt| rt.has_child("collection", ns::DAV));
        if is_collection {
            continue;
        }

        let url = xml::resolve_href(&resp.url, &href)?;
        let etag = xml::child_text(prop, ns::DAV, "getetag")
            .map(ETag::from)
            .unwrap_or_default();
        items.push(Item::stub(collection.with_url(url), content_type, etag));
    }
    Ok(items)
}

/// Fetches one item with GET.
pub(crate) async fn fetch(exec: &Executor, url: &DavUrl) -> Result<Item, DavError> {
    let resp = exec
        .execute(DavRequest::new(Verb::Get, url.url().clone()))
        .await
        .map_err(|e| e.within(ErrorKind::ItemFetch))?;
    let content_type = resp.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
    let etag = resp.etag().unwrap_or_default();
    Ok(Item::new(url.with_url(resp.url), content_type, resp.body, etag))
}

/// Fetches several items of a collection with one multiget report.
///
/// Items are keyed by [`DavUrl::key`].
pub(crate) async fn fetch_many(
    exec: &Executor,
    collection: &DavUrl,
    urls: &[DavUrl],
) -> Result<BTreeMap<String, Item>, DavError> {
    let dialect = collection.protocol().dialect();
    if !dialect.use_multiget() {
        return Err(DavError::new(ErrorKind::NoMultigetSupport));
    }

    let hrefs: Vec<String> = urls.iter().map(|url| url.url().path().to_string()).collect();
    let Some(body) = dialect.multiget_query(&hrefs)? else {
        return Ok(BTreeMap::new());
    };

    let request = DavRequest::report(collection.url().clone(), Depth::One, body);
    let resp = exec
        .execute(request)
        .await
        .map_err(|e| e.within(ErrorKind::ItemFetch))?;
    let root = xml::parse_document(&resp.body)
        .map_err(|detail| DavError::new(ErrorKind::ItemFetch).with_detail(detail))?;

    let content_type = dialect.data_content_type().unwrap_or(DEFAULT_CONTENT_TYPE);
    let mut items = BTreeMap::new();
    for response in xml::children(&root, ns::DAV, "response") {
        let (Some(href), Some(prop)) = (xml::href(response), xml::ok_prop(response)) else {
            continue;
        };
        let url = collection.with_url(xml::resolve_href(&resp.url, &href)?);
        let data = prop
            .get_child(dialect.data_tag_name(), dialect.response_namespace())
            .map(|el| el.text().into_bytes())
            .unwrap_or_default();
        let etag = xml::child_text(prop, ns::DAV, "getetag")
            .map(ETag::from)
            .unwrap_or_default();
        items
            .entry(url.key())
            .or_insert_with(|| Item::new(url, content_type, data, etag));
    }
    Ok(items)
}

/// Steps of writing an item.
#[derive(Debug)]
enum WriteState {
    Pending,
    Written(Item),
    Refreshed(Item),
}

/// Creates an item without overwriting an existing one, then reads back its
/// tag. A failing read back is ignored.
pub(crate) async fn create(exec: &Executor, item: &Item) -> Result<Item, DavError> {
    let mut state = WriteState::Pending;
    loop {
        state = match state {
            WriteState::Pending => {
                let request = put_request(item).header(IF_NONE_MATCH, "*");
                let resp = exec
                    .execute(request)
                    .await
                    .map_err(|e| e.within(ErrorKind::ItemCreate))?;
                WriteState::Written(stored_item(item, resp)?)
            }
            WriteState::Written(written) => WriteState::Refreshed(refresh(exec, written).await),
            WriteState::Refreshed(item) => return Ok(item),
        };
    }
}

/// Overwrites an item if its tag still matches, then reads back its new tag.
///
/// On a conflict the error carries the server's current version, see
/// [`DavError::fresh_item`].
pub(crate) async fn modify(exec: &Executor, item: &Item) -> Result<Item, DavError> {
    let mut state = WriteState::Pending;
    loop {
        state = match state {
            WriteState::Pending => {
                let request = if_match(put_request(item), &item.etag);
                match exec.execute(request).await {
                    Ok(resp) => WriteState::Written(stored_item(item, resp)?),
                    Err(err) if err.is_conflict() => {
                        return Err(with_fresh_state(exec, &item.url, err)
                            .await
                            .within(ErrorKind::ItemModify));
                    }
                    Err(err) => return Err(err.within(ErrorKind::ItemModify)),
                }
            }
            WriteState::Written(written) => WriteState::Refreshed(refresh(exec, written).await),
            WriteState::Refreshed(item) => return Ok(item),
        };
    }
}

/// Deletes an item if its tag still matches. Items that are already gone
/// count as deleted.
///
/// On a conflict the error carries the server's current version, see
/// [`DavError::fresh_item`].
pub(crate) async fn delete(exec: &Executor, item: &Item) -> Result<(), DavError> {
    let request = DavRequest::new(Verb::Delete, item.url.url().clone());
    let request = if_match(request, &item.etag);
    match exec.execute(request).await {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.http_status(), 404 | 410) => {
            tracing::debug!(url = %item.url, status = err.http_status(), "item already gone");
            Ok(())
        }
        Err(err) if err.is_conflict() => Err(with_fresh_state(exec, &item.url, err)
            .await
            .within(ErrorKind::ItemDelete)),
        Err(err) => Err(err.within(ErrorKind::ItemDelete)),
    }
}

fn put_request(item: &Item) -> DavRequest {
    let content_type = if item.content_type.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        &item.content_type
    };
    DavRequest::new(Verb::Put, item.url.url().clone()).body(item.data.clone(), content_type)
}

fn if_match(request: DavRequest, etag: &ETag) -> DavRequest {
    if etag.is_empty() {
        request
    } else {
        request.header(IF_MATCH, etag.as_str())
    }
}

/// The item as stored after a successful PUT.
fn stored_item(item: &Item, resp: DavResponse) -> Result<Item, DavError> {
    let url = match resp.location()? {
        Some(location) => location,
        None => resp.url.clone(),
    };
    let mut stored = item.clone();
    stored.url = item.url.with_url(url);
    if let Some(etag) = resp.etag() {
        stored.etag = etag;
    }
    Ok(stored)
}

/// Reads back the tag of a written item, keeping the item as is on failure.
async fn refresh(exec: &Executor, mut item: Item) -> Item {
    match fetch(exec, &item.url).await {
        Ok(fetched) => {
            item.etag = fetched.etag;
            item.url = fetched.url;
        }
        Err(err) => {
            tracing::warn!(
                url = %display_url(item.url.url()),
                error = %err,
                "could not read back written item"
            );
        }
    }
    item
}

/// Attaches the current server state of `url` to a conflict error.
async fn with_fresh_state(exec: &Executor, url: &DavUrl, err: DavError) -> DavError {
    match fetch(exec, url).await {
        Ok(fresh) => err.with_fresh(Some(fresh), 200),
        Err(fetch_err) => err.with_fresh(None, fetch_err.http_status()),
    }
}
