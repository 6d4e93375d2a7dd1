// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Collection jobs: fetch, fetch all with `CTag` repair, create, modify, delete.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use minidom::Element;

use crate::discovery::{discover, resolve_home_sets};
use crate::error::{DavError, ErrorKind};
use crate::http::{DavRequest, Depth, Executor, Verb};
use crate::request::{Prop, PropertyUpdate};
use crate::types::{CTag, Collection, Color, DavUrl, Privileges};
use crate::xml::{self, display_url, ns};

/// Fetches a single collection with a depth 0 PROPFIND.
pub(crate) async fn fetch_one(exec: &Executor, url: &DavUrl) -> Result<Collection, DavError> {
    let dialect = url.protocol().dialect();
    let body = dialect.collections_query()?;
    let request = DavRequest::propfind(url.url().clone(), Depth::Zero, body);
    let resp = exec.execute(request).await?;

    let base = url.with_url(resp.url);
    parse_collection(&resp.body, &base)
}

/// Fetches every collection reachable from `root`.
pub(crate) async fn fetch_all(exec: &Executor, root: &DavUrl) -> Result<Vec<Collection>, DavError> {
    fetch_from(exec, std::slice::from_ref(root)).await
}

/// Fetches every collection reachable from any of `roots`.
///
/// One listing is issued per home set, plus one repair fetch per collection
/// that came without a `CTag` on a protocol that has them. All of them run
/// concurrently; the first failure aborts the rest. Results are merged once
/// everything finished, de-duplicated by URL in issue order.
pub(crate) async fn fetch_from(
    exec: &Executor,
    roots: &[DavUrl],
) -> Result<Vec<Collection>, DavError> {
    let targets: Vec<DavUrl> = try_join_all(roots.iter().map(|root| listing_targets(exec, root)))
        .await?
        .into_iter()
        .flatten()
        .collect();

    let mut pending: FuturesUnordered<BoxFuture<'_, Result<Partial, DavError>>> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            list(exec, target)
                .map(move |r| r.map(|collections| Partial::Listed { index, collections }))
                .boxed()
        })
        .collect();

    let mut listed: Vec<Vec<Collection>> = vec![Vec::new(); targets.len()];
    while let Some(partial) = pending.next().await {
        match partial? {
            Partial::Listed { index, collections } => {
                for (slot, collection) in collections.iter().enumerate() {
                    let dialect = collection.protocol().dialect();
                    if dialect.supports_ctags() && collection.ctag.is_empty() {
                        tracing::debug!(
                            url = %collection.url,
                            "collection without CTag, fetching it individually"
                        );
                        let url = collection.url.clone();
                        pending.push(
                            async move {
                                let collection = fetch_one(exec, &url).await?;
                                Ok::<_, DavError>(Partial::Repaired {
                                    index,
                                    slot,
                                    collection,
                                })
                            }
                            .boxed(),
                        );
                    }
                }
                if let Some(entry) = listed.get_mut(index) {
                    *entry = collections;
                }
            }
            Partial::Repaired {
                index,
                slot,
                collection,
            } => {
                if collection.ctag.is_empty() {
                    tracing::warn!(url = %collection.url, "collection still has no CTag");
                }
                if let Some(entry) = listed.get_mut(index).and_then(|l| l.get_mut(slot)) {
                    *entry = collection;
                }
            }
        }
    }

    Ok(merge(listed))
}

/// Result of one sub-request of [`fetch_from`].
enum Partial {
    Listed {
        index: usize,
        collections: Vec<Collection>,
    },
    Repaired {
        index: usize,
        slot: usize,
        collection: Collection,
    },
}

/// Flattens partial results in issue order, keeping one collection per URL.
/// A duplicate with a `CTag` replaces one without.
fn merge(listed: Vec<Vec<Collection>>) -> Vec<Collection> {
    let mut merged: Vec<Collection> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for collection in listed.into_iter().flatten() {
        let key = collection.url.key();
        match positions.get(&key) {
            Some(&pos) => {
                if collection.ctag.is_empty() {
                    continue;
                }
                if let Some(existing) = merged.get_mut(pos).filter(|c| c.ctag.is_empty()) {
                    *existing = collection;
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(collection);
            }
        }
    }
    merged
}

/// Resolves the URLs to list collections at for one root.
async fn listing_targets(exec: &Executor, root: &DavUrl) -> Result<Vec<DavUrl>, DavError> {
    if !root.protocol().dialect().supports_principals() {
        return Ok(vec![root.clone()]);
    }

    let principal = discover(exec, root).await?;
    let homes = resolve_home_sets(exec, &principal).await?;
    tracing::debug!(
        principal = %homes.principal,
        count = homes.home_sets.len(),
        "home sets resolved"
    );
    if homes.home_sets.is_empty() {
        Ok(vec![homes.principal])
    } else {
        Ok(homes.home_sets)
    }
}

/// Lists the collections below `url` with a depth 1 PROPFIND.
async fn list(exec: &Executor, url: &DavUrl) -> Result<Vec<Collection>, DavError> {
    let dialect = url.protocol().dialect();
    let body = dialect.collections_query()?;
    let request = DavRequest::propfind(url.url().clone(), Depth::One, body);
    let resp = exec.execute(request).await?;
    parse_collections(&resp.body, &url.with_url(resp.url))
}

/// Parses the collections of a listing received from `base`, skipping
/// responses that are not collections of the protocol.
pub(crate) fn parse_collections(body: &[u8], base: &DavUrl) -> Result<Vec<Collection>, DavError> {
    let root = multistatus(body, base)?;
    let dialect = base.protocol().dialect();
    Ok(xml::children(&root, ns::DAV, "response")
        .filter(|response| dialect.is_collection(response))
        .filter_map(|response| extract_collection(response, base))
        .collect())
}

/// Parses the first valid response of a depth 0 reply received from `base`,
/// whatever its resource type.
pub(crate) fn parse_collection(body: &[u8], base: &DavUrl) -> Result<Collection, DavError> {
    let root = multistatus(body, base)?;
    xml::children(&root, ns::DAV, "response")
        .find_map(|response| extract_collection(response, base))
        .ok_or_else(|| DavError::new(ErrorKind::CollectionFetch).with_detail(base.key()))
}

fn multistatus(body: &[u8], base: &DavUrl) -> Result<Element, DavError> {
    let root = xml::parse_document(body).map_err(|detail| {
        DavError::new(ErrorKind::CollectionFetchUnparsable).with_detail(detail)
    })?;
    if !xml::is_multistatus(&root) {
        return Err(DavError::new(ErrorKind::CollectionFetch).with_detail(base.key()));
    }
    Ok(root)
}

/// Builds a collection from one `DAV:response`, skipping it with a warning
/// if it has no href or no successful propstat.
fn extract_collection(response: &Element, base: &DavUrl) -> Option<Collection> {
    let Some(mut href) = xml::href(response) else {
        tracing::warn!(url = %base, "skipping collection response without href");
        return None;
    };
    let Some(propstat) = xml::ok_propstat(response) else {
        tracing::warn!(href = %href, "skipping collection response without successful propstat");
        return None;
    };
    let Some(prop) = propstat.get_child("prop", ns::DAV) else {
        tracing::warn!(href = %href, "skipping collection response without properties");
        return None;
    };

    if !href.ends_with('/') {
        href.push('/');
    }
    let url = match xml::resolve_href(base.url(), &href) {
        Ok(url) => base.with_url(url),
        Err(err) => {
            tracing::warn!(href = %href, error = %err, "skipping collection with unresolvable href");
            return None;
        }
    };

    let dialect = base.protocol().dialect();
    let display_name = xml::child_text(prop, ns::DAV, "displayname").unwrap_or_default();
    let ctag = xml::child_text(prop, ns::CALENDARSERVER, "getctag")
        .map(CTag::from)
        .unwrap_or_default();
    let color = xml::child_text(prop, ns::APPLE_ICAL, "calendar-color")
        .filter(|text| !text.is_empty())
        .and_then(|text| {
            let color = Color::parse_dav(&text);
            if color.is_none() {
                tracing::warn!(url = %url, color = %text, "ignoring invalid collection color");
            }
            color
        });
    let privileges = prop
        .get_child("current-user-privilege-set", ns::DAV)
        .map_or(Privileges::ALL, parse_privileges);

    Some(Collection {
        url,
        ctag,
        display_name,
        color,
        content_types: dialect.collection_content_types(propstat),
        privileges,
    })
}

fn parse_privileges(set: &Element) -> Privileges {
    xml::children(set, ns::DAV, "privilege")
        .flat_map(Element::children)
        .fold(Privileges::empty(), |acc, el| acc | privilege_flags(el))
}

/// Flags of a privilege element; aggregates contribute their children too.
fn privilege_flags(el: &Element) -> Privileges {
    let own = if el.ns() == ns::DAV {
        Privileges::from_element_name(el.name())
    } else {
        Privileges::empty()
    };
    el.children().fold(own, |acc, child| acc | privilege_flags(child))
}

/// Steps of creating a collection.
#[derive(Debug)]
enum CreateState {
    Pending,
    Created(DavUrl),
    PropertiesSet(DavUrl),
    Refreshed(Collection),
}

/// Creates a collection, sets its display name and returns the state the
/// server reports afterwards.
pub(crate) async fn create(
    exec: &Executor,
    collection: &Collection,
) -> Result<Collection, DavError> {
    let mut state = CreateState::Pending;
    loop {
        state = match state {
            CreateState::Pending => {
                let url = send_create(exec, collection)
                    .await
                    .map_err(|e| e.within(ErrorKind::CollectionCreate))?;
                CreateState::Created(url)
            }
            CreateState::Created(url) => {
                if !collection.display_name.is_empty() {
                    let update =
                        PropertyUpdate::new().set(Prop::DisplayName, &collection.display_name);
                    modify(exec, &url, &update)
                        .await
                        .map_err(|e| e.modify_within(ErrorKind::CollectionCreate))?;
                }
                CreateState::PropertiesSet(url)
            }
            CreateState::PropertiesSet(url) => {
                let refreshed = fetch_one(exec, &url)
                    .await
                    .map_err(|e| e.within(ErrorKind::CollectionCreate))?;
                CreateState::Refreshed(refreshed)
            }
            CreateState::Refreshed(refreshed) => return Ok(refreshed),
        };
    }
}

/// Sends the dialect's creation request, returning where the collection landed.
async fn send_create(exec: &Executor, collection: &Collection) -> Result<DavUrl, DavError> {
    let create = collection.protocol().dialect().create_request(collection)?;
    let mut request = DavRequest::new(create.verb, collection.url.url().clone());
    if let Some(body) = create.body {
        request = request.xml_body(body);
    }

    let resp = exec.execute(request).await?;
    let mut url = match resp.location()? {
        Some(location) => location,
        None => resp.url,
    };
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    tracing::debug!(url = %display_url(&url), "collection created");
    Ok(collection.url.with_url(url))
}

/// Applies a property update to a collection.
pub(crate) async fn modify(
    exec: &Executor,
    url: &DavUrl,
    update: &PropertyUpdate,
) -> Result<(), DavError> {
    let body = update.build()?;
    let request = DavRequest::new(Verb::PropPatch, url.url().clone()).xml_body(body);
    let resp = exec
        .execute(request)
        .await
        .map_err(|e| e.within(ErrorKind::CollectionModify))?;
    check_propstats(&resp.body)
}

/// Fails if any propstat of a PROPPATCH reply has a non-2xx status.
fn check_propstats(body: &[u8]) -> Result<(), DavError> {
    // An empty body means the server accepted everything.
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    let root = xml::parse_document(body).map_err(|detail| {
        DavError::new(ErrorKind::CollectionModifyResponse).with_detail(detail)
    })?;
    for response in xml::children(&root, ns::DAV, "response") {
        for propstat in xml::children(response, ns::DAV, "propstat") {
            let status = xml::child_text(propstat, ns::DAV, "status")
                .and_then(|line| xml::status_code(&line));
            if !status.is_some_and(|code| (200..300).contains(&code)) {
                let detail = xml::child_text(propstat, ns::DAV, "responsedescription")
                    .or_else(|| xml::child_text(response, ns::DAV, "responsedescription"))
                    .unwrap_or_default();
                return Err(DavError::new(ErrorKind::CollectionModifyResponse)
                    .with_status(status.unwrap_or(0))
                    .with_detail(detail));
            }
        }
    }
    Ok(())
}

/// Deletes a collection.
pub(crate) async fn delete(exec: &Executor, url: &DavUrl) -> Result<(), DavError> {
    let request = DavRequest::new(Verb::Delete, url.url().clone());
    exec.execute(request)
        .await
        .map_err(|e| e.within(ErrorKind::CollectionDelete))?;
    Ok(())
}
