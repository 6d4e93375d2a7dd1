// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Principal discovery and home set resolution.

use std::collections::HashSet;

use url::Url;

use crate::error::{DavError, ErrorKind};
use crate::http::{DavRequest, Depth, Executor};
use crate::request::{Prop, PropFindRequest};
use crate::types::DavUrl;
use crate::xml::{self, display_url, ns};

/// Rounds of home set lookups before giving up on chasing principals.
const HOME_SET_ROUNDS: usize = 2;

/// Home sets of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeSets {
    /// The principal the home sets were read from.
    pub principal: DavUrl,

    /// Collection containers of the principal, in server order.
    pub home_sets: Vec<DavUrl>,
}

/// Finds the principal URL behind a server root.
///
/// Protocols without principals return `root` unchanged. Otherwise
/// `/.well-known/<suffix>` is appended to the path of `root`, unless it
/// already holds a well known path, and that URL is asked for
/// `current-user-principal` and `principal-URL`; a 404 there is retried once
/// at `/`. When the server names no principal, the URL that answered is
/// returned.
pub(crate) async fn discover(exec: &Executor, root: &DavUrl) -> Result<DavUrl, DavError> {
    let dialect = root.protocol().dialect();
    if !dialect.supports_principals() {
        return Ok(root.clone());
    }

    let mut url = root.url().clone();
    let suffix = dialect
        .well_known_suffix()
        .filter(|_| !url.path().contains("/.well-known/"));
    if let Some(suffix) = suffix {
        let path = format!("{}/.well-known/{suffix}", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    let body = PropFindRequest::new()
        .prop(Prop::CurrentUserPrincipal)
        .prop(Prop::PrincipalUrl)
        .build()?;

    let mut retried = false;
    let resp = loop {
        let request = DavRequest::propfind(url.clone(), Depth::Zero, body.clone());
        match exec.execute(request).await {
            Ok(resp) => break resp,
            Err(err) if err.http_status() == 404 && url.path() != "/" && !retried => {
                tracing::debug!(
                    url = %display_url(&url),
                    "well known URL not found, retrying at root"
                );
                url.set_path("/");
                retried = true;
            }
            Err(err) => return Err(err),
        }
    };

    let principal = principal_href(&resp.body)
        .map(|href| xml::resolve_href(&resp.url, &href))
        .transpose()?
        .unwrap_or(resp.url);
    tracing::debug!(url = %display_url(&principal), "principal discovered");
    Ok(root.with_url(principal))
}

/// Reads the principal href from a discovery reply, preferring
/// `current-user-principal` over `principal-URL`.
fn principal_href(body: &[u8]) -> Option<String> {
    let root = xml::parse_document(body).ok()?;
    if !xml::is_multistatus(&root) {
        return None;
    }

    let props: Vec<_> = xml::children(&root, ns::DAV, "response")
        .filter_map(xml::ok_prop)
        .collect();
    ["current-user-principal", "principal-URL"]
        .into_iter()
        .find_map(|name| {
            props
                .iter()
                .filter_map(|prop| prop.get_child(name, ns::DAV))
                .find_map(xml::href)
        })
}

/// Resolves the home sets of a principal.
///
/// If a home set turns out to be another principal, its home sets are looked
/// up as well, for at most two rounds.
pub(crate) async fn resolve_home_sets(
    exec: &Executor,
    principal: &DavUrl,
) -> Result<HomeSets, DavError> {
    let dialect = principal.protocol().dialect();
    let Some(home_set_prop) = dialect.principal_home_set() else {
        return Ok(HomeSets {
            principal: principal.clone(),
            home_sets: Vec::new(),
        });
    };

    let body = PropFindRequest::new()
        .prop(home_set_prop)
        .prop(Prop::CurrentUserPrincipal)
        .build()?;

    let mut seen = HashSet::new();
    let mut current = principal.url().clone();
    for _ in 0..HOME_SET_ROUNDS {
        seen.insert(display_url(&current));
        let request = DavRequest::propfind(current.clone(), Depth::Zero, body.clone());
        let resp = exec.execute(request).await?;

        let root = xml::parse_document(&resp.body).map_err(|detail| {
            DavError::new(ErrorKind::CollectionFetchUnparsable).with_detail(detail)
        })?;
        let found = HomeSetReply::parse(&root, home_set_prop, &resp.url)?;

        if !found.home_sets.is_empty() {
            for home_set in &found.home_sets {
                tracing::debug!(url = %display_url(home_set), "home set found");
            }
            return Ok(HomeSets {
                principal: principal.with_url(resp.url),
                home_sets: found
                    .home_sets
                    .into_iter()
                    .map(|url| principal.with_url(url))
                    .collect(),
            });
        }

        // The URL was not a principal itself; follow the one it names.
        match found.principal {
            Some(next) if !seen.contains(&display_url(&next)) => current = next,
            _ => break,
        }
    }

    Ok(HomeSets {
        principal: principal.clone(),
        home_sets: Vec::new(),
    })
}

struct HomeSetReply {
    home_sets: Vec<Url>,
    principal: Option<Url>,
}

impl HomeSetReply {
    fn parse(root: &minidom::Element, prop: Prop, base: &Url) -> Result<Self, DavError> {
        let mut home_sets = Vec::new();
        let mut principal = None;
        for response in xml::children(root, ns::DAV, "response") {
            let Some(props) = xml::ok_prop(response) else {
                continue;
            };

            if let Some(set) = props.get_child(prop.name(), prop.namespace()) {
                for href in xml::children(set, ns::DAV, "href") {
                    let href = href.text();
                    if !href.trim().is_empty() {
                        home_sets.push(xml::resolve_href(base, &href)?);
                    }
                }
            }

            if principal.is_none() {
                principal = props
                    .get_child("current-user-principal", ns::DAV)
                    .and_then(xml::href)
                    .map(|href| xml::resolve_href(base, &href))
                    .transpose()?;
            }
        }
        Ok(Self {
            home_sets,
            principal,
        })
    }
}
