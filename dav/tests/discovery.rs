// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Principal and home set discovery tests with wiremock.

mod common;

use aimcal_dav::Protocol;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{dav_url, http_client, multistatus, response, xml_reply};

#[tokio::test]
async fn discover_prefers_current_user_principal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/.well-known/caldav"))
        .and(header("Depth", "0"))
        .respond_with(xml_reply(multistatus(&response(
            "/.well-known/caldav",
            "<D:principal-URL><D:href>/principals/other/</D:href></D:principal-URL>\
             <D:current-user-principal><D:href>/principals/alice/</D:href></D:current-user-principal>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/", Protocol::CalDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal.url().path(), "/principals/alice/");
    assert_eq!(principal.protocol(), Protocol::CalDav);
}

#[tokio::test]
async fn discover_falls_back_to_principal_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/.well-known/carddav"))
        .respond_with(xml_reply(multistatus(&response(
            "/dav/.well-known/carddav",
            "<D:principal-URL><D:href>/principals/bob/</D:href></D:principal-URL>",
        ))))
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/dav/", Protocol::CardDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal.url().path(), "/principals/bob/");
}

#[tokio::test]
async fn discover_keeps_existing_well_known_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/.well-known/caldav/"))
        .respond_with(xml_reply(multistatus(&response(
            "/.well-known/caldav/",
            "<D:current-user-principal><D:href>/principals/alice/</D:href></D:current-user-principal>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/.well-known/caldav/", Protocol::CalDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal.url().path(), "/principals/alice/");
}

#[tokio::test]
async fn discover_retries_at_root_after_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/.well-known/caldav"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .respond_with(xml_reply(multistatus(&response(
            "/",
            "<D:current-user-principal><D:href>/p/carol/</D:href></D:current-user-principal>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/", Protocol::CalDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal.url().path(), "/p/carol/");
}

#[tokio::test]
async fn discover_without_principal_returns_answering_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/.well-known/caldav"))
        .respond_with(xml_reply(multistatus(&response(
            "/.well-known/caldav",
            "<D:displayname>root</D:displayname>",
        ))))
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/", Protocol::CalDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal.url().path(), "/.well-known/caldav");
}

#[tokio::test]
async fn discover_groupdav_returns_root() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let root = dav_url(&mock_server, "/groupdav/", Protocol::GroupDav);
    let principal = client.discover(&root).await.expect("Failed to discover");

    assert_eq!(principal, root);
}

#[tokio::test]
async fn resolve_home_sets_lists_every_href() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/principals/alice/"))
        .respond_with(xml_reply(multistatus(&response(
            "/principals/alice/",
            "<C:calendar-home-set>\
               <D:href>/calendars/alice/</D:href>\
               <D:href>/shared/calendars/</D:href>\
             </C:calendar-home-set>",
        ))))
        .mount(&mock_server)
        .await;

    let client = http_client();
    let principal = dav_url(&mock_server, "/principals/alice/", Protocol::CalDav);
    let homes = client
        .resolve_home_sets(&principal)
        .await
        .expect("Failed to resolve home sets");

    let paths: Vec<_> = homes.home_sets.iter().map(|u| u.url().path()).collect();
    assert_eq!(paths, ["/calendars/alice/", "/shared/calendars/"]);
    assert_eq!(homes.principal.url().path(), "/principals/alice/");
}

#[tokio::test]
async fn resolve_home_sets_follows_named_principal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .respond_with(xml_reply(multistatus(&response(
            "/dav/",
            "<D:current-user-principal><D:href>/principals/dave/</D:href></D:current-user-principal>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/principals/dave/"))
        .respond_with(xml_reply(multistatus(&response(
            "/principals/dave/",
            "<CR:addressbook-home-set><D:href>/books/dave/</D:href></CR:addressbook-home-set>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let start = dav_url(&mock_server, "/dav/", Protocol::CardDav);
    let homes = client
        .resolve_home_sets(&start)
        .await
        .expect("Failed to resolve home sets");

    assert_eq!(homes.home_sets.len(), 1);
    assert_eq!(homes.home_sets[0].url().path(), "/books/dave/");
    assert_eq!(homes.principal.url().path(), "/principals/dave/");
}

#[tokio::test]
async fn resolve_home_sets_gives_up_without_home_set() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/principals/erin/"))
        .respond_with(xml_reply(multistatus(&response(
            "/principals/erin/",
            "<D:displayname>Erin</D:displayname>",
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let principal = dav_url(&mock_server, "/principals/erin/", Protocol::CalDav);
    let homes = client
        .resolve_home_sets(&principal)
        .await
        .expect("Failed to resolve home sets");

    assert!(homes.home_sets.is_empty());
    assert_eq!(homes.principal, principal);
}
