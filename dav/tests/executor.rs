// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Redirect, authentication, cancellation and failure tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use aimcal_dav::{
    AuthMethod, CancelToken, DavClient, DavConfig, DavRequest, DavUrl, ErrorKind, MAX_REDIRECTS,
    Protocol, TransportError, TransportErrorKind, Verb,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{FakeTransport, dav_url, fake_client, http_client};

/// Mounts `/hop/0` .. `/hop/{hops}` where every hop but the last redirects
/// to the next one.
async fn mount_hops(server: &MockServer, hops: usize) {
    for hop in 0..hops {
        Mock::given(method("GET"))
            .and(path(format!("/hop/{hop}")))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("/hop/{}", hop + 1)),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("/hop/{hops}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(server)
        .await;
}

fn get(url: &DavUrl) -> DavRequest {
    DavRequest::new(Verb::Get, url.url().clone())
}

#[tokio::test]
async fn follows_redirects_up_to_the_limit() {
    let mock_server = MockServer::start().await;
    mount_hops(&mock_server, MAX_REDIRECTS).await;

    let client = http_client();
    let start = dav_url(&mock_server, "/hop/0", Protocol::CalDav);
    let resp = client.execute(get(&start)).await.expect("Failed to follow");

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"done");
    assert_eq!(resp.url.path(), format!("/hop/{MAX_REDIRECTS}"));
}

#[tokio::test]
async fn follows_fewer_redirects() {
    let mock_server = MockServer::start().await;
    mount_hops(&mock_server, 3).await;

    let client = http_client();
    let start = dav_url(&mock_server, "/hop/0", Protocol::CalDav);
    let resp = client.execute(get(&start)).await.expect("Failed to follow");

    assert_eq!(resp.url.path(), "/hop/3");
}

#[tokio::test]
async fn too_many_redirects() {
    let mock_server = MockServer::start().await;
    mount_hops(&mock_server, MAX_REDIRECTS + 1).await;

    let client = http_client();
    let start = dav_url(&mock_server, "/hop/0", Protocol::CalDav);
    let err = client.execute(get(&start)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TooManyRedirects);
    assert_eq!(err.http_status(), 302);
}

#[tokio::test]
async fn redirects_keep_url_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old/a.ics"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new/a.ics"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/a.ics"))
        // alice:secret
        .and(header("Authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = http_client();
    let url = format!("http://alice:secret@{}/old/a.ics", mock_server.address());
    let start = DavUrl::parse(&url, Protocol::CalDav).unwrap();
    let resp = client.execute(get(&start)).await.expect("Failed to follow");

    assert_eq!(resp.url.username(), "alice");
    assert_eq!(resp.url.password(), Some("secret"));
}

#[tokio::test]
async fn configured_auth_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cal/a.ics"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = DavConfig {
        auth: AuthMethod::Bearer {
            token: "token-1".to_string(),
        },
        ..Default::default()
    };
    let client = DavClient::new(config).expect("Failed to create client");
    let url = dav_url(&mock_server, "/cal/a.ics", Protocol::CalDav);
    client.fetch_item(&url).await.expect("Failed to fetch item");
}

#[tokio::test]
async fn cancelled_client_sends_nothing() {
    let transport = Arc::new(FakeTransport::new().reply(200, "unused"));
    let client = fake_client(transport.clone());
    client.cancel_token().cancel();

    let url = DavUrl::parse("https://dav.example.com/cal/a.ics", Protocol::CalDav).unwrap();
    let err = client.fetch_item(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn cancel_interrupts_pending_request() {
    let transport = Arc::new(FakeTransport::with_delay(Duration::from_secs(30)));
    let client = fake_client(transport.clone());

    let token = client.cancel_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let url = DavUrl::parse("https://dav.example.com/", Protocol::CalDav).unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), client.fetch_collections(&url))
        .await
        .expect("Cancellation did not interrupt the request")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn cancel_token_is_per_client() {
    let transport = Arc::new(FakeTransport::new().reply(200, "a"));
    let client = fake_client(transport.clone());

    let cancelled = CancelToken::new();
    cancelled.cancel();
    let other = client.with_cancel_token(cancelled);

    let url = DavUrl::parse("https://dav.example.com/cal/a.ics", Protocol::CalDav).unwrap();
    let err = other.fetch_item(&url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let item = client.fetch_item(&url).await.expect("Failed to fetch item");
    assert_eq!(item.data, b"a");
}

#[tokio::test]
async fn transport_failure_is_retryable() {
    let transport = Arc::new(
        FakeTransport::new().fail(TransportError::new(
            TransportErrorKind::Timeout,
            "operation timed out",
        )),
    );
    let client = fake_client(transport);

    let url = DavUrl::parse("https://dav.example.com/cal/a.ics", Protocol::CalDav).unwrap();
    let err = client.fetch_item(&url).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ItemFetch);
    assert_eq!(err.http_status(), 0);
    assert_eq!(err.transport_error(), Some(TransportErrorKind::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn server_errors_are_classified() {
    let transport = Arc::new(
        FakeTransport::new()
            .reply(500, "")
            .reply(503, "")
            .reply(401, ""),
    );
    let client = fake_client(transport);
    let url = DavUrl::parse("https://dav.example.com/cal/", Protocol::CalDav).unwrap();

    let err = client.fetch_collection(&url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerUnrecoverable);
    assert!(!err.is_retryable());

    let err = client.fetch_collection(&url).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestProblem);
    assert!(err.is_retryable());

    let err = client.fetch_collection(&url).await.unwrap_err();
    assert_eq!(err.http_status(), 401);
    assert!(err.to_string().contains("Invalid username/password"));
}

#[tokio::test]
async fn requests_carry_depth_and_body() {
    let transport = Arc::new(FakeTransport::new());
    let client = fake_client(transport.clone());
    let url = DavUrl::parse("https://dav.example.com/cal/", Protocol::CalDav).unwrap();

    // The scripted transport answers 404 once it runs out of replies.
    let _ = client.fetch_collection(&url).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].verb, Verb::PropFind);
    let depth = reqwest::header::HeaderName::from_static("depth");
    assert_eq!(sent[0].header_value(&depth), Some("0"));
    let body = String::from_utf8(sent[0].body.clone().unwrap()).unwrap();
    assert!(body.contains("<D:propfind"));
    assert!(body.contains("<CS:getctag/>"));
}
