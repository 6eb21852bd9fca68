mod common;

use axum::http::{StatusCode, header};
use common::{Client, TestApp};

#[tokio::test]
async fn state_changing_request_without_token_is_forbidden() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;

    let page = client.post_form(&app, "/logout", &[]).await;

    assert_eq!(page.status, StatusCode::FORBIDDEN);
    assert!(page.body.contains("Error!"));

    let page = client.get(&app, "/").await;
    assert!(
        page.body.contains("action=\"/logout\""),
        "logout handler must not have run"
    );
}

#[tokio::test]
async fn token_from_another_session_is_rejected() {
    let app = TestApp::new();
    let other = app.visit("/login").await;
    let foreign = other.token.clone().expect("token");
    let mut client = app.visit("/login").await;

    let page = client
        .post_form(
            &app,
            "/login",
            &[("email", "x@example.com"), ("password", "nope!"), ("_csrf", &foreign)],
        )
        .await;

    assert_eq!(page.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn header_token_is_accepted() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/").await;
    let token = client.token.clone().expect("token");

    let request = client
        .request("POST", "/logout")
        .header("x-csrf-token", token)
        .body(axum::body::Body::empty())
        .expect("request");
    let page = client.send(&app, request).await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/"));
}

#[tokio::test]
async fn query_token_is_accepted() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/").await;
    let token = client.token.clone().expect("token");

    let request = client
        .request("POST", &format!("/logout?_csrf={token}"))
        .header(header::CONTENT_LENGTH, "0")
        .body(axum::body::Body::empty())
        .expect("request");
    let page = client.send(&app, request).await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn every_rendered_token_is_valid_for_the_session() {
    let app = TestApp::new();
    let mut client = Client::default();
    client.get(&app, "/login").await;
    let first = client.token.clone().expect("token");
    client.get(&app, "/signup").await;
    let second = client.token.clone().expect("token");
    assert_ne!(first, second);

    for token in [first, second] {
        let page = client
            .post_form(
                &app,
                "/login",
                &[("email", "nobody@example.com"), ("password", "x"), ("_csrf", &token)],
            )
            .await;
        assert_eq!(page.status, StatusCode::SEE_OTHER);
        assert_eq!(page.location.as_deref(), Some("/login"));
    }
}
