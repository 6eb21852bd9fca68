mod common;

use axum::http::StatusCode;
use common::{BODY_LIMIT, Multipart, TestApp, stored_files};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

fn product_form(token: &str) -> Multipart {
    Multipart::new()
        .text("title", "Running Shoe")
        .text("price", "59.99")
        .text("description", "Light and fast.")
        .text("_csrf", token)
}

#[tokio::test]
async fn accepted_image_is_stored_with_timestamp_prefix() {
    let app = TestApp::new();
    let (mut client, user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token).file("image", "shoe.png", "image/png", PNG_BYTES),
        )
        .await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/admin/products"));

    let files = stored_files(&app.images_dir);
    assert_eq!(files.len(), 1);
    let name = &files[0];
    let (timestamp, original) = name.split_at(name.len() - "-shoe.png".len());
    assert_eq!(original, "-shoe.png");
    assert_eq!(timestamp.len(), "2024-05-01T10:20:30.123Z".len());
    assert!(timestamp.ends_with('Z'));
    assert_eq!(&timestamp[10..11], "T");
    assert_eq!(
        std::fs::read(app.images_dir.join(name)).expect("stored bytes"),
        PNG_BYTES
    );

    let products = app.products.all().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].title, "Running Shoe");
    assert_eq!(products[0].price, 59.99);
    assert_eq!(products[0].user_id, user.id);
    assert_eq!(products[0].image_url, format!("/images/{name}"));

    let listing = client.get(&app, "/admin/products").await;
    assert!(listing.body.contains("Running Shoe"));
    assert!(listing.body.contains("$59.99"));
}

#[tokio::test]
async fn unaccepted_media_type_is_dropped_silently() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token).file("image", "cat.gif", "image/gif", b"GIF89a"),
        )
        .await;

    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(page.body.contains("Attached file is not an image."));
    assert!(page.body.contains("value=\"Running Shoe\""));
    assert!(stored_files(&app.images_dir).is_empty());
    assert!(app.products.all().await.is_empty());
}

#[tokio::test]
async fn empty_file_input_counts_as_no_image() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token).file("image", "", "application/octet-stream", b""),
        )
        .await;

    assert_eq!(page.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(page.body.contains("Attached file is not an image."));
}

#[tokio::test]
async fn nameless_file_parts_are_skipped_under_any_field() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token)
                .file("avatar", "", "application/octet-stream", b"")
                .file("image", "shoe.png", "image/png", PNG_BYTES),
        )
        .await;

    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(stored_files(&app.images_dir).len(), 1);
    assert_eq!(app.products.all().await.len(), 1);
}

#[tokio::test]
async fn file_under_unexpected_field_fails_the_request() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token)
                .file("image", "shoe.png", "image/png", PNG_BYTES)
                .file("avatar", "me.png", "image/png", PNG_BYTES),
        )
        .await;

    assert_eq!(page.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(page.body.contains("Error!"));
    assert!(!page.body.contains("avatar"), "failure detail stays server-side");
    assert!(
        stored_files(&app.images_dir).is_empty(),
        "earlier accepted file is removed when the request fails"
    );
    assert!(app.products.all().await.is_empty());
}

#[tokio::test]
async fn multipart_without_token_is_forbidden() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            Multipart::new()
                .text("title", "Shoe")
                .file("image", "shoe.png", "image/png", PNG_BYTES),
        )
        .await;

    assert_eq!(page.status, StatusCode::FORBIDDEN);
    assert!(stored_files(&app.images_dir).is_empty());
    assert!(app.products.all().await.is_empty());
}

#[tokio::test]
async fn oversized_bodies_fail_without_leaving_files() {
    let app = TestApp::new();
    let (mut client, _user) = app.logged_in().await;
    client.get(&app, "/admin/add-product").await;
    let token = client.token.clone().expect("token");
    let oversized = vec![0u8; BODY_LIMIT + 512 * 1024];

    let page = client
        .post_multipart(
            &app,
            "/admin/add-product",
            product_form(&token).file("image", "huge.png", "image/png", &oversized),
        )
        .await;

    assert_eq!(page.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(page.body.contains("Error!"));
    assert!(stored_files(&app.images_dir).is_empty());
    assert!(app.products.all().await.is_empty());

    let description = "a".repeat(BODY_LIMIT + 1);
    let page = client
        .post_form(
            &app,
            "/admin/add-product",
            &[
                ("title", "Shoe"),
                ("description", description.as_str()),
                ("_csrf", token.as_str()),
            ],
        )
        .await;

    assert_eq!(page.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(page.body.contains("Error!"));
    assert!(app.products.all().await.is_empty());
}
