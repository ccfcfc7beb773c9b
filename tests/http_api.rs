mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use shelfrate::infra::http::build_router;

use common::Harness;

fn router(harness: &Harness) -> Router {
    build_router(harness.api_state())
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(router: &Router, email: &str) -> Value {
    let (status, body) = send(
        router,
        "POST",
        "/register-login/",
        None,
        Some(json!({"email": email, "password": "correct horse battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn anonymous_book_list_has_login_required_flag() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);

    let (status, body) = send(&router, "GET", "/books/", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"id": id, "title": "Dune", "bookmarks_count": 0, "is_bookmark": "Login Required"}])
    );
}

#[tokio::test]
async fn register_login_then_bookmark_round_trip() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);

    let session = login(&router, "reader@example.com").await;
    assert_eq!(session["created"], json!(true));
    assert_eq!(session["email"], json!("reader@example.com"));
    let access = session["access"].as_str().unwrap().to_string();

    let again = login(&router, "reader@example.com").await;
    assert_eq!(again["created"], json!(false));
    assert_eq!(again["user_id"], session["user_id"]);

    let (status, body) = send(
        &router,
        "POST",
        "/bookmarks/",
        Some(&access),
        Some(json!({"book": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"detail": "Bookmark Added."}));

    let (_, books) = send(&router, "GET", "/books/", Some(&access), None).await;
    assert_eq!(books[0]["is_bookmark"], json!(true));
    assert_eq!(books[0]["bookmarks_count"], json!(1));

    let (status, body) = send(
        &router,
        "POST",
        "/bookmarks/",
        Some(&access),
        Some(json!({"book": id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"detail": "Bookmark Removed."}));
}

#[tokio::test]
async fn writes_without_credentials_are_401() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);

    let (bookmark, body) = send(&router, "POST", "/bookmarks/", None, Some(json!({"book": id}))).await;
    assert_eq!(bookmark, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["detail"],
        json!("Authentication credentials were not provided.")
    );

    let (rating, _) = send(
        &router,
        "POST",
        "/ratings/",
        None,
        Some(json!({"book": id, "score": 5})),
    )
    .await;
    assert_eq!(rating, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_bearer_token_is_401_even_on_reads() {
    let harness = Harness::new();
    let router = router(&harness);

    let (status, body) = send(&router, "GET", "/books/", Some("acc_nope_nope"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("token_not_valid"));
}

#[tokio::test]
async fn rating_without_score_or_review_is_400() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);
    let session = login(&router, "reader@example.com").await;
    let access = session["access"].as_str().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        json!("At Least One of Score or Review Must Be Filled!")
    );
}

#[tokio::test]
async fn rating_upsert_returns_merged_fields_and_updates_detail() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);
    let session = login(&router, "reader@example.com").await;
    let access = session["access"].as_str().unwrap();
    let user_id = session["user_id"].clone();

    let (_, before) = send(&router, "GET", &format!("/books/{id}/"), None, None).await;
    assert_eq!(before["scores_mean"], Value::Null);

    let (status, created) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id, "score": 4, "review": "Sandy."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        created,
        json!({"user": user_id, "book": id, "score": 4, "review": "Sandy."})
    );

    let (_, updated) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id, "score": 2})),
    )
    .await;
    assert_eq!(updated["score"], json!(2));
    assert_eq!(updated["review"], json!("Sandy."));

    let (status, detail) = send(&router, "GET", &format!("/books/{id}/"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["scores_count"], json!(1));
    assert_eq!(detail["reviews_count"], json!(1));
    assert_eq!(detail["scores_mean"], json!(2.0));
    assert_eq!(
        detail["scores_count_group_by_number"],
        json!([{"score": 2, "count": 1}])
    );
}

#[tokio::test]
async fn explicit_null_score_clears_it_but_omitted_review_is_kept() {
    let harness = Harness::new();
    let id = harness.store.add_book("Dune", "Spice.").await;
    let router = router(&harness);
    let session = login(&router, "reader@example.com").await;
    let access = session["access"].as_str().unwrap();

    send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id, "score": 5, "review": "x"})),
    )
    .await;
    let (status, cleared) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id, "score": null, "review": "y"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["score"], Value::Null);
    assert_eq!(cleared["review"], json!("y"));

    let (_, rescored) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": id, "score": 3})),
    )
    .await;
    assert_eq!(rescored["score"], json!(3));
    assert_eq!(rescored["review"], json!("y"));
}

#[tokio::test]
async fn rating_for_unknown_book_without_content_names_the_book() {
    let harness = Harness::new();
    let router = router(&harness);
    let session = login(&router, "reader@example.com").await;
    let access = session["access"].as_str().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        "/ratings/",
        Some(access),
        Some(json!({"book": 999})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], json!("Book With ID '999' Does Not Exist!"));
}

#[tokio::test]
async fn unknown_book_detail_is_404() {
    let harness = Harness::new();
    let router = router(&harness);

    let (missing, body) = send(&router, "GET", "/books/404/", None, None).await;
    let (non_numeric, _) = send(&router, "GET", "/books/abc/", None, None).await;

    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], json!("Not found."));
    assert_eq!(non_numeric, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_400() {
    let harness = Harness::new();
    let router = router(&harness);

    let (missing_field, body) = send(
        &router,
        "POST",
        "/register-login/",
        None,
        Some(json!({"email": "reader@example.com"})),
    )
    .await;
    assert_eq!(missing_field, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("parse_error"));

    let (bad_email, body) = send(
        &router,
        "POST",
        "/register-login/",
        None,
        Some(json!({"email": "nope", "password": "correct horse battery"})),
    )
    .await;
    assert_eq!(bad_email, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("validation_error"));
}

#[tokio::test]
async fn refresh_endpoint_exchanges_tokens() {
    let harness = Harness::new();
    let router = router(&harness);
    let session = login(&router, "reader@example.com").await;

    let (status, body) = send(
        &router,
        "POST",
        "/token/refresh/",
        None,
        Some(json!({"refresh": session["refresh"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap();
    assert!(access.starts_with("acc_"));

    let (rejected, _) = send(
        &router,
        "POST",
        "/token/refresh/",
        None,
        Some(json!({"refresh": session["access"]})),
    )
    .await;
    assert_eq!(rejected, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn db_health_reflects_the_store() {
    let harness = Harness::new();
    let router = router(&harness);

    let (healthy, _) = send(&router, "GET", "/_health/db", None, None).await;
    assert_eq!(healthy, StatusCode::NO_CONTENT);

    harness.store.set_healthy(false);
    let (unhealthy, _) = send(&router, "GET", "/_health/db", None, None).await;
    assert_eq!(unhealthy, StatusCode::SERVICE_UNAVAILABLE);
}
