//! Integration tests for the collection routes.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use collage_services::{database::MockSqlStorage, storage::MockFileStorage};
use common::{CONTRIBUTOR_ID, OWNER_ID, gradient_png, test_server, token_for};
use serde_json::{Value, json};

#[tokio::test]
async fn create_then_fetch_with_contribution_count() {
    let sql = MockSqlStorage::new();
    let server = test_server(sql.clone(), MockFileStorage::new());

    let response = server
        .post("/collections")
        .authorization_bearer(token_for(OWNER_ID))
        .json(&json!({ "name": "  Street Art ", "description": "walls" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["name"], "Street Art");
    assert_eq!(created["created_by"], OWNER_ID);
    let id = created["id"].as_i64().unwrap();

    server
        .post(&format!("/contribute/{id}"))
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .multipart(
            MultipartForm::new().add_part("image", Part::bytes(gradient_png(30, 30)).file_name("w.png")),
        )
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get(&format!("/collections/{id}"))
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({
        "id": id,
        "name": "Street Art",
        "description": "walls",
        "contributionCount": 1,
    }));
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let sql = MockSqlStorage::new();
    let server = test_server(sql.clone(), MockFileStorage::new());

    server
        .post("/collections")
        .authorization_bearer(token_for(OWNER_ID))
        .json(&json!({ "name": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(sql.collections_len(), 0);
}

#[tokio::test]
async fn malformed_create_bodies_get_a_json_bad_request() {
    let sql = MockSqlStorage::new();
    let server = test_server(sql.clone(), MockFileStorage::new());

    let response = server
        .post("/collections")
        .authorization_bearer(token_for(OWNER_ID))
        .json(&json!({ "description": "x" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Collection name is required");

    let response = server
        .post("/collections")
        .authorization_bearer(token_for(OWNER_ID))
        .bytes("{not json".into())
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["message"].is_string());

    assert_eq!(sql.collections_len(), 0);
}

#[tokio::test]
async fn non_numeric_ids_get_a_json_bad_request() {
    let server = test_server(MockSqlStorage::new(), MockFileStorage::new());

    for response in [
        server
            .get("/collections/abc")
            .authorization_bearer(token_for(OWNER_ID))
            .await,
        server
            .delete("/collections/abc")
            .authorization_bearer(token_for(OWNER_ID))
            .await,
        server
            .get("/collections?limit=lots")
            .authorization_bearer(token_for(OWNER_ID))
            .await,
    ] {
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["message"].is_string());
    }
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let server = test_server(MockSqlStorage::new(), MockFileStorage::new());

    let response = server
        .get("/collections/42")
        .authorization_bearer(token_for(OWNER_ID))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["message"], "collection not found");
}

#[tokio::test]
async fn list_searches_and_pages() {
    let sql = MockSqlStorage::new();
    for name in ["Cats", "Dogs", "More cats", "Catalogue", "Birds"] {
        sql.seed_collection(name, OWNER_ID);
    }
    let server = test_server(sql, MockFileStorage::new());

    let response = server
        .get("/collections")
        .add_query_params(json!({ "query": "cat", "page": 1, "limit": 2 }))
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["collections"].as_array().unwrap().len(), 2);

    let response = server
        .get("/collections")
        .add_query_params(json!({ "query": "cat", "page": 2, "limit": 2 }))
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .await;
    assert_eq!(response.json::<Value>()["collections"].as_array().unwrap().len(), 1);

    let response = server
        .get("/collections")
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .await;
    let body: Value = response.json();
    assert_eq!(body["total"], 5);
    assert_eq!(body["limit"], 10);
}

#[tokio::test]
async fn owned_lists_only_my_collections() {
    let sql = MockSqlStorage::new();
    sql.seed_collection("mine", OWNER_ID);
    sql.seed_collection("theirs", CONTRIBUTOR_ID);
    sql.seed_collection("also mine", OWNER_ID);
    let server = test_server(sql, MockFileStorage::new());

    let response = server
        .get("/collections/owned")
        .authorization_bearer(token_for(OWNER_ID))
        .await;
    response.assert_status(StatusCode::OK);
    let names: Vec<String> = response
        .json::<Vec<Value>>()
        .into_iter()
        .map(|c| c["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec!["also mine", "mine"]);
}

#[tokio::test]
async fn only_the_owner_can_delete_and_objects_are_removed() {
    let sql = MockSqlStorage::new();
    let files = MockFileStorage::new();
    let id = sql.seed_collection("mine", OWNER_ID).id;
    let server = test_server(sql.clone(), files.clone());

    for _ in 0..2 {
        server
            .post(&format!("/contribute/{id}"))
            .authorization_bearer(token_for(CONTRIBUTOR_ID))
            .multipart(
                MultipartForm::new()
                    .add_part("image", Part::bytes(gradient_png(12, 12)).file_name("a.png")),
            )
            .await
            .assert_status(StatusCode::CREATED);
    }
    assert_eq!(files.len(), 2);

    let response = server
        .delete(&format!("/collections/{id}"))
        .authorization_bearer(token_for(CONTRIBUTOR_ID))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>()["message"],
        "collection not found or not owned by user"
    );
    assert_eq!(files.len(), 2);

    let response = server
        .delete(&format!("/collections/{id}"))
        .authorization_bearer(token_for(OWNER_ID))
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.json::<Value>()["message"],
        "collection deleted successfully"
    );

    assert!(files.is_empty());
    assert!(sql.contributions().is_empty());
    server
        .get(&format!("/collections/{id}/zip"))
        .authorization_bearer(token_for(OWNER_ID))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
