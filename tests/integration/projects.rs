use super::*;
use axum::http::StatusCode;

#[tokio::test]
async fn test_project_crud() {
    let app = create_test_app().await;
    let token = app.register_and_login("owner@example.com").await;

    let project_id = app.create_project(&token, "Marketing").await;

    let (status, projects) = app.get("/api/v1/projects", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(projects.as_array().unwrap().len(), 1);
    assert_eq!(projects[0]["bigquery_connected"], false);

    let uri = format!("/api/v1/projects/{}", project_id);
    let (status, updated) = app
        .put(&uri, &token, json!({"description": "Campaign metrics"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Marketing");
    assert_eq!(updated["description"], "Campaign metrics");

    let (status, _) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Project not found");
}

#[tokio::test]
async fn test_projects_are_private_to_owner() {
    let app = create_test_app().await;
    let owner = app.register_and_login("first@example.com").await;
    let other = app.register_and_login("second@example.com").await;
    let project_id = app.create_project(&owner, "Private").await;

    let uri = format!("/api/v1/projects/{}", project_id);
    let (status, _) = app.get(&uri, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.put(&uri, &other, json!({"name": "Hijacked"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = app.get("/api/v1/projects", &other).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_project_name_rejected() {
    let app = create_test_app().await;
    let token = app.register_and_login("names@example.com").await;

    let (status, _) = app
        .post("/api/v1/projects", &token, json!({"name": ""}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_connect_caches_schema() {
    let bigquery = start_bigquery().await;
    let app = create_test_app_with(test_config("http://127.0.0.1:9", &bigquery.uri())).await;
    let token = app.register_and_login("connect@example.com").await;
    let project_id = app.create_project(&token, "Sales").await;

    let schema_uri = format!("/api/v1/projects/{}/bigquery/schema", project_id);
    let (status, body) = app.get(&schema_uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["detail"],
        "Schema not available. Please connect to BigQuery first."
    );

    let (status, connected) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/connect", project_id),
            &token,
            json!({"credentials_json": service_account_json(&bigquery.uri())}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(connected["status"], "connected");
    assert_eq!(connected["tables_found"], 1);
    assert_eq!(connected["message"], "BigQuery connection successful");

    let (status, schema) = app.get(&schema_uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    let orders = &schema["orders"];
    assert_eq!(orders["row_count"], 1200);
    assert_eq!(orders["size_bytes"], 48000);
    assert_eq!(orders["columns"][0]["name"], "order_id");
    assert_eq!(orders["columns"][0]["mode"], "REQUIRED");
    assert_eq!(orders["columns"][1]["mode"], "NULLABLE");
    assert_eq!(orders["columns"][2]["description"], "Order value in EUR");

    // Credentials are stored but never echoed back
    let (_, project) = app
        .get(&format!("/api/v1/projects/{}", project_id), &token)
        .await;
    assert_eq!(project["bigquery_connected"], true);
    assert!(project["schema_last_updated"].is_string());
    assert!(project.get("credentials_json").is_none());
}

#[tokio::test]
async fn test_connect_failure_stores_nothing() {
    let bigquery = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
        .mount(&bigquery)
        .await;
    let app = create_test_app_with(test_config("http://127.0.0.1:9", &bigquery.uri())).await;
    let token = app.register_and_login("broken@example.com").await;
    let project_id = app.create_project(&token, "Broken").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/connect", project_id),
            &token,
            json!({"credentials_json": service_account_json(&bigquery.uri())}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Connection failed: Connection test failed"
    );

    let (status, body) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/connect", project_id),
            &token,
            json!({"credentials_json": "{not json"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Connection failed: Invalid service account credentials"));

    let (_, project) = app
        .get(&format!("/api/v1/projects/{}", project_id), &token)
        .await;
    assert_eq!(project["bigquery_connected"], false);
}

#[tokio::test]
async fn test_refresh_and_validate() {
    let (app, _llm, _bigquery, token, project_id) = connected_app(GENERATED_SQL).await;

    let (status, refreshed) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/refresh", project_id),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["status"], "refreshed");
    assert_eq!(refreshed["tables_found"], 1);
    assert!(refreshed["updated_at"].is_string());

    let (status, dry_run) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/validate", project_id),
            &token,
            json!({"sql": GENERATED_SQL}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dry_run["valid"], true);
    assert_eq!(dry_run["estimated_bytes"], 2048);
}

#[tokio::test]
async fn test_refresh_without_connection() {
    let app = create_test_app().await;
    let token = app.register_and_login("norefresh@example.com").await;
    let project_id = app.create_project(&token, "Idle").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/projects/{}/bigquery/refresh", project_id),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "Schema refresh failed: BigQuery credentials not configured for this project"
    );
}
