use super::*;
use axum::http::StatusCode;
use wiremock::matchers::body_string_contains;

#[tokio::test]
async fn test_memory_item_crud() {
    let app = create_test_app().await;
    let token = app.register_and_login("memory@example.com").await;
    let project_id = app.create_project(&token, "Finance").await;
    let base = format!("/api/v1/projects/{}/memory", project_id);

    let (status, item) = app
        .post(
            &base,
            &token,
            json!({
                "memory_type": "business_rule",
                "key": "fiscal_year",
                "content": "Starts in April"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_uri = format!("{}/{}", base, item["id"].as_str().unwrap());

    let (status, updated) = app
        .put(&item_uri, &token, json!({"content": "Starts on 1 April"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "Starts on 1 April");
    assert_eq!(updated["key"], "fiscal_year");

    let (_, items) = app.get(&base, &token).await;
    assert_eq!(items.as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&item_uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.delete(&item_uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Memory item not found");
}

#[tokio::test]
async fn test_memory_type_is_validated() {
    let app = create_test_app().await;
    let token = app.register_and_login("types@example.com").await;
    let project_id = app.create_project(&token, "Types").await;

    let (status, _) = app
        .post(
            &format!("/api/v1/projects/{}/memory", project_id),
            &token,
            json!({"memory_type": "gossip", "key": "k", "content": "c"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_memory_of_foreign_project_hidden() {
    let app = create_test_app().await;
    let owner = app.register_and_login("mine@example.com").await;
    let other = app.register_and_login("yours@example.com").await;
    let project_id = app.create_project(&owner, "Mine").await;

    let (status, body) = app
        .get(&format!("/api/v1/projects/{}/memory", project_id), &other)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Project not found");
}

#[tokio::test]
async fn test_project_instruction_crud() {
    let app = create_test_app().await;
    let token = app.register_and_login("instr@example.com").await;
    let project_id = app.create_project(&token, "Rules").await;
    let base = format!("/api/v1/projects/{}/instructions", project_id);

    let (status, low) = app
        .post(&base, &token, json!({"instruction_text": "Exclude test orders", "priority": 5}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(low["active"], true);
    let (_, high) = app
        .post(&base, &token, json!({"instruction_text": "Amounts are in EUR", "priority": 1}))
        .await;

    let (_, listed) = app.get(&base, &token).await;
    let texts: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["instruction_text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["Amounts are in EUR", "Exclude test orders"]);

    let high_uri = format!("{}/{}", base, high["id"].as_str().unwrap());
    let (status, deactivated) = app.put(&high_uri, &token, json!({"active": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["active"], false);

    let (status, _) = app.delete(&high_uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.put(&high_uri, &token, json!({"priority": 2})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Instruction not found");
}

#[tokio::test]
async fn test_memory_tiers_reach_the_prompt() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("- Report revenue net of VAT"))
        .and(body_string_contains("- fiscal_year: Starts in April"))
        .and(body_string_contains("PROJECT-SPECIFIC INSTRUCTIONS:"))
        .and(body_string_contains("Table: analytics-prj.sales.orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_reply(GENERATED_SQL)))
        .expect(1)
        .mount(&llm)
        .await;
    let bigquery = start_bigquery().await;
    let app = create_test_app_with(test_config(&llm.uri(), &bigquery.uri())).await;

    let admin = app.admin_token().await;
    let (status, _) = app
        .post(
            "/api/v1/admin/instructions",
            &admin,
            json!({"instruction_text": "Report revenue net of VAT", "category": "finance"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let token = app.register_and_login("tiers@example.com").await;
    let project_id = app.create_project(&token, "Sales").await;
    app.connect_project(&token, project_id, &bigquery).await;
    app.post(
        &format!("/api/v1/projects/{}/memory", project_id),
        &token,
        json!({"memory_type": "domain_knowledge", "key": "fiscal_year", "content": "Starts in April"}),
    )
    .await;
    app.post(
        &format!("/api/v1/projects/{}/instructions", project_id),
        &token,
        json!({"instruction_text": "Only count shipped orders"}),
    )
    .await;

    let (status, answer) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": project_id, "question": "Revenue by region?"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "ask failed: {}", answer);
    assert_eq!(answer["sql"], GENERATED_SQL);
}
