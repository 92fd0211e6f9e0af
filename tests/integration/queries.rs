use super::*;
use axum::http::StatusCode;

#[tokio::test]
async fn test_ask_end_to_end() {
    let fenced = format!("```sql\n{}\n```", GENERATED_SQL);
    let (app, _llm, _bigquery, token, project_id) = connected_app(&fenced).await;

    let (_, conversation) = app
        .post(
            &format!("/api/v1/projects/{}/conversations", project_id),
            &token,
            json!({}),
        )
        .await;
    let conversation_id = conversation["id"].as_str().unwrap().to_string();

    let (status, answer) = app
        .send(
            "POST",
            "/api/v1/queries/ask",
            &[
                ("Authorization", format!("Bearer {}", token).as_str()),
                ("User-Agent", "integration-test"),
                ("X-Forwarded-For", "203.0.113.9"),
            ],
            Some(json!({
                "project_id": project_id,
                "question": "What is the revenue per region?",
                "conversation_id": conversation_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "ask failed: {}", answer);
    assert_eq!(answer["sql"], GENERATED_SQL);
    assert!(answer["error"].is_null());
    assert_eq!(answer["tokens_used"], 150);
    assert_eq!(answer["insights"], "Query returned 2 row(s). ");
    assert_eq!(answer["suggested_chart"]["type"], "bar");
    assert_eq!(answer["suggested_chart"]["title"], "Comparison");

    let result = &answer["result"];
    assert_eq!(result["rows_returned"], 2);
    assert_eq!(result["bytes_processed"], 2048);
    assert_eq!(result["rows"][0]["region"], "north");
    assert_eq!(result["rows"][0]["total"], 1500.5);
    assert_eq!(result["schema"][1]["type"], "FLOAT");

    // The exchange lands in the conversation, which takes the question as title
    let (_, detail) = app
        .get(&format!("/api/v1/conversations/{}", conversation_id), &token)
        .await;
    assert_eq!(detail["title"], "What is the revenue per region?");
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["tokens_used"], 0);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(
        messages[1]["content"],
        format!("Generated SQL:\n```sql\n{}\n```", GENERATED_SQL)
    );
    assert_eq!(messages[1]["tokens_used"], 150);

    let (status, history) = app.get("/api/v1/queries/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    let log = &history["logs"][0];
    assert_eq!(log["id"], answer["query_id"]);
    assert_eq!(log["execution_status"], "success");
    assert_eq!(log["rows_returned"], 2);
    assert_eq!(log["sql_tokens_used"], 150);
    assert_eq!(log["model_used"], app.config.default_model.as_str());
    assert_eq!(log["ip_address"], "203.0.113.9");
    assert_eq!(log["user_agent"], "integration-test");
}

#[tokio::test]
async fn test_ask_requires_configured_project() {
    let app = create_test_app().await;
    let token = app.register_and_login("unconfigured@example.com").await;
    let project_id = app.create_project(&token, "Bare").await;

    let (status, body) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": project_id, "question": "How many orders?"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "BigQuery not configured for this project");

    let (status, body) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": Uuid::new_v4(), "question": "How many orders?"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Project not found");
}

#[tokio::test]
async fn test_ask_rejects_foreign_conversation() {
    let (app, _llm, _bigquery, token, project_id) = connected_app(GENERATED_SQL).await;
    let other = app.register_and_login("intruder@example.com").await;
    let other_project = app.create_project(&other, "Elsewhere").await;
    let (_, conversation) = app
        .post(
            &format!("/api/v1/projects/{}/conversations", other_project),
            &other,
            json!({}),
        )
        .await;

    let (status, body) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({
                "project_id": project_id,
                "question": "Revenue?",
                "conversation_id": conversation["id"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Conversation not found");
}

#[tokio::test]
async fn test_ask_empty_question_rejected() {
    let (app, _llm, _bigquery, token, project_id) = connected_app(GENERATED_SQL).await;

    let (status, _) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": project_id, "question": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_forbidden_generated_sql_is_logged() {
    let (app, _llm, _bigquery, token, project_id) =
        connected_app("DROP TABLE `analytics-prj.sales.orders`").await;

    let (status, body) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": project_id, "question": "Clean up the orders table"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "SQL query contains forbidden operations (DROP, DELETE, etc.)"
    );

    let (_, history) = app.get("/api/v1/queries/history", &token).await;
    assert_eq!(history["total"], 1);
    let log = &history["logs"][0];
    assert_eq!(log["execution_status"], "failed");
    assert_eq!(log["error_type"], "ForbiddenSqlError");
    assert_eq!(log["generated_sql"], "DROP TABLE `analytics-prj.sales.orders`");

    let admin = app.admin_token().await;
    let (_, errors) = app.get("/api/v1/admin/logs/errors", &admin).await;
    assert_eq!(errors["total"], 1);
    assert_eq!(errors["logs"][0]["endpoint"], "/api/v1/queries/ask");
    assert_eq!(
        errors["logs"][0]["request_payload"]["question"],
        "Clean up the orders table"
    );
}

#[tokio::test]
async fn test_llm_failure_reported() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&llm)
        .await;
    let bigquery = start_bigquery().await;
    let app = create_test_app_with(test_config(&llm.uri(), &bigquery.uri())).await;
    let token = app.register_and_login("overloaded@example.com").await;
    let project_id = app.create_project(&token, "Sales").await;
    app.connect_project(&token, project_id, &bigquery).await;

    let (status, body) = app
        .post(
            "/api/v1/queries/ask",
            &token,
            json!({"project_id": project_id, "question": "Revenue?", "model": "claude-test"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("SQL generation failed:"), "{}", detail);
    assert!(detail.contains("529"));

    let (_, history) = app.get("/api/v1/queries/history", &token).await;
    assert_eq!(history["logs"][0]["error_type"], "SqlGenerationError");
    assert_eq!(history["logs"][0]["model_used"], "claude-test");
}

#[tokio::test]
async fn test_execute_sql_directly() {
    let (app, _llm, _bigquery, token, project_id) = connected_app(GENERATED_SQL).await;

    let (status, body) = app
        .post(
            "/api/v1/queries/execute-sql",
            &token,
            json!({"project_id": project_id, "sql": "SELECT region, total FROM t LIMIT 10"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], "SELECT region, total FROM t LIMIT 10");
    assert_eq!(body["result"]["rows_returned"], 2);
    assert!(body["error"].is_null());

    let (status, body) = app
        .post(
            "/api/v1/queries/execute-sql",
            &token,
            json!({"project_id": project_id, "sql": "delete from orders where true"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "SQL contains forbidden operations");

    // Direct SQL does not go into the query log
    let (_, history) = app.get("/api/v1/queries/history", &token).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn test_history_is_per_user_and_paginated() {
    let (app, _llm, _bigquery, token, project_id) = connected_app(GENERATED_SQL).await;

    for question in ["one?", "two?", "three?"] {
        let (status, _) = app
            .post(
                "/api/v1/queries/ask",
                &token,
                json!({"project_id": project_id, "question": question}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, page) = app
        .get("/api/v1/queries/history?limit=2&offset=0", &token)
        .await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["logs"].as_array().unwrap().len(), 2);
    assert_eq!(page["logs"][0]["user_question"], "three?");

    let (status, past_end) = app
        .get("/api/v1/queries/history?offset=18446744073709551615", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(past_end["total"], 3);
    assert!(past_end["logs"].as_array().unwrap().is_empty());

    let (_, filtered) = app
        .get(
            &format!("/api/v1/queries/history?project_id={}", Uuid::new_v4()),
            &token,
        )
        .await;
    assert_eq!(filtered["total"], 0);

    let stranger = app.register_and_login("stranger@example.com").await;
    let (_, theirs) = app.get("/api/v1/queries/history", &stranger).await;
    assert_eq!(theirs["total"], 0);
}
