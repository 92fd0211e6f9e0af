use super::*;
use axum::http::StatusCode;

#[tokio::test]
async fn test_conversation_lifecycle() {
    let app = create_test_app().await;
    let token = app.register_and_login("chat@example.com").await;
    let project_id = app.create_project(&token, "Chat").await;
    let base = format!("/api/v1/projects/{}/conversations", project_id);

    let (status, titled) = app
        .post(&base, &token, json!({"title": "Weekly numbers"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(titled["title"], "Weekly numbers");

    // The body is optional
    let auth = format!("Bearer {}", token);
    let (status, untitled) = app
        .send("POST", &base, &[("Authorization", auth.as_str())], None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(untitled["title"].is_null());

    let (_, listed) = app.get(&base, &token).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let uri = format!("/api/v1/conversations/{}", titled["id"].as_str().unwrap());
    let (status, detail) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["project_id"], project_id.to_string());
    assert!(detail["messages"].as_array().unwrap().is_empty());

    let (status, _) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Conversation not found");
}

#[tokio::test]
async fn test_conversations_are_private() {
    let app = create_test_app().await;
    let owner = app.register_and_login("talker@example.com").await;
    let other = app.register_and_login("listener@example.com").await;
    let project_id = app.create_project(&owner, "Talk").await;

    let (_, conversation) = app
        .post(
            &format!("/api/v1/projects/{}/conversations", project_id),
            &owner,
            json!({}),
        )
        .await;
    let uri = format!("/api/v1/conversations/{}", conversation["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_project_removes_conversations() {
    let app = create_test_app().await;
    let token = app.register_and_login("cascade@example.com").await;
    let project_id = app.create_project(&token, "Cascade").await;

    let (_, conversation) = app
        .post(
            &format!("/api/v1/projects/{}/conversations", project_id),
            &token,
            json!({"title": "to be removed"}),
        )
        .await;

    let (status, _) = app
        .delete(&format!("/api/v1/projects/{}", project_id), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(
            &format!("/api/v1/conversations/{}", conversation["id"].as_str().unwrap()),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
