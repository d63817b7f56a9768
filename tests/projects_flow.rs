mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_json, TestApp};
use diesel::prelude::*;
use serde_json::json;

async fn create_project(app: &TestApp, token: &str, name: &str, members: &[&str]) -> Result<i64> {
    let response = app
        .post_json(
            "/api/projects",
            &json!({"name": name, "member_ids": members}),
            Some(token),
        )
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "project creation failed with status {}",
        response.status()
    );
    let body: serde_json::Value = body_json(response.into_body()).await?;
    body["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("missing project id"))
}

#[tokio::test]
async fn blank_names_are_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    let token = app.login_token("M001", "pw").await?;

    let response = app
        .post_json("/api/projects", &json!({"name": "   "}), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn creator_is_always_a_member_and_duplicates_collapse() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    app.insert_approved("S001", "pw", "Staff").await?;
    let token = app.login_token("M001", "pw").await?;

    let project_id = create_project(&app, &token, "Bracket Rework", &["S001", "S001"]).await?;

    let response = app
        .get(&format!("/api/projects/{project_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail: serde_json::Value = body_json(response.into_body()).await?;
    let member_ids: Vec<&str> = detail["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(member_ids.len(), 2);
    assert!(member_ids.contains(&"M001"));
    assert!(member_ids.contains(&"S001"));

    Ok(())
}

#[tokio::test]
async fn unknown_members_are_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    let token = app.login_token("M001", "pw").await?;

    let response = app
        .post_json(
            "/api/projects",
            &json!({"name": "Ghost Crew", "member_ids": ["NOBODY"]}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn staff_see_only_their_projects_while_managers_see_all() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    app.insert_approved("S001", "pw", "Staff").await?;
    app.insert_approved("S002", "pw", "Staff").await?;
    let manager = app.login_token("M001", "pw").await?;
    let staff = app.login_token("S001", "pw").await?;

    create_project(&app, &manager, "Line A", &["S001"]).await?;
    create_project(&app, &manager, "Line B", &["S002"]).await?;

    let response = app.get("/api/projects", Some(&manager)).await?;
    let all: Vec<serde_json::Value> = body_json(response.into_body()).await?;
    assert_eq!(all.len(), 2);

    let response = app.get("/api/projects", Some(&staff)).await?;
    let mine: Vec<serde_json::Value> = body_json(response.into_body()).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["name"], "Line A");
    assert_eq!(mine[0]["creator_name"], "M001 Fullname");

    Ok(())
}

#[tokio::test]
async fn search_matches_name_and_part_fields() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    let token = app.login_token("M001", "pw").await?;

    let response = app
        .post_json(
            "/api/projects",
            &json!({"name": "Door Trim", "part_number": "PN-7731"}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    create_project(&app, &token, "Hood Latch", &[]).await?;

    let response = app.get("/api/projects?search=7731", Some(&token)).await?;
    let hits: Vec<serde_json::Value> = body_json(response.into_body()).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Door Trim");

    let response = app.get("/api/projects?search=latch", Some(&token)).await?;
    let hits: Vec<serde_json::Value> = body_json(response.into_body()).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Hood Latch");

    let response = app
        .get("/api/projects?creator=M001", Some(&token))
        .await?;
    let hits: Vec<serde_json::Value> = body_json(response.into_body()).await?;
    assert_eq!(hits.len(), 2);

    Ok(())
}

#[tokio::test]
async fn edits_replace_the_member_set() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    app.insert_approved("S001", "pw", "Staff").await?;
    app.insert_approved("S002", "pw", "Staff").await?;
    let token = app.login_token("M001", "pw").await?;

    let project_id = create_project(&app, &token, "Line A", &["S001"]).await?;

    let response = app
        .patch_json(
            &format!("/api/projects/{project_id}"),
            &json!({"name": "Line A2", "member_ids": ["S002"]}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/projects/{project_id}"), Some(&token))
        .await?;
    let detail: serde_json::Value = body_json(response.into_body()).await?;
    assert_eq!(detail["name"], "Line A2");
    let member_ids: Vec<&str> = detail["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    // S001 dropped, S002 added, creator retained.
    assert_eq!(member_ids.len(), 2);
    assert!(member_ids.contains(&"M001"));
    assert!(member_ids.contains(&"S002"));

    Ok(())
}

#[tokio::test]
async fn only_the_creator_may_delete() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    app.insert_approved("M002", "pw", "Manager").await?;
    let creator = app.login_token("M001", "pw").await?;
    let other = app.login_token("M002", "pw").await?;

    let project_id = create_project(&app, &creator, "Line A", &[]).await?;

    let response = app
        .delete(&format!("/api/projects/{project_id}"), Some(&other))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/api/projects/{project_id}"), Some(&creator))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/projects/{project_id}"), Some(&creator))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn deleting_a_project_removes_members_tasks_documents_and_chat() -> Result<()> {
    let app = TestApp::new().await?;
    app.insert_approved("M001", "pw", "Manager").await?;
    app.insert_approved("E100", "pw", "Staff").await?;
    let manager = app.login_token("M001", "pw").await?;
    let staff = app.login_token("E100", "pw").await?;

    let project_id = create_project(&app, &manager, "Line A", &["E100"]).await?;

    let response = app
        .post_json(
            &format!("/api/projects/{project_id}/tasks"),
            &json!({"title": "T1", "pic_id": "E100", "due_date": "2026-09-30"}),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = body_json(response.into_body()).await?;
    let task_id = body["id"].as_i64().unwrap();

    // Two uploads so the documents form a revision chain.
    for name in ["rev-a.pdf", "rev-b.pdf"] {
        let response = app
            .upload_document(
                &format!("/api/tasks/{task_id}/documents"),
                name,
                "application/pdf",
                b"%PDF-1.4",
                None,
                &staff,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .send_message(
            &format!("/api/projects/{project_id}/messages"),
            "kickoff at 9",
            None,
            &manager,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .delete(&format!("/api/projects/{project_id}"), Some(&manager))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // No child rows survive the cascade.
    let (members, tasks, messages, documents) = app
        .with_conn(|conn| {
            use forgeboard::schema::{documents, project_members, project_messages, tasks};
            let members: i64 = project_members::table.count().get_result(conn)?;
            let tasks: i64 = tasks::table.count().get_result(conn)?;
            let messages: i64 = project_messages::table.count().get_result(conn)?;
            let documents: i64 = documents::table.count().get_result(conn)?;
            Ok((members, tasks, messages, documents))
        })
        .await?;
    assert_eq!(members, 0);
    assert_eq!(tasks, 0);
    assert_eq!(messages, 0);
    assert_eq!(documents, 0);

    Ok(())
}
