mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{read, TestServer};

/// Join rows of a workout, in workout order.
async fn workout_exercises(server: &TestServer, token: &str, workout: &Value) -> Result<Vec<Value>> {
    let (status, body) = read(server.get(token, &format!("/workouts/{}/workout-exercises", workout["id"])).send().await?).await?;
    anyhow::ensure!(status == StatusCode::OK, "list workout exercises: {}", status);
    Ok(body["workout_exercises"].as_array().cloned().unwrap_or_default())
}

#[tokio::test]
async fn every_workout_exercise_starts_pending() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.session("jane").await?;
    server.exercise(&token, "Squat").await?;
    server.exercise(&token, "Lunge").await?;
    let workout = server.workout(&token, "Leg Day", &["Squat", "Lunge"]).await?;

    let rows = workout_exercises(&server, &token, &workout).await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["order"], 1);
    assert_eq!(rows[1]["order"], 2);

    for row in &rows {
        let (status, body) = read(server.get(&token, &format!("/workout-exercises/{}/status", row["id"])).send().await?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["status"], "pending");
        assert_eq!(body["status"]["completed_at"], Value::Null);
        assert_eq!(body["status"]["workout_exercise_id"], row["id"]);
    }
    Ok(())
}

#[tokio::test]
async fn completing_stamps_and_reopening_clears() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.session("jane").await?;
    server.exercise(&token, "Squat").await?;
    let workout = server.workout(&token, "Leg Day", &["Squat"]).await?;
    let rows = workout_exercises(&server, &token, &workout).await?;
    let path = format!("/workout-exercises/{}/status", rows[0]["id"]);

    let (status, body) = read(
        server
            .patch(&token, &path, json!({ "status": { "status": "completed", "comments": "felt strong" } }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["status"], "completed");
    assert_eq!(body["status"]["comments"], "felt strong");
    assert!(body["status"]["completed_at"].is_string());

    let (status, body) = read(server.patch(&token, &path, json!({ "status": { "status": "pending", "comments": "" } })).send().await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["status"], "pending");
    assert_eq!(body["status"]["completed_at"], Value::Null);
    assert_eq!(body["status"]["comments"], Value::Null);

    let (status, _) = read(server.patch(&token, &path, json!({ "status": { "status": "skipped" } })).send().await?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn status_is_private_to_the_workout_owner() -> Result<()> {
    let server = TestServer::spawn().await?;
    let jane = server.session("jane").await?;
    let john = server.session("john").await?;
    server.exercise(&jane, "Squat").await?;
    let workout = server.workout(&jane, "Leg Day", &["Squat"]).await?;
    let rows = workout_exercises(&server, &jane, &workout).await?;
    let path = format!("/workout-exercises/{}/status", rows[0]["id"]);

    let resp = server.get(&john, &path).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server.patch(&john, &path, json!({ "status": { "status": "completed" } })).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server.get(&john, &format!("/workouts/{}/workout-exercises", workout["id"])).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let (_, body) = read(server.get(&jane, &path).send().await?).await?;
    assert_eq!(body["status"]["status"], "pending");

    let (status, body) = read(server.get(&jane, "/workout-exercises/999999/status").send().await?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Workout Exercise not found.");
    Ok(())
}
