mod common;

use axum::http::StatusCode;
use common::{TestApp, basic};
use serde_json::json;

async fn app_with_activity() -> (TestApp, i64) {
    let app = TestApp::new().await;
    app.active_user("curator", "pw", "Advanced User").await;
    let curator = basic("curator", "pw");

    let reply = app
        .post("/create/activity_type", Some(&curator), json!({ "name": "Hike" }))
        .await;
    let kind = reply.data()["id"].as_i64().unwrap();
    let reply = app
        .post(
            "/create/activity",
            Some(&curator),
            json!({ "name": "Lake Loop", "activity_type_id": kind, "source": "club" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    (app, reply.data()["id"].as_i64().unwrap())
}

#[tokio::test]
async fn test_hike_add_check_remove() {
    let (app, activity) = app_with_activity().await;
    let hiker = app.active_user("hiker", "pw", "User").await;
    let auth = basic("hiker", "pw");
    let uri = format!("/hikes/{activity}");

    let reply = app.get(&uri, Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "hikes.not_found");

    let reply = app.send("POST", &uri, Some(&auth), None).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.message(), "hikes.added");
    assert_eq!(reply.json["entity"], "Hike");
    assert_eq!(reply.data()["user_id"].as_i64().unwrap(), hiker.id);
    let hike_id = reply.data()["id"].as_i64().unwrap();

    // Adding again returns the existing record
    let reply = app.send("POST", &uri, Some(&auth), None).await;
    assert_eq!(reply.data()["id"].as_i64().unwrap(), hike_id);

    let reply = app.get(&uri, Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "hikes.found");

    let reply = app.send("DELETE", &uri, Some(&auth), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "hikes.removed");

    let reply = app.send("DELETE", &uri, Some(&auth), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "hikes.not_found");
}

#[tokio::test]
async fn test_hikes_are_per_user() {
    let (app, activity) = app_with_activity().await;
    app.active_user("alice", "pw", "User").await;
    app.active_user("bob", "pw", "User").await;
    let uri = format!("/hikes/{activity}");

    app.send("POST", &uri, Some(&basic("alice", "pw")), None).await;

    let reply = app.get(&uri, Some(&basic("bob", "pw"))).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hike_permissions_and_unknown_activity() {
    let (app, activity) = app_with_activity().await;
    app.active_user("reader", "pw", "Test User").await;
    app.active_user("hiker", "pw", "User").await;

    let reply = app
        .send("POST", &format!("/hikes/{activity}"), Some(&basic("reader", "pw")), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "hikes.not_authorized");

    let reply = app
        .send("POST", &format!("/hikes/{activity}"), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send("POST", "/hikes/999", Some(&basic("hiker", "pw")), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "hikes.activity_not_found");
}
