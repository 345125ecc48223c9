mod common;

use axum::http::StatusCode;
use common::{TestApp, basic};
use serde_json::{Value, json};

const CURATOR: &str = "curator";
const PASSWORD: &str = "trail-pass";

async fn curator_app() -> (TestApp, String) {
    let app = TestApp::new().await;
    app.active_user(CURATOR, PASSWORD, "Advanced User").await;
    (app, basic(CURATOR, PASSWORD))
}

async fn created_id(app: &TestApp, auth: &str, uri: &str, body: Value) -> i64 {
    let reply = app.post(uri, Some(auth), body).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{uri}: {}", reply.json);
    reply.data()["id"].as_i64().unwrap()
}

/// Country > region > two locations, one activity linked to both.
async fn seed_catalog(app: &TestApp, auth: &str) -> (i64, i64) {
    let country = created_id(
        app,
        auth,
        "/create/country",
        json!({ "name": "Switzerland", "abbreviation": "CH" }),
    )
    .await;
    let region = created_id(
        app,
        auth,
        "/create/region",
        json!({ "name": "Bernese Oberland", "country_id": country }),
    )
    .await;
    let near = created_id(
        app,
        auth,
        "/create/location",
        json!({ "name": "Grindelwald", "lat": 46.624, "long": 8.041, "region_id": region }),
    )
    .await;
    let far = created_id(
        app,
        auth,
        "/create/location",
        json!({ "name": "Kandersteg", "lat": 46.495, "long": 7.673, "region_id": region }),
    )
    .await;
    let kind = created_id(app, auth, "/create/activity_type", json!({ "name": "Hike" })).await;
    let activity = created_id(
        app,
        auth,
        "/create/activity",
        json!({
            "name": "Eiger Trail",
            "description": "Along the north face",
            "activity_type_id": kind,
            "source": "guidebook",
        }),
    )
    .await;
    for location in [near, far] {
        created_id(
            app,
            auth,
            "/create/location_activity",
            json!({ "location_id": location, "activity_id": activity }),
        )
        .await;
    }
    (country, activity)
}

#[tokio::test]
async fn test_create_requires_create_permission() {
    let app = TestApp::new().await;
    app.active_user("reader", "pw", "Test User").await;
    let body = json!({ "name": "Norway", "abbreviation": "NO" });

    let reply = app.post("/create/country", None, body.clone()).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "create.not_authorized");

    let reply = app
        .post("/create/country", Some(&basic("reader", "pw")), body)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.category(), "notAuthorized");
}

#[tokio::test]
async fn test_create_validation() {
    let (app, auth) = curator_app().await;

    let reply = app
        .post("/create/country", Some(&auth), json!({ "name": "Norway" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.missing_parameter");
    assert_eq!(reply.data()["missing"], "abbreviation");

    let reply = app
        .post(
            "/create/country",
            Some(&auth),
            json!({ "name": "Norway", "abbreviation": "NO", "capital": "Oslo" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "main.invalid_request");

    let reply = app
        .post("/create/region", Some(&auth), json!({ "name": "Nowhere", "country_id": 999 }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.invalid_parameter");

    let reply = app
        .post(
            "/create/location",
            Some(&auth),
            json!({ "name": "Pole", "lat": 95.0, "long": 0.0, "region_id": 1 }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.invalid_parameter");
    assert_eq!(reply.data()["invalid"], "lat");
}

#[tokio::test]
async fn test_create_duplicates() {
    let (app, auth) = curator_app().await;
    let (country, activity) = seed_catalog(&app, &auth).await;
    assert!(country > 0);

    let reply = app
        .post(
            "/create/country",
            Some(&auth),
            json!({ "name": "Switzerland", "abbreviation": "SUI" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.category(), "invalidInput");
    assert_eq!(reply.message(), "create.duplicate_params");
    assert_eq!(reply.data()["existing"], "name");

    let reply = app
        .post(
            "/create/location_activity",
            Some(&auth),
            json!({ "location_id": 1, "activity_id": activity }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.duplicate_params");
}

#[tokio::test]
async fn test_update() {
    let (app, auth) = curator_app().await;
    let (country, _) = seed_catalog(&app, &auth).await;

    let reply = app
        .post(&format!("/update/country/{country}"), Some(&auth), json!({ "abbreviation": "SUI" }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "update.successful");
    assert_eq!(reply.data()["abbreviation"], "SUI");
    assert_eq!(reply.data()["name"], "Switzerland");

    let reply = app
        .post("/update/country/999", Some(&auth), json!({ "name": "Atlantis" }))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "update.not_found");

    let reply = app
        .post(&format!("/update/country/{country}"), Some(&auth), json!({ "id": 7 }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "main.invalid_request");

    let reply = app
        .post(&format!("/update/country/{country}"), None, json!({ "name": "X" }))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "update.not_authorized");

    let reply = app
        .post("/update/location/1", Some(&auth), json!({ "long": 200.0 }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "update.invalid_parameter");
}

#[tokio::test]
async fn test_find() {
    let (app, auth) = curator_app().await;
    let (country, activity) = seed_catalog(&app, &auth).await;
    app.active_user("reader", "pw", "Test User").await;
    let reader = basic("reader", "pw");

    let reply = app.get(&format!("/find/country/{country}"), Some(&reader)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "find.successful");
    assert_eq!(reply.json["entity"], "Country");
    assert_eq!(reply.data()["name"], "Switzerland");

    let reply = app.get(&format!("/find/activity/{activity}"), Some(&reader)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["name"], "Eiger Trail");
    assert_eq!(reply.data()["locations"].as_array().unwrap().len(), 2);

    let reply = app.get("/find/region/999", Some(&reader)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "find.not_found");

    let reply = app.get(&format!("/find/country/{country}"), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "find.not_authorized");

    let reply = app.get("/find/country/abc", Some(&reader)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "main.invalid_request");
}

#[tokio::test]
async fn test_list_filter_and_order() {
    let (app, auth) = curator_app().await;
    seed_catalog(&app, &auth).await;
    for (name, abbreviation) in [("Austria", "AT"), ("Slovenia", "SI")] {
        let body = json!({ "name": name, "abbreviation": abbreviation });
        created_id(&app, &auth, "/create/country", body).await;
    }

    let names = |reply: &common::Reply| -> Vec<String> {
        reply
            .data()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect()
    };

    let reply = app.get("/list/countries", Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.message(), "list.successful");
    assert_eq!(names(&reply), vec!["Austria", "Slovenia", "Switzerland"]);

    let reply = app
        .get("/list/countries?order_by=name&dir=desc&limit=2", Some(&auth))
        .await;
    assert_eq!(names(&reply), vec!["Switzerland", "Slovenia"]);

    let reply = app.get("/list/countries?term=sl", Some(&auth)).await;
    assert_eq!(names(&reply), vec!["Slovenia"]);

    let reply = app.get("/list/countries?order_by=password", Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "list.invalid_order");

    let reply = app.get("/list/locations?region_id=999", Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.data().as_array().unwrap().is_empty());

    let reply = app.get("/list/countries", None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "list.not_authorized");
}

#[tokio::test]
async fn test_activity_search() {
    let (app, auth) = curator_app().await;
    seed_catalog(&app, &auth).await;

    let reply = app.get("/find/activities/search?term=north", Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data().as_array().unwrap().len(), 1);

    // The list endpoint matches names only
    let reply = app.get("/list/activities?term=north", Some(&auth)).await;
    assert!(reply.data().as_array().unwrap().is_empty());

    let reply = app.get("/find/activities/search", Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "find.missing_parameter");
}

#[tokio::test]
async fn test_nearby_activities() {
    let (app, auth) = curator_app().await;
    let (_, activity) = seed_catalog(&app, &auth).await;

    // Interlaken: Grindelwald is about 16 km away, Kandersteg about 26 km
    let reply = app
        .get("/find/activities/nearby?lat=46.686&long=7.863&dist=50", Some(&auth))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let found = reply.data().as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"].as_i64().unwrap(), activity);
    assert_eq!(found[0]["location_name"], "Grindelwald");

    let reply = app
        .get("/find/activities/nearby?lat=46.686&long=7.863&dist=5", Some(&auth))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.data().as_array().unwrap().is_empty());

    let reply = app
        .get("/find/activities/nearby?lat=46.686&long=7.863", Some(&auth))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "find.missing_parameter");
    assert_eq!(reply.data()["missing"], "dist");
}

#[tokio::test]
async fn test_location_types() {
    let (app, auth) = curator_app().await;
    seed_catalog(&app, &auth).await;

    let reply = app
        .post("/create/location_type", Some(&auth), json!({ "name": "Trailhead" }))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["entity"], "LocationType");
    let trailhead = reply.data()["id"].as_i64().unwrap();

    let reply = app
        .post("/create/location_type", Some(&auth), json!({ "name": "Trailhead" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.duplicate_params");

    let hut = created_id(
        &app,
        &auth,
        "/create/location",
        json!({
            "name": "Gleckstein Hut",
            "lat": 46.632,
            "long": 8.089,
            "region_id": 1,
            "location_type_id": trailhead,
        }),
    )
    .await;

    let reply = app
        .get(&format!("/list/locations?location_type_id={trailhead}"), Some(&auth))
        .await;
    let locations = reply.data().as_array().unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0]["id"].as_i64().unwrap(), hut);

    let reply = app
        .post(
            &format!("/update/location_type/{trailhead}"),
            Some(&auth),
            json!({ "name": "Hut" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["name"], "Hut");

    let reply = app
        .post(
            &format!("/update/location_type/{trailhead}"),
            Some(&auth),
            json!({ "name": " " }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "update.invalid_parameter");

    let reply = app.get(&format!("/find/location_type/{trailhead}"), Some(&auth)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["name"], "Hut");

    let reply = app.get("/list/location_types", Some(&auth)).await;
    assert_eq!(reply.data().as_array().unwrap().len(), 1);

    let reply = app
        .post(
            "/create/location",
            Some(&auth),
            json!({
                "name": "Ghost",
                "lat": 46.0,
                "long": 8.0,
                "region_id": 1,
                "location_type_id": 999,
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.invalid_parameter");
}

#[tokio::test]
async fn test_comments() {
    let (app, auth) = curator_app().await;
    let (_, activity) = seed_catalog(&app, &auth).await;
    app.active_user("hiker", "pw", "User").await;
    app.active_user("other", "pw", "User").await;
    app.active_user("reader", "pw", "Test User").await;
    let hiker = basic("hiker", "pw");

    let body = json!({ "body": "Snow above 2000 m", "activity_id": activity });
    let reply = app.post("/create/comment", Some(&basic("reader", "pw")), body.clone()).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "create.not_authorized");

    let reply = app.post("/create/comment", Some(&hiker), body).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["entity"], "Comment");
    assert_eq!(reply.data()["author"], "hiker");
    assert_eq!(reply.data()["disabled"], false);
    let comment = reply.data()["id"].as_i64().unwrap();

    let reply = app
        .post("/create/comment", Some(&hiker), json!({ "activity_id": activity }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.data()["missing"], "body");

    let reply = app
        .post("/create/comment", Some(&hiker), json!({ "body": "Hi", "activity_id": 999 }))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.message(), "create.invalid_parameter");

    let uri = format!("/update/comment/{comment}");
    let reply = app.post(&uri, Some(&hiker), json!({ "body": "Snow above 2200 m" })).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["body"], "Snow above 2200 m");

    // Only the author may edit, and only moderators may disable
    let reply = app.post(&uri, Some(&basic("other", "pw")), json!({ "body": "Mine" })).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "update.not_authorized");
    let reply = app.post(&uri, Some(&hiker), json!({ "disabled": true })).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let listing = format!("/list/comments?activity_id={activity}");
    let reply = app.get(&listing, Some(&basic("reader", "pw"))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data().as_array().unwrap().len(), 1);

    let reply = app.post(&uri, Some(&auth), json!({ "disabled": true })).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data()["disabled"], true);

    let reply = app.get(&listing, Some(&basic("reader", "pw"))).await;
    assert!(reply.data().as_array().unwrap().is_empty());
    let reply = app.get(&listing, Some(&auth)).await;
    assert_eq!(reply.data().as_array().unwrap().len(), 1);

    let reply = app.post("/update/comment/999", Some(&auth), json!({ "body": "x" })).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.message(), "update.not_found");
}
