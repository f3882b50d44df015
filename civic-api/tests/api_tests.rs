//! Integration tests for civic-api endpoints
//!
//! Each test builds the router over a fresh SQLite file. Most tests run with
//! auth disabled and identify the caller through X-User-Id; the session tests
//! enable auth.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use civic_api::{build_router, AppState};
use civic_common::config::CivicConfig;
use civic_common::db::init_database;
use civic_common::db::sessions::create_session;
use civic_common::ReferenceData;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Test helper: fresh database in a temp dir
async fn setup_test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("civic.db"))
        .await
        .expect("Should create test database");
    (dir, pool)
}

/// Test helper: app with auth disabled
fn setup_app(db: SqlitePool) -> axum::Router {
    let mut config = CivicConfig::default();
    config.auth.enabled = false;
    setup_app_with(db, config)
}

fn setup_app_with(db: SqlitePool, config: CivicConfig) -> axum::Router {
    let reference = ReferenceData::builtin().unwrap();
    build_router(AppState::new(db, reference, config))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn user_request(method: &str, uri: &str, user_id: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn registration(n: usize, constituency: &str, ward: &str) -> Value {
    let email = format!("agent{}@example.org", n);
    json!({
        "email": email,
        "confirm_email": email,
        "first_name": "Njeri",
        "last_name": format!("Wambui{}", n),
        "county": "Nairobi",
        "constituency": constituency,
        "ward": ward,
        "date_of_birth": "1992-11-03",
        "national_id": format!("{:08}", 40000000 + n),
    })
}

fn submission(serial: &str, constituency: &str, ward: &str, station: &str) -> Value {
    json!({
        "serial_number": serial,
        "image_key": format!("form34a/{}.jpg", serial),
        "county": "Nairobi",
        "constituency": constituency,
        "ward": ward,
        "polling_station": station,
        "latitude": -1.28,
        "longitude": 36.82,
        "candidates": [
            {"candidate_first_name": "Jane", "candidate_last_name": "Doe", "party_name": "PartyX", "votes": 100},
            {"candidate_first_name": "John", "candidate_last_name": "Roe", "party_name": "PartyY", "votes": 60}
        ]
    })
}

async fn register(app: &axum::Router, user: &str, n: usize, constituency: &str, ward: &str) -> Value {
    let response = app
        .clone()
        .oneshot(user_request("POST", "/api/agents/register", user, Some(registration(n, constituency, ward))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_json(response.into_body()).await
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app_with(db, CivicConfig::default());

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "civic-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_user_header_rejected_when_auth_disabled() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("GET", "/api/agents/me")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bearer_required_when_auth_enabled() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app_with(db, CivicConfig::default());

    // X-User-Id is not trusted with auth on
    let response = app
        .clone()
        .oneshot(user_request("GET", "/api/agents/me", "user-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/agents/me")
        .header(header::AUTHORIZATION, "Bearer not-a-session")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn bearer_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_session_and_biometric_sign_in() {
    let (_dir, db) = setup_test_db().await;
    let session = create_session(&db, "user-1", 1).await.unwrap();
    let app = setup_app_with(db, CivicConfig::default());

    let response = app
        .clone()
        .oneshot(bearer_request("POST", "/api/agents/register", &session.token, Some(registration(1, "Kasarani", "Ruai"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let credentials = json!({"email": "agent1@example.org", "biometric_public_key": "device-key-1"});

    // Not enrolled yet
    let response = app.clone().oneshot(json_request("POST", "/api/biometric/verify", credentials.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(bearer_request(
            "POST",
            "/api/biometric/register",
            &session.token,
            Some(json!({"biometric_public_key": "device-key-1"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["civic_code"], "NAIROBI-002-0004-01");

    let response = app.clone().oneshot(json_request("POST", "/api/biometric/verify", credentials)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user_id"], "user-1");

    let response = app.oneshot(bearer_request("GET", "/api/agents/me", &token, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["email"], "agent1@example.org");
    assert_eq!(body["biometric_enabled"], true);
}

#[tokio::test]
async fn test_biometric_register_requires_own_session() {
    let (_dir, db) = setup_test_db().await;
    let owner = create_session(&db, "owner", 1).await.unwrap();
    let stranger = create_session(&db, "stranger", 1).await.unwrap();
    let app = setup_app_with(db, CivicConfig::default());

    let response = app
        .clone()
        .oneshot(bearer_request("POST", "/api/agents/register", &owner.token, Some(registration(1, "Kasarani", "Ruai"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let foreign_key = json!({"email": "agent1@example.org", "biometric_public_key": "other-key"});

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/biometric/register", foreign_key.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A session without an agent profile cannot enroll anyone
    let response = app
        .clone()
        .oneshot(bearer_request("POST", "/api/biometric/register", &stranger.token, Some(foreign_key.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(json_request("POST", "/api/biometric/verify", foreign_key)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Agents
// =============================================================================

#[tokio::test]
async fn test_register_and_fetch_profile() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let agent = register(&app, "user-1", 1, "Kasarani", "Ruai").await;
    assert_eq!(agent["civic_code"], "NAIROBI-002-0004-01");
    assert!(agent.get("national_id_hash").is_none(), "national ID digest leaked");

    let second = register(&app, "user-2", 2, "Kasarani", "Ruai").await;
    assert_eq!(second["civic_code"], "NAIROBI-002-0004-02");

    let response = app
        .clone()
        .oneshot(user_request("GET", "/api/agents/me", "user-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["civic_code"], "NAIROBI-002-0004-01");

    let response = app
        .oneshot(user_request("PUT", "/api/agents/me", "user-1", Some(json!({"last_name": "Mwangi"}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["last_name"], "Mwangi");
    assert_eq!(body["first_name"], "Njeri");
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    register(&app, "user-1", 1, "Kasarani", "Ruai").await;
    let response = app
        .oneshot(user_request("POST", "/api/agents/register", "user-1", Some(registration(2, "Kasarani", "Ruai"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_invalid_input() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let mut body = registration(1, "Kasarani", "Ruai");
    body["confirm_email"] = json!("someone@example.org");

    let response = app
        .oneshot(user_request("POST", "/api/agents/register", "user-1", Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_profile_before_registration_not_found() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(user_request("GET", "/api/agents/me", "user-1", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Form34A and incident videos
// =============================================================================

#[tokio::test]
async fn test_submit_form34a_once() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);
    register(&app, "user-1", 1, "Kasarani", "Ruai").await;

    let response = app
        .clone()
        .oneshot(user_request("GET", "/api/form34a/my-submission", "user-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_json(response.into_body()).await.is_null());

    let form = submission("S-1", "Kasarani", "Ruai", "Ruai Primary School");
    let response = app
        .clone()
        .oneshot(user_request("POST", "/api/form34a/submit", "user-1", Some(form.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["serial_number"], "S-1");
    assert_eq!(body["has_discrepancy"], false);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(user_request("POST", "/api/form34a/submit", "user-1", Some(form)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(user_request("GET", "/api/form34a/my-submission", "user-1", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["serial_number"], "S-1");
}

#[tokio::test]
async fn test_oversized_vote_count_rejected() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);
    register(&app, "user-1", 1, "Kasarani", "Ruai").await;

    let mut form = submission("S-1", "Kasarani", "Ruai", "Ruai Primary School");
    form["candidates"][0]["votes"] = json!(i64::MAX / 2 + 1);
    let response = app
        .clone()
        .oneshot(user_request("POST", "/api/form34a/submit", "user-1", Some(form)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/candidate-votes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!([]));
}

#[tokio::test]
async fn test_incident_video_limit() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);
    let agent = register(&app, "user-1", 1, "Kasarani", "Ruai").await;
    let civic_code = agent["civic_code"].as_str().unwrap().to_string();

    for letter in ["A", "B", "C"] {
        let video = json!({"video_key": format!("incidents/{}.mp4", letter), "latitude": -1.2, "longitude": 36.9});
        let response = app
            .clone()
            .oneshot(user_request("POST", "/api/incidents/videos", "user-1", Some(video)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["video_code"], format!("{}-{}", civic_code, letter));
    }

    let video = json!({"video_key": "incidents/D.mp4", "latitude": -1.2, "longitude": 36.9});
    let response = app
        .clone()
        .oneshot(user_request("POST", "/api/incidents/videos", "user-1", Some(video)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(user_request("GET", "/api/incidents/my-videos", "user-1", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/incident-videos?county=Nairobi"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["agent_civic_code"], civic_code);
}

// =============================================================================
// Dashboard
// =============================================================================

#[tokio::test]
async fn test_dashboard_reports() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    register(&app, "user-1", 1, "Kasarani", "Ruai").await;
    register(&app, "user-2", 2, "Kasarani", "Ruai").await;
    register(&app, "user-3", 3, "Kamukunji", "Pumwani").await;

    for (user, form) in [
        ("user-1", submission("S-1", "Kasarani", "Ruai", "Ruai Primary School")),
        ("user-2", submission("S-1", "Kasarani", "Ruai", "Ruai Primary School")),
        ("user-3", submission("S-3", "Kamukunji", "Pumwani", "Pumwani Primary School")),
    ] {
        let response = app
            .clone()
            .oneshot(user_request("POST", "/api/form34a/submit", user, Some(form)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/candidate-votes?county=Nairobi"))
        .await
        .unwrap();
    let totals = extract_json(response.into_body()).await;
    assert_eq!(totals[0]["candidate_last_name"], "Doe");
    assert_eq!(totals[0]["total_votes"], 300);
    assert_eq!(totals[0]["forms_count"], 3);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/serial-discrepancies"))
        .await
        .unwrap();
    let groups = extract_json(response.into_body()).await;
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["serial_number"], "S-1");
    assert_eq!(groups[0]["submission_count"], 2);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/extra-submissions?ward=Ruai"))
        .await
        .unwrap();
    let extra = extract_json(response.into_body()).await;
    assert_eq!(extra.as_array().unwrap().len(), 1);
    assert_eq!(extra[0]["submissions"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/duplicate-submissions"))
        .await
        .unwrap();
    let dups = extract_json(response.into_body()).await;
    assert_eq!(dups.as_array().unwrap().len(), 2);
    assert_eq!(dups[0]["type"], "same_station");
    assert_eq!(dups[0]["polling_station"], "Ruai Primary School");
    assert_eq!(dups[1]["type"], "same_serial");
    assert_eq!(dups[1]["serial_number"], "S-1");

    // Empty filter values mean "no filter"
    let response = app
        .oneshot(test_request("GET", "/api/dashboard/duplicate-submissions?county=&ward="))
        .await
        .unwrap();
    let dups = extract_json(response.into_body()).await;
    assert_eq!(dups.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_submissions_after_seed() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/admin/polling-stations/seed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let seeded = body["seeded"].as_u64().unwrap();
    assert_eq!(seeded as usize, ReferenceData::builtin().unwrap().polling_stations().len());

    register(&app, "user-1", 1, "Kamukunji", "Pumwani").await;
    let mut form = submission("S-1", "Kamukunji", "Pumwani", "Pumwani Primary Sch");
    form["station_code"] = json!("KAM-001-0004-001");
    app.clone()
        .oneshot(user_request("POST", "/api/form34a/submit", "user-1", Some(form)))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/missing-submissions?ward=Pumwani"))
        .await
        .unwrap();
    let missing = extract_json(response.into_body()).await;
    assert_eq!(missing.as_array().unwrap().len(), 1);
    assert_eq!(missing[0]["station_code"], "KAM-001-0004-001");
    assert_eq!(missing[0]["has_submission"], false);

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/dashboard/missing-submissions?ward=Pumwani&station_match=station_code",
        ))
        .await
        .unwrap();
    let missing = extract_json(response.into_body()).await;
    assert!(missing.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_form34a_search() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);
    let agent = register(&app, "user-1", 1, "Kasarani", "Ruai").await;
    let code = agent["civic_code"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/form34a-search?agent_code=NAIROBI-999-9999-99"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/dashboard/form34a-search?agent_code={}", code);
    let response = app.clone().oneshot(test_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_json(response.into_body()).await.is_null());

    app.clone()
        .oneshot(user_request(
            "POST",
            "/api/form34a/submit",
            "user-1",
            Some(submission("S-5", "Kasarani", "Ruai", "Ruai Primary School")),
        ))
        .await
        .unwrap();

    let response = app.oneshot(test_request("GET", &uri)).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["serial_number"], "S-5");
    assert_eq!(body["candidates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_incident_videos_require_county() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/dashboard/incident-videos"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(test_request("GET", "/api/dashboard/incident-videos?county="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Locations
// =============================================================================

#[tokio::test]
async fn test_location_lookups() {
    let (_dir, db) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/locations/counties"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let counties = extract_json(response.into_body()).await;
    assert_eq!(counties.as_array().unwrap().len(), 47);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/locations/wards/Kasarani"))
        .await
        .unwrap();
    let wards = extract_json(response.into_body()).await;
    assert!(wards.as_array().unwrap().iter().any(|w| w["name"] == "Ruai"));

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/locations/constituencies/Nairobi"))
        .await
        .unwrap();
    let constituencies = extract_json(response.into_body()).await;
    assert!(constituencies.as_array().unwrap().iter().any(|c| c["code"] == "002"));

    let response = app
        .oneshot(test_request("GET", "/api/locations/constituencies/Atlantis"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_json(response.into_body()).await.as_array().unwrap().is_empty());
}
