use crate::fixtures::test_app::TestApp;
use serde_json::Value;

async fn check_in(app: &TestApp, token: &str, visitor: &str, apartment: &str) -> Value {
    let resp = app
        .auth_post("/api/visitor", token)
        .json(&serde_json::json!({
            "visitor_name": visitor,
            "visitor_document": "12.345.678-9",
            "visiting_apartment": apartment,
            "visiting_resident": "Ana Torres",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

async fn list(app: &TestApp, token: &str, query: &str) -> Vec<Value> {
    let resp = app
        .auth_get(&format!("/api/visitor{}", query), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

fn names(entries: &[Value]) -> Vec<&str> {
    entries
        .iter()
        .map(|e| e["visitor_name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn residents_cannot_use_the_visitor_log() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let resp = app
        .auth_get("/api/visitor", &b.resident_a.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_post("/api/visitor", &b.resident_a.access_token)
        .json(&serde_json::json!({ "visitor_name": "Intruso" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn check_in_records_concierge_and_entry_time() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let entry = check_in(&app, &b.concierge.access_token, "Pedro Visita", "4B").await;
    assert_eq!(entry["visitor_name"], "Pedro Visita");
    assert_eq!(entry["visiting_apartment"], "4B");
    assert_eq!(entry["concierge_id"], b.concierge.id.as_str());
    assert_eq!(entry["concierge_name"], "Carlos Conserje");
    assert!(entry["entry_time"].is_string());
    assert!(entry["exit_time"].is_null());
    assert_eq!(entry["inside"], true);

    let resp = app
        .auth_post("/api/visitor", &b.concierge.access_token)
        .json(&serde_json::json!({ "visitor_name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn exit_can_only_be_registered_once() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.concierge.access_token;

    let entry = check_in(&app, token, "Pedro Visita", "4B").await;
    let id = entry["id"].as_str().unwrap();

    let resp = app
        .auth_post(&format!("/api/visitor/{}/exit", id), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let closed: Value = resp.json().await.unwrap();
    assert!(closed["exit_time"].is_string());
    assert_eq!(closed["inside"], false);

    let resp = app
        .auth_post(&format!("/api/visitor/{}/exit", id), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .auth_post("/api/visitor/000000000000000000000000/exit", token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn category_and_search_filters() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.concierge.access_token;

    let gone = check_in(&app, token, "Pedro Visita", "4B").await;
    check_in(&app, token, "Maria Gasfiter", "7A").await;
    check_in(&app, token, "Pedro Delivery", "7A").await;

    app.auth_post(&format!("/api/visitor/{}/exit", gone["id"].as_str().unwrap()), token)
        .send()
        .await
        .unwrap();

    // Newest first
    let all = list(&app, token, "").await;
    assert_eq!(names(&all), vec!["Pedro Delivery", "Maria Gasfiter", "Pedro Visita"]);

    let inside = list(&app, token, "?category=active").await;
    assert_eq!(names(&inside), vec!["Pedro Delivery", "Maria Gasfiter"]);

    let today = list(&app, token, "?category=today&tz_offset_minutes=0").await;
    assert_eq!(today.len(), 3);

    let pedros = list(&app, token, "?search=pedro").await;
    assert_eq!(names(&pedros), vec!["Pedro Delivery", "Pedro Visita"]);

    let inside_pedros = list(&app, token, "?category=open&search=PEDRO").await;
    assert_eq!(names(&inside_pedros), vec!["Pedro Delivery"]);

    // Search text is matched literally, not as a pattern
    let none = list(&app, token, "?search=.*").await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_by_apartment_and_concierge() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.concierge.access_token;

    check_in(&app, token, "Pedro Visita", "4B").await;
    check_in(&app, token, "Maria Gasfiter", "7A").await;

    let apartment = list(&app, token, "?apartment=7A").await;
    assert_eq!(names(&apartment), vec!["Maria Gasfiter"]);

    let by_concierge = list(&app, token, &format!("?concierge_id={}", b.concierge.id)).await;
    assert_eq!(by_concierge.len(), 2);
}

#[tokio::test]
async fn update_get_and_delete_entry() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.concierge.access_token;

    let entry = check_in(&app, token, "Pedro Visita", "4B").await;
    let path = format!("/api/visitor/{}", entry["id"].as_str().unwrap());

    let resp = app
        .auth_put(&path, token)
        .json(&serde_json::json!({ "notes": "Trae herramientas", "vehicle_plate": "AB-CD-12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["notes"], "Trae herramientas");
    assert_eq!(updated["vehicle_plate"], "AB-CD-12");
    assert_eq!(updated["visitor_name"], "Pedro Visita");

    let resp = app.auth_get(&path, token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app.auth_delete(&path, token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app.auth_get(&path, token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app.auth_delete(&path, token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
