use crate::fixtures::test_app::TestApp;
use serde_json::Value;

async fn create_post(app: &TestApp, token: &str, body: Value) -> Value {
    let resp = app
        .auth_post("/api/bulletin", token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

async fn list_posts(app: &TestApp, token: &str, query: &str) -> Vec<Value> {
    let resp = app
        .auth_get(&format!("/api/bulletin{}", query), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

async fn upload_image(app: &TestApp, token: &str, filename: &str) -> Value {
    let form = reqwest::multipart::Form::new().part("file", TestApp::png_part(filename));
    let resp = app
        .auth_post("/api/bulletin/image", token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    resp.json().await.unwrap()
}

fn titles(posts: &[Value]) -> Vec<&str> {
    posts.iter().map(|p| p["title"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn create_post_snapshots_author() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let post = create_post(
        &app,
        &b.resident_a.access_token,
        serde_json::json!({
            "title": "Gato perdido",
            "description": "Gris, responde a Michi",
            "category": "lost",
        }),
    )
    .await;
    assert_eq!(post["title"], "Gato perdido");
    assert_eq!(post["category"], "lost");
    assert_eq!(post["author_id"], b.resident_a.id.as_str());
    assert_eq!(post["author_name"], "Ana Torres");
    assert_eq!(post["author_role"], "resident");
    assert!(post["image_url"].is_null());

    let post = create_post(
        &app,
        &b.concierge.access_token,
        serde_json::json!({ "title": "Corte de agua", "description": "Martes 10:00" }),
    )
    .await;
    assert_eq!(post["category"], "announcement");
    assert_eq!(post["author_role"], "concierge");
}

#[tokio::test]
async fn posts_are_listed_newest_first_and_by_author() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    for (token, title) in [
        (&b.resident_a.access_token, "Primero"),
        (&b.concierge.access_token, "Segundo"),
        (&b.resident_a.access_token, "Tercero"),
    ] {
        create_post(
            &app,
            token,
            serde_json::json!({ "title": title, "description": "" }),
        )
        .await;
    }

    let all = list_posts(&app, &b.resident_b.access_token, "").await;
    assert_eq!(titles(&all), vec!["Tercero", "Segundo", "Primero"]);

    let by_a = list_posts(
        &app,
        &b.resident_b.access_token,
        &format!("?author_id={}", b.resident_a.id),
    )
    .await;
    assert_eq!(titles(&by_a), vec!["Tercero", "Primero"]);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let resp = app
        .auth_post("/api/bulletin", &b.resident_a.access_token)
        .json(&serde_json::json!({ "title": " ", "description": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn update_post() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.resident_a.access_token;

    let post = create_post(
        &app,
        token,
        serde_json::json!({ "title": "Bicicleta", "description": "Encontrada", "category": "found" }),
    )
    .await;
    let path = format!("/api/bulletin/{}", post["id"].as_str().unwrap());

    let resp = app
        .auth_put(&path, token)
        .json(&serde_json::json!({ "description": "Ya fue devuelta", "category": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["title"], "Bicicleta");
    assert_eq!(updated["description"], "Ya fue devuelta");
    assert_eq!(updated["category"], "other");

    let resp = app
        .auth_put("/api/bulletin/000000000000000000000000", token)
        .json(&serde_json::json!({ "title": "Nada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn any_user_can_delete_a_post() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let post = create_post(
        &app,
        &b.resident_a.access_token,
        serde_json::json!({ "title": "Venta de garage", "description": "" }),
    )
    .await;
    let path = format!("/api/bulletin/{}", post["id"].as_str().unwrap());

    let resp = app
        .auth_delete(&path, &b.resident_b.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert!(list_posts(&app, &b.resident_a.access_token, "").await.is_empty());

    let resp = app
        .auth_delete(&path, &b.resident_b.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn post_with_image_and_cleanup_on_delete() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.resident_a.access_token;

    let upload = upload_image(&app, token, "gato.png").await;
    let key = upload["key"].as_str().unwrap();
    assert!(key.starts_with("anuncios/"));
    assert!(key.ends_with("_gato.png"));

    let post = create_post(
        &app,
        token,
        serde_json::json!({ "title": "Gato", "description": "", "image_key": key }),
    )
    .await;
    assert_eq!(post["image_url"], upload["url"]);
    let file = app.storage_root().join(key);
    assert!(file.exists());

    let resp = app
        .auth_delete(&format!("/api/bulletin/{}", post["id"].as_str().unwrap()), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert!(!file.exists());
}

#[tokio::test]
async fn delete_succeeds_when_image_is_already_gone() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;
    let token = &b.resident_a.access_token;

    let upload = upload_image(&app, token, "gato.png").await;
    let key = upload["key"].as_str().unwrap();
    let post = create_post(
        &app,
        token,
        serde_json::json!({ "title": "Gato", "description": "", "image_key": key }),
    )
    .await;

    std::fs::remove_file(app.storage_root().join(key)).unwrap();

    let resp = app
        .auth_delete(&format!("/api/bulletin/{}", post["id"].as_str().unwrap()), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert!(list_posts(&app, token, "").await.is_empty());
}

#[tokio::test]
async fn foreign_image_keys_are_rejected() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    for key in ["profile-photos/abc", "anuncios/../secret"] {
        let resp = app
            .auth_post("/api/bulletin", &b.resident_a.access_token)
            .json(&serde_json::json!({ "title": "X", "description": "", "image_key": key }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "{key} should be rejected");
    }
}
