use serde_json::Value;

use super::test_app::TestApp;

pub const PASSWORD: &str = "Secreto123";

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// One concierge and two residents of the same building.
pub struct SeededBuilding {
    pub concierge: SeededUser,
    pub resident_a: SeededUser,
    pub resident_b: SeededUser,
}

fn seeded_user(json: &Value, email: &str) -> SeededUser {
    SeededUser {
        id: json["user"]["id"].as_str().unwrap().to_string(),
        email: email.to_string(),
        display_name: json["user"]["display_name"].as_str().unwrap().to_string(),
        access_token: json["access_token"].as_str().unwrap().to_string(),
        refresh_token: json["refresh_token"].as_str().unwrap().to_string(),
    }
}

impl TestApp {
    /// Register a user and return their auth info.
    pub async fn register_user(
        &self,
        email: &str,
        display_name: &str,
        role: &str,
        apartment: &str,
    ) -> SeededUser {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({
                "email": email,
                "password": PASSWORD,
                "display_name": display_name,
                "role": role,
                "apartment_number": apartment,
            }))
            .send()
            .await
            .expect("Register request failed");

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        assert_eq!(status, 201, "Register failed: {}", body);

        let json: Value = serde_json::from_str(&body).expect("Failed to parse register response");
        seeded_user(&json, email)
    }

    /// Login a user and return their auth info.
    pub async fn login_user(&self, email: &str, password: &str, role: &str) -> SeededUser {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "role": role,
            }))
            .send()
            .await
            .expect("Login request failed");

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        assert!(status.is_success(), "Login failed: {}", body);

        let json: Value = serde_json::from_str(&body).expect("Failed to parse login response");
        seeded_user(&json, email)
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub async fn seed_building(&self) -> SeededBuilding {
        let concierge = self
            .register_user("conserje@edificio.test", "Carlos Conserje", "concierge", "")
            .await;
        let resident_a = self
            .register_user("ana@edificio.test", "Ana Torres", "resident", "4B")
            .await;
        let resident_b = self
            .register_user("beto@edificio.test", "Beto Rios", "resident", "7A")
            .await;

        SeededBuilding {
            concierge,
            resident_a,
            resident_b,
        }
    }

    /// Opens (or resolves) the chat between the token holder and `peer_id`.
    pub async fn open_chat(&self, token: &str, peer_id: &str) -> String {
        let resp = self
            .auth_post("/api/chat", token)
            .json(&serde_json::json!({ "peer_id": peer_id }))
            .send()
            .await
            .expect("Open chat failed");
        assert_eq!(resp.status().as_u16(), 200);
        let json: Value = resp.json().await.unwrap();
        json["id"].as_str().unwrap().to_string()
    }

    pub async fn send_chat_message(&self, token: &str, chat_id: &str, text: &str) -> Value {
        let resp = self
            .auth_post(&format!("/api/chat/{}/message", chat_id), token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .expect("Send message failed");
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }

    /// A 1x1 PNG for upload tests.
    pub fn png_part(filename: &str) -> reqwest::multipart::Part {
        const PNG: [u8; 16] = [
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
        ];
        reqwest::multipart::Part::bytes(PNG.to_vec())
            .file_name(filename.to_string())
            .mime_str("image/png")
            .unwrap()
    }
}
