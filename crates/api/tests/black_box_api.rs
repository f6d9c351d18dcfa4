use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use addressbook_infra::AppConfig;

const JWT_SECRET: &str = "black-box-secret";
const PASSWORD: &str = "correct-horse-battery";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let mut config = AppConfig::default();
        config.tokens.secret = Some(JWT_SECRET.to_string());
        config.bootstrap_admins = vec!["root".to_string()];

        // Same router as prod, in-memory stores, ephemeral port.
        let services = addressbook_api::app::services::AppServices::in_memory(&config)
            .await
            .expect("failed to build services");
        let app = addressbook_api::app::build_app(std::sync::Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "userName": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
                "firstName": "Test",
                "lastName": username,
            }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "userName": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register + login; returns the login envelope's `value`.
    async fn session(&self, username: &str) -> Value {
        assert_eq!(self.register(username).await.status(), StatusCode::CREATED);
        let res = self.login(username, PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["value"].clone()
    }

    async fn create_address(&self, token: &str, street: &str, city: &str, state: &str) -> Value {
        let res = self
            .client
            .post(self.url("/api/addresses"))
            .bearer_auth(token)
            .json(&json!({
                "address": {
                    "streetAddress": street,
                    "city": city,
                    "state": state,
                    "postalCode": "97201",
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["value"].clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, issued_minutes_ago: i64, lifetime_minutes: i64) -> String {
    let iat = Utc::now() - ChronoDuration::minutes(issued_minutes_ago);
    let claims = json!({
        "sub": "01890a5d-ac96-774b-bcce-b302099a8057",
        "name": "Mallory",
        "email": "mallory@example.com",
        "roles": ["admin"],
        "iss": "addressbook",
        "aud": "addressbook-clients",
        "iat": iat.timestamp(),
        "exp": (iat + ChronoDuration::minutes(lifetime_minutes)).timestamp(),
        "jti": "01890a5d-ac96-774b-bcce-b302099a8058",
    });

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_enveloped() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 200);
}

#[tokio::test]
async fn wrong_method_and_unknown_path_are_enveloped() {
    let srv = TestServer::spawn().await;

    let res = srv.client.delete(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key(reqwest::header::ALLOW));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 405);
    assert_eq!(body["errors"][0]["code"], "MethodNotAllowed");

    let res = srv.client.get(srv.url("/no/such/path")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 404);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/api/addresses")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["errors"][0]["code"], "Unauthorized");
}

#[tokio::test]
async fn forged_and_expired_tokens_are_rejected() {
    let srv = TestServer::spawn().await;

    for token in [
        mint_jwt("some-other-secret", 0, 15),
        mint_jwt(JWT_SECRET, 30, 15),
        "not-a-jwt".to_string(),
    ] {
        let res = srv
            .client
            .get(srv.url("/api/addresses"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "token {token} was accepted");
    }
}

#[tokio::test]
async fn duplicate_registration_conflicts_and_first_user_still_logs_in() {
    let srv = TestServer::spawn().await;

    assert_eq!(srv.register("ada").await.status(), StatusCode::CREATED);
    let res = srv.register("ada").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 409);

    assert_eq!(srv.login("ada", PASSWORD).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_get_the_same_answer() {
    let srv = TestServer::spawn().await;
    srv.register("ada").await;

    let wrong = srv.login("ada", "wrong-password").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong: Value = wrong.json().await.unwrap();

    let unknown = srv.login("nobody", PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong["message"], "Invalid username or password");
    assert_eq!(wrong["message"], unknown["message"]);
}

#[tokio::test]
async fn logout_blacklists_the_access_token() {
    let srv = TestServer::spawn().await;
    let session = srv.session("ada").await;
    let token = session["token"].as_str().unwrap().to_string();

    let res = srv
        .client
        .get(srv.url("/api/addresses"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/api/auth/logout"))
        .bearer_auth(&token)
        .json(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url("/api/addresses"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_and_stale_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let session = srv.session("ada").await;
    let user_id = session["user"]["id"].as_str().unwrap().to_string();
    let first = session["refreshToken"].as_str().unwrap().to_string();

    let refresh = |token: String| {
        srv.client
            .post(srv.url("/api/auth/refresh"))
            .json(&json!({ "userId": user_id, "refreshToken": token }))
            .send()
    };

    let res = refresh(first.clone()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let second = body["value"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert!(body["value"]["token"].as_str().is_some());

    let res = refresh(first).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid refresh token");

    assert_eq!(refresh(second).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_for_unknown_user_is_not_found() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/api/auth/refresh"))
        .json(&json!({
            "userId": "01890a5d-ac96-774b-bcce-b302099a8057",
            "refreshToken": "anything",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn address_lifecycle_create_get_update_delete() {
    let srv = TestServer::spawn().await;
    let token = srv.session("ada").await["token"].as_str().unwrap().to_string();

    let created = srv.create_address(&token, "1 Main St", "Portland", "OR").await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .get(srv.url(&format!("/api/addresses/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"]["address"]["city"], "Portland");

    let res = srv
        .client
        .put(srv.url("/api/addresses"))
        .bearer_auth(&token)
        .json(&json!({
            "address": {
                "id": id,
                "streetAddress": "2 Main St",
                "streetAddress2": "Suite 5",
                "city": "Salem",
                "state": "OR",
                "postalCode": "97301",
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"]["city"], "Salem");
    assert_eq!(body["value"]["streetAddress2"], "Suite 5");

    let res = srv
        .client
        .delete(srv.url(&format!("/api/addresses/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url(&format!("/api/addresses/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_address_is_not_found_and_bad_input_is_400() {
    let srv = TestServer::spawn().await;
    let token = srv.session("ada").await["token"].as_str().unwrap().to_string();

    let res = srv
        .client
        .get(srv.url("/api/addresses/01890a5d-ac96-774b-bcce-b302099a8057"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .get(srv.url("/api/addresses/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .post(srv.url("/api/addresses"))
        .bearer_auth(&token)
        .json(&json!({ "address": { "streetAddress": "", "city": "X", "state": "Y", "postalCode": "1" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .get(srv.url("/api/addresses?pageSize=1000"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn filter_is_case_insensitive_and_stable() {
    let srv = TestServer::spawn().await;
    let token = srv.session("ada").await["token"].as_str().unwrap().to_string();

    srv.create_address(&token, "1 Elm Street", "Portland", "OR").await;
    srv.create_address(&token, "2 Oak Avenue", "Elmira", "NY").await;
    srv.create_address(&token, "3 Pine Road", "Boise", "ID").await;
    srv.create_address(&token, "4 Birch Lane", "Austin", "TX").await;

    let filter = || {
        srv.client
            .post(srv.url("/api/addresses/filter"))
            .bearer_auth(&token)
            .json(&json!({ "searchText": "  eLM ", "pageNumber": 1, "pageSize": 10 }))
            .send()
    };

    let first: Value = filter().await.unwrap().json().await.unwrap();
    let second: Value = filter().await.unwrap().json().await.unwrap();

    assert_eq!(first["value"]["totalCount"], 2);
    assert_eq!(first["value"]["addressList"], second["value"]["addressList"]);
    let streets: Vec<&str> = first["value"]["addressList"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["streetAddress"].as_str().unwrap())
        .collect();
    assert_eq!(streets, vec!["1 Elm Street", "2 Oak Avenue"]);

    let res = srv
        .client
        .get(srv.url("/api/addresses?pageNumber=2&pageSize=3"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["value"]["totalCount"], 4);
    assert_eq!(page["value"]["addressList"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn role_management_requires_admin() {
    let srv = TestServer::spawn().await;
    let admin = srv.session("root").await;
    let admin_token = admin["token"].as_str().unwrap().to_string();
    let user = srv.session("ada").await;
    let user_token = user["token"].as_str().unwrap().to_string();
    let user_id = user["user"]["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url("/api/admin/Roles"))
        .bearer_auth(&user_token)
        .json(&json!({ "name": "auditor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .post(srv.url("/api/admin/Roles"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "auditor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let role_id = body["value"]["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url("/api/admin/Roles"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "auditor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .post(srv.url(&format!("/api/admin/Users/{user_id}/roles")))
        .bearer_auth(&admin_token)
        .json(&json!({ "roleId": role_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url(&format!("/api/auth/{user_id}")))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let roles = body["value"]["roles"].as_array().unwrap();
    assert!(roles.iter().any(|r| r == "auditor"));

    let res = srv
        .client
        .get(srv.url("/api/admin/Users"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let names: Vec<&str> = body["value"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["userName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ada", "root"]);
}
