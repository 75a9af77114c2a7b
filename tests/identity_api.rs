use forefy_provisioning::auth::{GoTrueClient, IdentityProvider, SignUpResponse};
use forefy_provisioning::error::{AppError, AuthError};
use forefy_provisioning::BackendClient;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;
use wiremock::{
    matchers::{body_json, body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn key(role: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "iss": "supabase", "role": role, "exp": 4_102_444_800u64 }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn client(server: &MockServer, key: &str) -> BackendClient {
    BackendClient::new(&server.uri(), key, Duration::from_secs(5)).unwrap()
}

fn user_json(id: Uuid, email: &str) -> serde_json::Value {
    json!({
        "id": id,
        "aud": "authenticated",
        "role": "authenticated",
        "email": email,
        "email_confirmed_at": null,
        "user_metadata": {},
        "created_at": "2025-03-01T10:00:00Z"
    })
}

#[tokio::test]
async fn test_sign_in_with_password() {
    let server = MockServer::start().await;
    let anon = key("anon");
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", anon.as_str()))
        .and(body_json(json!({ "email": "ana@forefy.com", "password": "Teste123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 4_102_444_800i64,
            "refresh_token": "refresh",
            "user": user_json(id, "ana@forefy.com")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, &anon));
    let session = gotrue.sign_in_with_password("ana@forefy.com", "Teste123").await.unwrap();
    assert_eq!(session.access_token, "user-access-token");
    assert_eq!(session.user_id(), id);
    assert!(!session.is_expired());
}

#[tokio::test]
async fn test_invalid_credentials_surface_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "error_code": "invalid_credentials",
            "msg": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    match gotrue.sign_in_with_password("ana@forefy.com", "nope").await {
        Err(AppError::BackendError(e)) => {
            assert_eq!(e.status, 400);
            assert_eq!(e.message, "Invalid login credentials");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_sign_up_sends_student_metadata() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "ana@forefy.com",
            "data": { "role": "student", "name": "Ana" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, "ana@forefy.com")))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    let response = gotrue
        .sign_up("ana@forefy.com", "Teste123", json!({ "name": "Ana", "role": "student" }))
        .await
        .unwrap();
    assert!(matches!(response, SignUpResponse::User(ref u) if u.id == id));
}

#[tokio::test]
async fn test_password_reset_request_carries_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .and(query_param("redirect_to", "https://app.forefy.com/reset-password"))
        .and(body_json(json!({ "email": "ana@forefy.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    gotrue
        .reset_password_for_email("ana@forefy.com", "https://app.forefy.com/reset-password")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_password_uses_session_token() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer user-access-token"))
        .and(header("apikey", "anon"))
        .and(body_json(json!({ "password": "n3w-password" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, "ana@forefy.com")))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    let user = gotrue.update_password("user-access-token", "n3w-password").await.unwrap();
    assert_eq!(user.id, id);
}

#[tokio::test]
async fn test_sign_out_is_local_scope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(query_param("scope", "local"))
        .and(header("authorization", "Bearer user-access-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    gotrue.sign_out("user-access-token").await.unwrap();
}

#[tokio::test]
async fn test_pkce_code_exchange() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "pkce"))
        .and(body_json(json!({ "auth_code": "callback-code", "code_verifier": "verifier" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "oauth-token",
            "refresh_token": "refresh",
            "user": user_json(id, "ana@gmail.com")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    let session = gotrue.exchange_code("callback-code", "verifier").await.unwrap();
    assert_eq!(session.access_token, "oauth-token");
    assert_eq!(session.user.email.as_deref(), Some("ana@gmail.com"));
}

#[tokio::test]
async fn test_list_users_walks_pages() {
    let server = MockServer::start().await;
    let service = key("service_role");
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "2"))
        .and(header("authorization", format!("Bearer {}", service).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [user_json(ids[0], "a@forefy.com"), user_json(ids[1], "b@forefy.com")],
            "aud": "authenticated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [user_json(ids[2], "c@forefy.com")],
            "aud": "authenticated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"))
        .with_admin(client(&server, &service))
        .unwrap()
        .with_page_size(2);
    let users = gotrue.list_users().await.unwrap();
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), ids);
}

#[tokio::test]
async fn test_admin_endpoints_need_service_role() {
    let server = MockServer::start().await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    let result = gotrue.list_users().await;
    assert!(matches!(result, Err(AppError::AuthError(AuthError::MissingServiceRole))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"));
    match gotrue.health().await {
        Err(AppError::BackendError(e)) => assert_eq!(e.status, 503),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_invite_goes_through_admin_client() {
    let server = MockServer::start().await;
    let service = key("service_role");
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/invite"))
        .and(header("authorization", format!("Bearer {}", service).as_str()))
        .and(body_partial_json(json!({
            "email": "ana@forefy.com",
            "data": { "cpf_to_set": "12345678901" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, "ana@forefy.com")))
        .expect(1)
        .mount(&server)
        .await;

    let gotrue = GoTrueClient::new(client(&server, "anon"))
        .with_admin(client(&server, &service))
        .unwrap();
    let user = gotrue
        .invite_user_by_email("ana@forefy.com", json!({ "cpf_to_set": "12345678901" }))
        .await
        .unwrap();
    assert_eq!(user.id, id);
}
