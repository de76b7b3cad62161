use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use hyperbot_core::auth::{hash_password, verify_password, PasswordError};
use hyperbot_core::domain::user::{
    NewUser, NewUserPoint, User, UserId, UserListQuery, UserPoint, UserRole,
};
use hyperbot_core::errors::DomainError;

use super::auth::IssuedTokens;
use super::{AdminUser, ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    pub page: u32,
    pub per_page: u32,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PageMetadata {
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub items: Vec<User>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Deserialize)]
pub struct CreatePointRequest {
    pub order_id: String,
    pub point: i64,
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(input) = payload?;
    if input.password.is_empty() {
        return Err(DomainError::InvalidInput("password is required".to_owned()).into());
    }

    let mut new_user = NewUser {
        username: input.username.trim().to_owned(),
        full_name: input.full_name.trim().to_owned(),
        hashed_password: String::new(),
        role: UserRole::User,
    };
    new_user.validate()?;
    new_user.hashed_password =
        hash_password(&input.password).map_err(|error| ApiError::internal(error.to_string()))?;

    let user = state.users.create(new_user).await?;
    info!(
        event_name = "api.user.created",
        correlation_id = "http",
        user_id = %user.id,
        "user created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<IssuedTokens>, ApiError> {
    let Json(input) = payload?;
    let user = state
        .users
        .find_by_username(input.username.trim())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user not found: {}", input.username.trim())))?;

    verify_password(&user.hashed_password, &input.password).map_err(|error| match error {
        PasswordError::Mismatch => ApiError::unauthorized(error.to_string()),
        PasswordError::Hash(_) => ApiError::internal(error.to_string()),
    })?;

    let issued = state.tokens.issue(&user).map_err(|error| ApiError::internal(error.to_string()))?;
    Ok(Json(issued))
}

pub async fn read_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(load_user(&state, caller.user_id).await?))
}

pub async fn read_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let id = user_id(path)?;
    Ok(Json(load_user(&state, id).await?))
}

/// Replies 200 with the updated user.
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(input) = payload?;
    let username = input.username.trim();
    let full_name = input.full_name.trim();
    if username.is_empty() {
        return Err(DomainError::InvalidInput("username is required".to_owned()).into());
    }
    if full_name.is_empty() {
        return Err(DomainError::InvalidInput("full_name is required".to_owned()).into());
    }

    let mut user = load_user(&state, caller.user_id).await?;
    user.username = username.to_owned();
    user.full_name = full_name.to_owned();
    let updated = state.users.update(user).await?;
    Ok(Json(updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = user_id(path)?;
    state.users.delete(id).await?;
    info!(
        event_name = "api.user.deleted",
        correlation_id = "http",
        user_id = %id,
        deleted_by = %caller.user_id,
        "user deleted"
    );
    Ok(Json(json!({})))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    params: Result<Query<ListUsersParams>, QueryRejection>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let Query(params) = params?;
    let query = UserListQuery::new(params.page, params.per_page, params.username)?;
    let (items, total) = state.users.list(&query).await?;
    Ok(Json(ListUsersResponse {
        items,
        metadata: PageMetadata { total, page: query.page, per_page: query.per_page },
    }))
}

pub async fn create_point(
    State(state): State<AppState>,
    _caller: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CreatePointRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserPoint>), ApiError> {
    let id = user_id(path)?;
    let Json(input) = payload?;
    if input.order_id.trim().is_empty() {
        return Err(DomainError::InvalidInput("order_id is required".to_owned()).into());
    }
    if input.point <= 0 {
        return Err(DomainError::InvalidInput("point must be positive".to_owned()).into());
    }

    let granted = NewUserPoint::granted_at(id, input.order_id.trim(), input.point, Utc::now());
    let point = state.points.create(granted).await?;
    Ok((StatusCode::CREATED, Json(point)))
}

fn user_id(path: Result<Path<i64>, PathRejection>) -> Result<UserId, ApiError> {
    let Path(id) = path?;
    if id < 1 {
        return Err(DomainError::InvalidInput("id must be at least 1".to_owned()).into());
    }
    Ok(UserId(id))
}

async fn load_user(state: &AppState, id: UserId) -> Result<User, ApiError> {
    state.users.find_by_id(id).await?.ok_or_else(|| ApiError::not_found(format!("user not found: {id}")))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use hyperbot_core::auth::hash_password;
    use hyperbot_core::domain::user::{NewUser, UserRole};
    use hyperbot_db::repositories::UserRepository;

    use crate::api::router;
    use crate::test_support::{read_json, TestApp};

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn seed(app: &TestApp, username: &str, role: UserRole) -> i64 {
        app.users
            .create(NewUser {
                username: username.to_owned(),
                full_name: format!("{username} full"),
                hashed_password: hash_password("secret-pass").expect("hash"),
                role,
            })
            .await
            .expect("seeded")
            .id
            .0
    }

    async fn login(app: &TestApp, username: &str) -> String {
        let response = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users/login",
                None,
                json!({ "username": username, "password": "secret-pass" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        body["access_token"].as_str().expect("access token").to_owned()
    }

    #[tokio::test]
    async fn create_user_returns_created_without_password_hash() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users",
                None,
                json!({ "username": "minh", "full_name": "Minh Le", "password": "pw" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["username"], "minh");
        assert_eq!(body["role"], "user");
        assert!(body.get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let app = TestApp::new();
        seed(&app, "minh", UserRole::User).await;

        let response = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users",
                None,
                json!({ "username": "minh", "full_name": "Other", "password": "pw" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_with_error_field() {
        let app = TestApp::new();

        let response = router(app.state())
            .oneshot(json_request("POST", "/users", None, json!({ "username": "minh" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_user_and_wrong_password() {
        let app = TestApp::new();
        seed(&app, "minh", UserRole::User).await;

        let unknown = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users/login",
                None,
                json!({ "username": "nobody", "password": "secret-pass" }),
            ))
            .await
            .expect("response");
        let wrong = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users/login",
                None,
                json!({ "username": "minh", "password": "nope" }),
            ))
            .await
            .expect("response");

        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_a_bearer_token() {
        let app = TestApp::new();
        let id = seed(&app, "minh", UserRole::User).await;

        let missing = router(app.state()).oneshot(get("/users/me", None)).await.expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(missing).await["error"], "authorization header is not provided");

        let basic = router(app.state())
            .oneshot(
                Request::get("/users/me")
                    .header("authorization", "Basic abc")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(read_json(basic).await["error"], "unsupported authorization type Basic");

        let token = login(&app, "minh").await;
        let me = router(app.state()).oneshot(get("/users/me", Some(&token))).await.expect("response");
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(read_json(me).await["id"], id);
    }

    #[tokio::test]
    async fn update_me_changes_profile() {
        let app = TestApp::new();
        seed(&app, "minh", UserRole::User).await;
        let token = login(&app, "minh").await;

        let response = router(app.state())
            .oneshot(json_request(
                "PUT",
                "/users/update-me",
                Some(&token),
                json!({ "username": "minh2", "full_name": "Minh Updated" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["username"], "minh2");
        assert_eq!(body["full_name"], "Minh Updated");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found_and_delete_returns_empty_object() {
        let app = TestApp::new();
        let id = seed(&app, "minh", UserRole::User).await;
        let token = login(&app, "minh").await;

        let missing =
            router(app.state()).oneshot(get("/users/999", Some(&token))).await.expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(missing).await["error"], "user not found: 999");

        let deleted = router(app.state())
            .oneshot(json_request("DELETE", &format!("/users/{id}"), Some(&token), json!({})))
            .await
            .expect("response");
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(read_json(deleted).await, json!({}));
    }

    #[tokio::test]
    async fn listing_users_is_admin_only_and_paginated() {
        let app = TestApp::new();
        seed(&app, "admin", UserRole::Admin).await;
        seed(&app, "minh", UserRole::User).await;
        for name in ["a1", "a2", "a3", "a4", "a5"] {
            seed(&app, name, UserRole::User).await;
        }

        let user_token = login(&app, "minh").await;
        let forbidden = router(app.state())
            .oneshot(get("/users?page=1&per_page=5", Some(&user_token)))
            .await
            .expect("response");
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(forbidden).await["error"], "permission denied");

        let admin_token = login(&app, "admin").await;
        let page = router(app.state())
            .oneshot(get("/users?page=2&per_page=5", Some(&admin_token)))
            .await
            .expect("response");
        assert_eq!(page.status(), StatusCode::OK);
        let body = read_json(page).await;
        assert_eq!(body["metadata"], json!({ "total": 7, "page": 2, "per_page": 5 }));
        assert_eq!(body["items"].as_array().expect("items").len(), 2);

        let too_large = router(app.state())
            .oneshot(get("/users?page=1&per_page=50", Some(&admin_token)))
            .await
            .expect("response");
        assert_eq!(too_large.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn points_must_be_positive_and_target_an_existing_user() {
        let app = TestApp::new();
        let id = seed(&app, "minh", UserRole::User).await;
        let token = login(&app, "minh").await;

        let granted = router(app.state())
            .oneshot(json_request(
                "POST",
                &format!("/users/{id}/points"),
                Some(&token),
                json!({ "order_id": "ORD-1", "point": 20 }),
            ))
            .await
            .expect("response");
        assert_eq!(granted.status(), StatusCode::CREATED);
        assert_eq!(read_json(granted).await["point"], 20);

        let negative = router(app.state())
            .oneshot(json_request(
                "POST",
                &format!("/users/{id}/points"),
                Some(&token),
                json!({ "order_id": "ORD-2", "point": 0 }),
            ))
            .await
            .expect("response");
        assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

        let orphan = router(app.state())
            .oneshot(json_request(
                "POST",
                "/users/404/points",
                Some(&token),
                json!({ "order_id": "ORD-3", "point": 5 }),
            ))
            .await
            .expect("response");
        assert_eq!(orphan.status(), StatusCode::NOT_FOUND);
    }
}
