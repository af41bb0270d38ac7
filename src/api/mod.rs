// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::require_auth,
    models::{
        ForgotPasswordRequest, MessageResponse, PruneResponse, ResetPasswordRequest,
        SignInRequest, SignInResponse, SignUpRequest,
    },
    state::AppState,
    storage::UserProfile,
};

pub mod auth;
pub mod cron;
pub mod extract;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.app_url);

    let protected = Router::new()
        .route(
            "/me",
            get(users::get_current_user).delete(users::delete_current_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/verify-email", get(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/cron/prune-tokens", get(cron::prune_tokens))
        .merge(protected);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http",
                method = %request.method(),
                path = %request.uri().path(),
                request_id
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Cookie-carrying CORS for the app's own origin only.
fn cors_layer(app_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true);

    let origin = url::Url::parse(app_url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
        .and_then(|o| HeaderValue::from_str(&o).ok());
    match origin {
        Some(origin) => layer.allow_origin(origin),
        None => layer,
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup,
        auth::signin,
        auth::refresh,
        auth::logout,
        auth::verify_email,
        auth::forgot_password,
        auth::reset_password,
        users::get_current_user,
        users::delete_current_user,
        cron::prune_tokens,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            SignUpRequest,
            SignInRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            MessageResponse,
            SignInResponse,
            PruneResponse,
            UserProfile,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Registration, sign-in and session cookies"),
        (name = "Users", description = "Current account"),
        (name = "Cron", description = "Scheduled maintenance"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::mailer::EmailKind;
    use crate::session::engine::tests::{harness, Harness};
    use crate::state::testing;

    struct TestApp {
        app: Router,
        h: Harness,
    }

    fn app() -> TestApp {
        let h = harness();
        let app = router(testing::state(&h));
        TestApp { app, h }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response {
            self.app.clone().oneshot(request).await.unwrap()
        }

        async fn post_json(&self, uri: &str, body: Value) -> Response {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn signup(&self) -> Response {
            self.post_json(
                "/api/signup",
                json!({
                    "name": "jane doe",
                    "username": "JaneD",
                    "email": "Jane@X.com",
                    "password": "Abcd1234"
                }),
            )
            .await
        }

        /// Sign up and follow the verification link; returns the session cookies.
        async fn verified_session(&self) -> (String, String) {
            assert_eq!(self.signup().await.status(), StatusCode::CREATED);
            let token = self.h.mailer.last_token(EmailKind::Verification).unwrap();
            let response = self
                .send(
                    Request::builder()
                        .uri(format!("/api/verify-email?token={token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            (
                set_cookie(&response, "access-token").unwrap(),
                set_cookie(&response, "refresh-token").unwrap(),
            )
        }
    }

    fn set_cookie(response: &Response, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.strip_prefix(&format!("{name}=")).map(str::to_string))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }

    fn with_cookie(
        builder: axum::http::request::Builder,
        name: &str,
        value: &str,
    ) -> axum::http::request::Builder {
        builder.header(header::COOKIE, format!("{name}={value}"))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_database() {
        let t = app();
        let response = t
            .send(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = body_json(response).await;
        assert_eq!(body["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn signup_validates_and_detects_conflicts() {
        let t = app();

        let response = t.signup().await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["message"], auth::SIGNUP_MESSAGE);

        let response = t.signup().await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(response).await["error"],
            "User with this email already exists."
        );

        let response = t
            .post_json(
                "/api/signup",
                json!({"name": "x", "username": "abc", "email": "a@b.co", "password": "Abcd1234"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let t = app();

        let response = t
            .post_json(
                "/api/signup",
                json!({"name": "jane doe", "username": "janed", "email": "jane@x.com"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("password"));

        let response = t
            .post_json("/api/signin", json!({"identifier": 42, "password": "Abcd1234"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/forgot-password")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("jane@x.com"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn verify_email_without_token_is_bad_request() {
        let t = app();

        for uri in ["/api/verify-email", "/api/verify-email?token="] {
            let response = t
                .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(response).await, json!({"error": "Invalid token"}));
        }
    }

    #[tokio::test]
    async fn signup_degrades_when_mail_fails() {
        let t = app();
        t.h.mailer.set_failing(true);

        let response = t.signup().await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await["message"],
            auth::SIGNUP_DEGRADED_MESSAGE
        );
    }

    #[tokio::test]
    async fn signin_before_verification_is_forbidden() {
        let t = app();
        t.signup().await;

        let response = t
            .post_json("/api/signin", json!({"identifier": "janed", "password": "Abcd1234"}))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(set_cookie(&response, "access-token").is_none());
    }

    #[tokio::test]
    async fn verify_email_redirects_with_cookies() {
        let t = app();
        assert_eq!(t.signup().await.status(), StatusCode::CREATED);
        let token = t.h.mailer.last_token(EmailKind::Verification).unwrap();

        let response = t
            .send(
                Request::builder()
                    .uri(format!("/api/verify-email?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://app.example.com"
        );
        assert!(set_cookie(&response, "access-token").is_some());

        let reused = t
            .send(
                Request::builder()
                    .uri(format!("/api/verify-email?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(reused.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(reused).await["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn signin_sets_cookies_and_returns_token() {
        let t = app();
        t.verified_session().await;

        let response = t
            .post_json("/api/signin", json!({"identifier": "JANED", "password": "Abcd1234"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response, "access-token").unwrap();
        assert!(set_cookie(&response, "refresh-token").is_some());

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["access_token"], cookie);

        let response = t
            .post_json("/api/signin", json!({"identifier": "janed", "password": "Wrong1234"}))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid credentials.");
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let t = app();
        let (access, _) = t.verified_session().await;

        let response = t
            .send(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Unauthorized", "error_code": "unauthorized"})
        );

        let response = t
            .send(
                with_cookie(Request::builder().uri("/api/me"), "access-token", &access)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "janed");
        assert_eq!(body["name"], "Jane Doe");
        assert!(body.get("password_hash").is_none());

        let response = t
            .send(
                Request::builder()
                    .uri("/api/me")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_rotates_cookie() {
        let t = app();
        let (_, refresh) = t.verified_session().await;

        let refresh_request = |value: &str| {
            with_cookie(
                Request::builder().method("POST").uri("/api/refresh"),
                "refresh-token",
                value,
            )
            .body(Body::empty())
            .unwrap()
        };

        let response = t.send(refresh_request(&refresh)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = set_cookie(&response, "refresh-token").unwrap();
        assert_ne!(rotated, refresh);

        let response = t.send(refresh_request(&refresh)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookies_and_is_idempotent() {
        let t = app();
        let (_, refresh) = t.verified_session().await;

        for _ in 0..2 {
            let response = t
                .send(
                    with_cookie(
                        Request::builder().method("POST").uri("/api/logout"),
                        "refresh-token",
                        &refresh,
                    )
                    .body(Body::empty())
                    .unwrap(),
                )
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(set_cookie(&response, "refresh-token").as_deref(), Some(""));
            assert_eq!(set_cookie(&response, "access-token").as_deref(), Some(""));
        }

        let response = t
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let t = app();
        t.verified_session().await;

        for identifier in ["jane@x.com", "nobody@x.com"] {
            let response = t
                .post_json("/api/forgot-password", json!({ "identifier": identifier }))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                body_json(response).await["message"],
                auth::FORGOT_PASSWORD_MESSAGE
            );
        }
        let token = t.h.mailer.last_token(EmailKind::PasswordReset).unwrap();

        let response = t
            .post_json("/api/reset-password", json!({"token": token, "password": "weak"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = t
            .post_json("/api/reset-password", json!({"token": token, "password": "Newpass99"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = t
            .post_json("/api/signin", json!({"identifier": "janed", "password": "Newpass99"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_me_revokes_access() {
        let t = app();
        let (access, _) = t.verified_session().await;

        let me = |method: &str| {
            with_cookie(
                Request::builder().method(method).uri("/api/me"),
                "access-token",
                &access,
            )
            .body(Body::empty())
            .unwrap()
        };

        let response = t.send(me("DELETE")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = t.send(me("GET")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cron_requires_secret() {
        let t = app();

        let response = t
            .send(
                Request::builder()
                    .uri("/api/cron/prune-tokens")
                    .header(header::AUTHORIZATION, "Bearer wrong-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = t
            .send(
                Request::builder()
                    .uri("/api/cron/prune-tokens")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", testing::CRON_SECRET),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "pruned_count": 0, "pruned_action_tokens": 0})
        );
    }

    #[test]
    fn openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/api/signup", "/api/me", "/api/cron/prune-tokens", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
