use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers::{
    create_folder, create_user, delete_rule_group, health_check, list_folders, login, logout,
    post_rule_group, prometheus_rules, reload_user_permissions, AppState,
};
use crate::store::InMemoryRuleStore;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Organization of the bootstrap admin and everything it creates
    pub org_id: i64,
    pub admin_login: String,
    pub admin_password: String,
    pub default_interval_secs: u64,
    pub permission_cache_ttl_secs: u64,
    /// Sessions unused for this long are dropped
    pub session_idle_timeout_secs: u64,
    pub max_sessions: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            org_id: 1,
            admin_login: "admin".to_string(),
            admin_password: "admin".to_string(),
            default_interval_secs: 60,
            permission_cache_ttl_secs: 300,
            session_idle_timeout_secs: 86400,
            max_sessions: 10_000,
        }
    }
}

impl ServerConfig {
    /// Create a config from environment variables, falling back to defaults
    /// PROMRULES_HOST=0.0.0.0
    /// PROMRULES_PORT=3000
    /// PROMRULES_ORG_ID=1
    /// PROMRULES_ADMIN_USER=admin
    /// PROMRULES_ADMIN_PASSWORD=admin
    /// PROMRULES_DEFAULT_INTERVAL_SECS=60
    /// PROMRULES_PERMISSION_CACHE_TTL_SECS=300
    /// PROMRULES_SESSION_IDLE_TIMEOUT_SECS=86400
    /// PROMRULES_MAX_SESSIONS=10000
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        let defaults = Self::default();
        Self {
            host: std::env::var("PROMRULES_HOST").unwrap_or(defaults.host),
            port: parsed("PROMRULES_PORT").unwrap_or(defaults.port),
            org_id: parsed("PROMRULES_ORG_ID").unwrap_or(defaults.org_id),
            admin_login: std::env::var("PROMRULES_ADMIN_USER").unwrap_or(defaults.admin_login),
            admin_password: std::env::var("PROMRULES_ADMIN_PASSWORD")
                .unwrap_or(defaults.admin_password),
            default_interval_secs: parsed("PROMRULES_DEFAULT_INTERVAL_SECS")
                .unwrap_or(defaults.default_interval_secs),
            permission_cache_ttl_secs: parsed("PROMRULES_PERMISSION_CACHE_TTL_SECS")
                .unwrap_or(defaults.permission_cache_ttl_secs),
            session_idle_timeout_secs: parsed("PROMRULES_SESSION_IDLE_TIMEOUT_SECS")
                .unwrap_or(defaults.session_idle_timeout_secs),
            max_sessions: parsed("PROMRULES_MAX_SESSIONS").unwrap_or(defaults.max_sessions),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // Prometheus-compatible read path
        .route(
            "/api/prometheus/:datasource/api/v1/rules",
            get(prometheus_rules),
        )
        // Rule group writes
        .route(
            "/api/ruler/grafana/api/v1/rules/:namespace",
            post(post_rule_group),
        )
        .route(
            "/api/ruler/grafana/api/v1/rules/:namespace/:group",
            delete(delete_rule_group),
        )
        // Folders
        .route("/api/folders", get(list_folders).post(create_folder))
        // Access control
        .route(
            "/api/access-control/user/permissions",
            get(reload_user_permissions),
        )
        // Users
        .route("/api/admin/users", post(create_user))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rules = Arc::new(InMemoryRuleStore::new());
    let state = Arc::new(AppState::new(&config, rules));

    let admin = state.bootstrap_admin(&config)?;
    tracing::info!(
        "Bootstrapped admin '{}' in org {}",
        admin.login,
        admin.org_id
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting promrules server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("promrules server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::rules::{RuleEvaluation, RuleGroup, RuleHealth, RuleState};
    use crate::store::{RuleGroupStore, StoreError};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::http::HeaderMap;
    use axum_extra::headers::{Authorization, HeaderMapExt};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::util::ServiceExt;

    const RULES_URI: &str = "/api/prometheus/grafana/api/v1/rules";

    const MATH_QUERY: &str = r#"[{"refId":"A","queryType":"","relativeTimeRange":{"from":18000,"to":10800},"datasourceUid":"-100","model":{"expression":"2 + 3 \u003e 1","intervalMs":1000,"maxDataPoints":43200,"type":"math"}}]"#;

    struct TestApp {
        state: Arc<AppState>,
        router: Router,
        editor_id: i64,
    }

    fn create_test_app_with_store(rules: Arc<dyn RuleGroupStore>) -> TestApp {
        let state = Arc::new(AppState::new(&ServerConfig::default(), rules));
        let editor = state
            .users
            .create_user("grafana", "password", 1, Role::Editor)
            .unwrap();
        TestApp {
            router: build_router(Arc::clone(&state)),
            state,
            editor_id: editor.id,
        }
    }

    fn create_test_app() -> TestApp {
        create_test_app_with_store(Arc::new(InMemoryRuleStore::new()))
    }

    fn basic(login: &str, password: &str) -> String {
        let mut headers = HeaderMap::new();
        headers.typed_insert(Authorization::basic(login, password));
        headers[header::AUTHORIZATION].to_str().unwrap().to_string()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get_as(app: &TestApp, uri: &str, login: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, basic(login, "password"))
            .body(Body::empty())
            .unwrap();
        send(app, request).await
    }

    async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
        get_as(app, uri, "grafana").await
    }

    async fn post_json(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, basic("grafana", "password"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    async fn create_folder(app: &TestApp, uid: &str) {
        let (status, _) = post_json(app, "/api/folders", json!({"uid": uid, "title": uid})).await;
        assert_eq!(status, StatusCode::OK);
    }

    fn math_query() -> Value {
        json!({
            "refId": "A",
            "relativeTimeRange": {"from": 18000, "to": 10800},
            "datasourceUid": "-100",
            "model": {"type": "math", "expression": "2 + 3 > 1"}
        })
    }

    fn two_rule_group(annotations: Value) -> Value {
        json!({
            "name": "arulegroup",
            "rules": [
                {
                    "for": "10s",
                    "annotations": annotations,
                    "grafana_alert": {"title": "AlwaysFiring", "condition": "A", "data": [math_query()]}
                },
                {
                    "grafana_alert": {
                        "title": "AlwaysFiringButSilenced",
                        "condition": "A",
                        "data": [math_query()],
                        "no_data_state": "Alerting",
                        "exec_err_state": "Alerting"
                    }
                }
            ]
        })
    }

    fn folder_rule_group(folder: &str) -> Value {
        json!({
            "name": "arulegroup",
            "rules": [{
                "for": "2m",
                "labels": {"label1": "val1"},
                "annotations": {"annotation1": "val1"},
                "grafana_alert": {
                    "title": format!("rule under folder {}", folder),
                    "condition": "A",
                    "data": [math_query()]
                }
            }]
        })
    }

    fn folder_group_view(folder: &str) -> Value {
        json!({
            "name": "arulegroup",
            "file": folder,
            "rules": [{
                "state": "inactive",
                "name": format!("rule under folder {}", folder),
                "query": MATH_QUERY,
                "duration": 120,
                "annotations": {"annotation1": "val1"},
                "labels": {"label1": "val1"},
                "health": "ok",
                "type": "alerting",
                "lastEvaluation": "0001-01-01T00:00:00Z",
                "evaluationTime": 0
            }],
            "interval": 60,
            "lastEvaluation": "0001-01-01T00:00:00Z",
            "evaluationTime": 0
        })
    }

    fn groups(groups: Vec<Value>) -> Value {
        json!({"status": "success", "data": {"groups": groups}})
    }

    fn dashboard_rule_view() -> Value {
        json!({
            "state": "inactive",
            "name": "AlwaysFiring",
            "query": MATH_QUERY,
            "duration": 10,
            "annotations": {"__dashboardUid__": "default", "__panelId__": "1"},
            "health": "ok",
            "type": "alerting",
            "lastEvaluation": "0001-01-01T00:00:00Z",
            "evaluationTime": 0
        })
    }

    fn silenced_rule_view() -> Value {
        json!({
            "state": "inactive",
            "name": "AlwaysFiringButSilenced",
            "query": MATH_QUERY,
            "health": "ok",
            "type": "alerting",
            "lastEvaluation": "0001-01-01T00:00:00Z",
            "evaluationTime": 0
        })
    }

    fn dashboard_group_view(rules: Vec<Value>) -> Value {
        json!({
            "name": "arulegroup",
            "file": "default",
            "rules": rules,
            "interval": 60,
            "lastEvaluation": "0001-01-01T00:00:00Z",
            "evaluationTime": 0
        })
    }

    async fn setup_dashboard_rules(app: &TestApp) {
        create_folder(app, "default").await;
        let (status, _) = post_json(
            app,
            "/api/ruler/grafana/api/v1/rules/default",
            two_rule_group(json!({"__dashboardUid__": "default", "__panelId__": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn test_unauthenticated_rules_request() {
        let app = create_test_app();
        let request = Request::builder()
            .uri(RULES_URI)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"message": "Unauthorized"}));

        let (status, _) = get_as(&app, RULES_URI, "nobody").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_rules_returns_empty_list() {
        let app = create_test_app();
        let (status, body) = get(&app, RULES_URI).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, groups(vec![]));
    }

    #[tokio::test]
    async fn test_create_and_list_rules() {
        let app = create_test_app();
        create_folder(&app, "default").await;

        let (status, body) = post_json(
            &app,
            "/api/ruler/grafana/api/v1/rules/default",
            json!({
                "name": "arulegroup",
                "rules": [
                    {
                        "for": "10s",
                        "labels": {"label1": "val1"},
                        "annotations": {"annotation1": "val1"},
                        "grafana_alert": {"title": "AlwaysFiring", "condition": "A", "data": [math_query()]}
                    },
                    two_rule_group(json!({}))["rules"][1].clone()
                ]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"message": "rule group updated successfully"}));

        let (status, body) = get(&app, RULES_URI).await;
        assert_eq!(status, StatusCode::OK);

        let mut first = dashboard_rule_view();
        first["annotations"] = json!({"annotation1": "val1"});
        first["labels"] = json!({"label1": "val1"});
        assert_eq!(
            body,
            groups(vec![dashboard_group_view(vec![first, silenced_rule_view()])])
        );
    }

    #[tokio::test]
    async fn test_panel_without_dashboard_rejected_on_write() {
        let app = create_test_app();
        create_folder(&app, "default").await;

        let (status, body) = post_json(
            &app,
            "/api/ruler/grafana/api/v1/rules/default",
            json!({
                "name": "anotherrulegroup",
                "rules": [{
                    "for": "10s",
                    "labels": {},
                    "annotations": {"__panelId__": "1"},
                    "grafana_alert": {"title": "NeverCreated", "condition": "A", "data": [math_query()]}
                }]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            json!("invalid rule specification at index [0]: both annotations __dashboardUid__ and __panelId__ must be specified")
        );
        assert_eq!(get(&app, RULES_URI).await.1, groups(vec![]));
    }

    #[tokio::test]
    async fn test_write_to_unknown_folder() {
        let app = create_test_app();
        let (status, body) = post_json(
            &app,
            "/api/ruler/grafana/api/v1/rules/missing",
            folder_rule_group("missing"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("folder not found"));
    }

    #[tokio::test]
    async fn test_filter_by_dashboard() {
        let app = create_test_app();
        setup_dashboard_rules(&app).await;

        let all = groups(vec![dashboard_group_view(vec![
            dashboard_rule_view(),
            silenced_rule_view(),
        ])]);
        let filtered = groups(vec![dashboard_group_view(vec![dashboard_rule_view()])]);

        assert_eq!(get(&app, RULES_URI).await, (StatusCode::OK, all));
        assert_eq!(
            get(&app, &format!("{}?dashboard_uid=default", RULES_URI)).await,
            (StatusCode::OK, filtered.clone())
        );
        assert_eq!(
            get(&app, &format!("{}?dashboard_uid=abc", RULES_URI)).await,
            (StatusCode::OK, groups(vec![]))
        );
        assert_eq!(
            get(&app, &format!("{}?dashboard_uid=default&panel_id=1", RULES_URI)).await,
            (StatusCode::OK, filtered)
        );
        assert_eq!(
            get(&app, &format!("{}?dashboard_uid=default&panel_id=2", RULES_URI)).await,
            (StatusCode::OK, groups(vec![]))
        );
    }

    #[tokio::test]
    async fn test_invalid_dashboard_selectors() {
        let app = create_test_app();
        setup_dashboard_rules(&app).await;

        let (status, body) = get(
            &app,
            &format!("{}?dashboard_uid=default&panel_id=invalid", RULES_URI),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"message": "invalid panel_id: invalid digit found in string"})
        );

        let (status, body) = get(&app, &format!("{}?panel_id=1", RULES_URI)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"message": "panel_id must be set with dashboard_uid"})
        );
    }

    #[tokio::test]
    async fn test_permission_revocation_after_reload() {
        let app = create_test_app();
        for folder in ["folder1", "folder2"] {
            create_folder(&app, folder).await;
            let (status, _) = post_json(
                &app,
                &format!("/api/ruler/grafana/api/v1/rules/{}", folder),
                folder_rule_group(folder),
            )
            .await;
            assert_eq!(status, StatusCode::ACCEPTED);
        }

        assert_eq!(
            get(&app, RULES_URI).await.1,
            groups(vec![
                folder_group_view("folder1"),
                folder_group_view("folder2")
            ])
        );

        app.state
            .permissions
            .remove_folder_permissions(1, app.editor_id, Role::Editor, "folder2");
        let (status, body) = get(&app, "/api/access-control/user/permissions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"folders:read": ["folders:uid:folder1"]}));

        assert_eq!(
            get(&app, RULES_URI).await.1,
            groups(vec![folder_group_view("folder1")])
        );

        app.state
            .permissions
            .remove_folder_permissions(1, app.editor_id, Role::Editor, "folder1");
        get(&app, "/api/access-control/user/permissions").await;

        assert_eq!(get(&app, RULES_URI).await.1, groups(vec![]));
    }

    #[tokio::test]
    async fn test_stale_permissions_until_reload() {
        let app = create_test_app();
        create_folder(&app, "folder1").await;
        post_json(
            &app,
            "/api/ruler/grafana/api/v1/rules/folder1",
            folder_rule_group("folder1"),
        )
        .await;
        assert_eq!(get(&app, RULES_URI).await.1["data"]["groups"].as_array().unwrap().len(), 1);

        app.state
            .permissions
            .remove_folder_permissions(1, app.editor_id, Role::Editor, "folder1");

        // snapshot predates the revocation
        assert_eq!(get(&app, RULES_URI).await.1["data"]["groups"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluation_state_rendered() {
        let app = create_test_app();
        setup_dashboard_rules(&app).await;

        let evaluated_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        app.state
            .rules
            .record_evaluation(
                1,
                "default",
                "arulegroup",
                "AlwaysFiring",
                RuleEvaluation {
                    state: RuleState::Firing,
                    health: RuleHealth::Ok,
                    error: None,
                    evaluated_at,
                    duration: Duration::from_millis(250),
                },
            )
            .unwrap();

        let (_, body) = get(&app, RULES_URI).await;
        let group = &body["data"]["groups"][0];
        assert_eq!(group["lastEvaluation"], json!("2024-01-02T03:04:05Z"));
        assert_eq!(group["evaluationTime"], json!(0.25));
        assert_eq!(group["rules"][0]["state"], json!("firing"));
        assert_eq!(group["rules"][1]["state"], json!("inactive"));
    }

    #[tokio::test]
    async fn test_delete_rule_group() {
        let app = create_test_app();
        setup_dashboard_rules(&app).await;

        let delete = |uri: &str| {
            Request::builder()
                .method("DELETE")
                .uri(uri.to_string())
                .header(header::AUTHORIZATION, basic("grafana", "password"))
                .body(Body::empty())
                .unwrap()
        };

        let (status, _) = send(
            &app,
            delete("/api/ruler/grafana/api/v1/rules/default/arulegroup"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(get(&app, RULES_URI).await.1, groups(vec![]));

        let (status, _) = send(
            &app,
            delete("/api/ruler/grafana/api/v1/rules/default/arulegroup"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_datasource() {
        let app = create_test_app();
        let (status, body) = get(&app, "/api/prometheus/other/api/v1/rules").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"message": "unknown datasource: other"}));
    }

    struct UnavailableStore;

    impl RuleGroupStore for UnavailableStore {
        fn list_rule_groups(&self, _org_id: i64) -> Result<Vec<RuleGroup>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn upsert_rule_group(&self, _group: RuleGroup) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn delete_rule_group(&self, _: i64, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn record_evaluation(
            &self,
            _: i64,
            _: &str,
            _: &str,
            _: &str,
            _: RuleEvaluation,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let app = create_test_app_with_store(Arc::new(UnavailableStore));
        let (status, body) = get(&app, RULES_URI).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"message": "internal server error"}));
    }

    #[tokio::test]
    async fn test_selectors_validated_before_store_access() {
        let app = create_test_app_with_store(Arc::new(UnavailableStore));
        let (status, _) = get(&app, &format!("{}?panel_id=1", RULES_URI)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_login() {
        let app = create_test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"user": "grafana", "password": "password"}).to_string(),
            ))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri(RULES_URI)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::OK);

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::OK);

        let request = Request::builder()
            .uri(RULES_URI)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_login() {
        let app = create_test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"user": "grafana", "password": "nope"}).to_string(),
            ))
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
    }

    async fn login_cookie(app: &TestApp) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"user": "grafana", "password": "password"}).to_string(),
            ))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_basic_scheme_is_case_insensitive() {
        let app = create_test_app();
        let credentials = basic("grafana", "password");
        let encoded = credentials.trim_start_matches("Basic ");

        for scheme in ["basic", "BASIC", "Basic"] {
            let request = Request::builder()
                .uri(RULES_URI)
                .header(header::AUTHORIZATION, format!("{} {}", scheme, encoded))
                .body(Body::empty())
                .unwrap();
            assert_eq!(send(&app, request).await.0, StatusCode::OK, "{}", scheme);
        }
    }

    #[tokio::test]
    async fn test_session_cookie_in_later_cookie_header() {
        let app = create_test_app();
        let cookie = login_cookie(&app).await;

        let request = Request::builder()
            .uri(RULES_URI)
            .header(header::COOKIE, "theme=dark")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_idle_session_rejected() {
        let config = ServerConfig {
            session_idle_timeout_secs: 1,
            ..ServerConfig::default()
        };
        let state = Arc::new(AppState::new(&config, Arc::new(InMemoryRuleStore::new())));
        state
            .users
            .create_user("grafana", "password", 1, Role::Editor)
            .unwrap();
        let app = TestApp {
            router: build_router(Arc::clone(&state)),
            state,
            editor_id: 0,
        };
        let cookie = login_cookie(&app).await;

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let request = Request::builder()
            .uri(RULES_URI)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_viewer_cannot_write() {
        let app = create_test_app();
        create_folder(&app, "default").await;
        app.state
            .users
            .create_user("viewer", "password", 1, Role::Viewer)
            .unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/ruler/grafana/api/v1/rules/default")
            .header(header::AUTHORIZATION, basic("viewer", "password"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(folder_rule_group("default").to_string()))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // viewers still read rules of folders granted to their role
        post_json(
            &app,
            "/api/ruler/grafana/api/v1/rules/default",
            folder_rule_group("default"),
        )
        .await;
        let (_, body) = get_as(&app, RULES_URI, "viewer").await;
        assert_eq!(body, groups(vec![folder_group_view("default")]));
    }

    #[tokio::test]
    async fn test_folders_listing_and_conflict() {
        let app = create_test_app();
        create_folder(&app, "folder1").await;

        let (status, _) = post_json(&app, "/api/folders", json!({"uid": "folder1"})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = get(&app, "/api/folders").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"uid": "folder1", "title": "folder1"}]));
    }

    #[tokio::test]
    async fn test_admin_creates_users() {
        let app = create_test_app();
        app.state
            .bootstrap_admin(&ServerConfig {
                admin_password: "password".to_string(),
                ..ServerConfig::default()
            })
            .unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/admin/users")
            .header(header::AUTHORIZATION, basic("admin", "password"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"login": "ops", "password": "password", "role": "Editor"}).to_string(),
            ))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("User created"));
        assert_eq!(get_as(&app, RULES_URI, "ops").await.0, StatusCode::OK);

        // editors may not create users
        let (status, _) = post_json(
            &app,
            "/api/admin/users",
            json!({"login": "x", "password": "y"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
