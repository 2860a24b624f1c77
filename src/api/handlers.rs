use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::server::ServerConfig;
use crate::access::{PermissionCache, PermissionStore};
use crate::auth::{Role, SessionStore, SignedInUser, User, UserStore, SESSION_COOKIE};
use crate::prometheus::{render_groups, RenderError, RuleResponse, GRAFANA_DATASOURCE};
use crate::rules::{
    DashboardFilter, FilterError, PostableRuleGroup, RuleSelectorParams, RuleValidationError,
};
use crate::store::{Folder, FolderStore, RuleGroupStore, StoreError};

/// Application state shared across handlers
pub struct AppState {
    pub rules: Arc<dyn RuleGroupStore>,
    pub folders: Arc<FolderStore>,
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    pub permissions: Arc<PermissionStore>,
    pub permission_cache: Arc<PermissionCache>,
    /// Interval for groups posted without one
    pub default_interval: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig, rules: Arc<dyn RuleGroupStore>) -> Self {
        let permissions = Arc::new(PermissionStore::new());
        let permission_cache = Arc::new(PermissionCache::new(
            Arc::clone(&permissions),
            Duration::from_secs(config.permission_cache_ttl_secs),
        ));

        Self {
            rules,
            folders: Arc::new(FolderStore::new()),
            users: Arc::new(UserStore::new()),
            sessions: Arc::new(SessionStore::new(
                Duration::from_secs(config.session_idle_timeout_secs),
                config.max_sessions,
            )),
            permissions,
            permission_cache,
            default_interval: Duration::from_secs(config.default_interval_secs),
        }
    }

    /// Create the configured org admin account
    pub fn bootstrap_admin(&self, config: &ServerConfig) -> Result<User, StoreError> {
        self.users.create_user(
            &config.admin_login,
            &config.admin_password,
            config.org_id,
            Role::Admin,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let user = state
        .users
        .authenticate(&request.user, &request.password)
        .ok_or_else(|| {
            tracing::warn!(login = %request.user, "Failed login attempt");
            ApiError::Unauthorized
        })?;

    let token = state.sessions.open(user.id);
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(cookie), Json(MessageResponse::new("Logged in"))))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.close(cookie.value());
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(MessageResponse::new("Logged out")))
}

// ============================================================================
// Prometheus Rules
// ============================================================================

pub async fn prometheus_rules(
    State(state): State<Arc<AppState>>,
    Path(datasource): Path<String>,
    Extension(user): Extension<SignedInUser>,
    params: Result<Query<RuleSelectorParams>, QueryRejection>,
) -> Result<Json<RuleResponse>, ApiError> {
    if datasource != GRAFANA_DATASOURCE {
        return Err(ApiError::NotFound(format!(
            "unknown datasource: {}",
            datasource
        )));
    }

    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = DashboardFilter::from_params(&params)?;

    let groups = state.rules.list_rule_groups(user.org_id)?;
    let groups = state.permission_cache.filter_visible(&user, groups);
    let groups = filter.apply(groups);

    tracing::debug!(
        user = %user.login,
        groups = groups.len(),
        filtered = !filter.is_empty(),
        "Serving prometheus rules"
    );

    Ok(Json(RuleResponse::success(render_groups(&groups)?)))
}

// ============================================================================
// Ruler (rule group writes)
// ============================================================================

/// Callers must be able to edit and see the namespace folder
fn authorize_namespace_write(
    state: &AppState,
    user: &SignedInUser,
    namespace: &str,
) -> Result<(), ApiError> {
    if !user.role.can_edit() {
        return Err(ApiError::Forbidden("permission denied".to_string()));
    }

    let visible = state.folders.get(user.org_id, namespace).is_some()
        && state
            .permission_cache
            .snapshot(user)
            .can_read_folder(namespace);
    if !visible {
        return Err(ApiError::NotFound("folder not found".to_string()));
    }
    Ok(())
}

pub async fn post_rule_group(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
    Extension(user): Extension<SignedInUser>,
    payload: Result<Json<PostableRuleGroup>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    authorize_namespace_write(&state, &user, &namespace)?;

    let group = payload
        .into_rule_group(user.org_id, &namespace, state.default_interval)
        .map_err(|e| {
            tracing::warn!(namespace = %namespace, error = %e, "Rejected rule group");
            e
        })?;

    tracing::info!(
        namespace = %namespace,
        group = %group.name,
        rules = group.rules.len(),
        "Rule group updated"
    );
    state.rules.upsert_rule_group(group)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("rule group updated successfully")),
    ))
}

pub async fn delete_rule_group(
    State(state): State<Arc<AppState>>,
    Path((namespace, group)): Path<(String, String)>,
    Extension(user): Extension<SignedInUser>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    authorize_namespace_write(&state, &user, &namespace)?;

    if !state
        .rules
        .delete_rule_group(user.org_id, &namespace, &group)?
    {
        return Err(ApiError::NotFound("rule group not found".to_string()));
    }

    tracing::info!(namespace = %namespace, group = %group, "Rule group deleted");
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("rule group deleted")),
    ))
}

// ============================================================================
// Folders
// ============================================================================

#[derive(Deserialize)]
pub struct CreateFolderRequest {
    pub uid: String,
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> Result<Json<Folder>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !user.role.can_edit() {
        return Err(ApiError::Forbidden("permission denied".to_string()));
    }
    if request.uid.trim().is_empty() {
        return Err(ApiError::BadRequest("folder uid is empty".to_string()));
    }

    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| request.uid.clone());
    let folder = state.folders.create(user.org_id, request.uid, title)?;

    state.permissions.grant_folder_defaults(&user, &folder.uid);
    // new grants must be visible without waiting for a reload
    state.permission_cache.invalidate_all();

    tracing::info!(uid = %folder.uid, created_by = %user.login, "Folder created");
    Ok(Json(folder))
}

pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
) -> Json<Vec<Folder>> {
    let folders = state.folders.list(user.org_id);
    Json(state.permission_cache.filter_folders(&user, folders))
}

// ============================================================================
// Access Control
// ============================================================================

#[derive(Serialize)]
pub struct UserPermissionsResponse {
    #[serde(rename = "folders:read")]
    pub folders_read: Vec<String>,
}

/// Recompute the caller's cached permissions and return them
pub async fn reload_user_permissions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
) -> Json<UserPermissionsResponse> {
    let snapshot = state.permission_cache.reload(&user);
    Json(UserPermissionsResponse {
        folders_read: snapshot.scope_strings(),
    })
}

// ============================================================================
// Users
// ============================================================================

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub id: i64,
    pub message: &'static str,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<CreateUserResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if user.role != Role::Admin {
        return Err(ApiError::Forbidden("permission denied".to_string()));
    }
    if request.login.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "login and password are required".to_string(),
        ));
    }

    let created =
        state
            .users
            .create_user(&request.login, &request.password, user.org_id, request.role)?;

    tracing::info!(login = %created.login, role = ?created.role, "User created");
    Ok(Json(CreateUserResponse {
        id: created.id,
        message: "User created",
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RuleValidationError> for ApiError {
    fn from(err: RuleValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(_) => ApiError::Conflict(err.to_string()),
            StoreError::Unavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(MessageResponse { message })).into_response()
    }
}
