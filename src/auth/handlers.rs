use actix_web::{http::header, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::access::{dashboard_tiles, DashboardTile, SubscriptionState};
use crate::auth::validator::ValidatedSession;
use crate::db::{SubscriptionFields, UserSession};
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub subscription: SubscriptionState,
    pub systems: Vec<DashboardTile>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<UserSession> for SessionSummary {
    fn from(s: UserSession) -> Self {
        Self {
            id: s.id,
            created_at: s.created_at,
            expires_at: s.expires_at,
            updated_at: s.updated_at,
            ip_address: s.ip_address,
            user_agent: s.user_agent,
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::AuthError(AuthError::MissingToken))
}

async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<ValidatedSession, AppError> {
    let token = bearer_token(req)?;
    state
        .validator
        .validate_token(token)
        .await?
        .ok_or(AppError::AuthError(AuthError::InvalidToken))
}

async fn require_master(req: &HttpRequest, state: &AppState) -> Result<ValidatedSession, AppError> {
    let validated = authenticate(req, state).await?;
    if !state.policy.is_master(&validated.user) {
        warn!(user_id = %validated.user.id, "Non-master user attempted a subscription change");
        return Err(AuthError::Forbidden.into());
    }
    Ok(validated)
}

/// Exchanges a backend access token for a cross-app session.
pub async fn create_session(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let claims = state.backend_verifier.verify(bearer_token(&req)?)?;
    let user_id = claims.user_id()?;

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);

    match state.issuer.issue_session(user_id, client_ip, user_agent).await {
        Ok(session) => Ok(HttpResponse::Created().json(SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
        })),
        Err(e) => {
            error!("Login could not be completed for {}: {}", user_id, e);
            Err(e)
        }
    }
}

pub async fn current_session(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let validated = authenticate(&req, &state).await?;
    Ok(HttpResponse::Ok().json(validated))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;

    if !state.validator.invalidate_token(token).await? {
        return Err(AuthError::InvalidToken.into());
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

pub async fn list_sessions(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let validated = authenticate(&req, &state).await?;
    let sessions: Vec<SessionSummary> = state
        .validator
        .list_active_sessions(validated.user.id)
        .await?
        .into_iter()
        .map(SessionSummary::from)
        .collect();

    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn dashboard(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let validated = authenticate(&req, &state).await?;
    let subscription = state.store.get_subscription(validated.user.id).await?;
    let now = Utc::now();

    Ok(HttpResponse::Ok().json(DashboardResponse {
        subscription: state.policy.subscription_state(&validated.user, subscription.as_ref(), now),
        systems: dashboard_tiles(
            &state.policy,
            state.redirector.registry(),
            &validated.user,
            subscription.as_ref(),
            now,
        ),
    }))
}

async fn authorize_system(
    req: &HttpRequest,
    state: &AppState,
    system_id: &str,
) -> Result<ValidatedSession, AppError> {
    let validated = authenticate(req, state).await?;

    match state.redirector.registry().get(system_id) {
        Some(entry) if entry.is_active => {}
        _ => return Err(AppError::UnknownSystem(system_id.to_string())),
    }

    let subscription = state.store.get_subscription(validated.user.id).await?;

    if !state.policy.has_access(&validated.user, subscription.as_ref(), system_id) {
        info!(user_id = %validated.user.id, system_id, "Access denied");
        return Err(AuthError::Forbidden.into());
    }
    Ok(validated)
}

pub async fn redirect(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let system_id = path.into_inner();
    let validated = authorize_system(&req, &state, &system_id).await?;

    let url = state
        .redirector
        .build_redirect_url(&validated.session.token, &system_id)
        .ok_or_else(|| AppError::UnknownSystem(system_id.clone()))?;

    Ok(HttpResponse::Ok().json(UrlResponse { url: url.into() }))
}

pub async fn sso_redirect(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let system_id = path.into_inner();
    let validated = authorize_system(&req, &state, &system_id).await?;

    let url = state
        .redirector
        .build_sso_url(&validated.user, &system_id)
        .ok_or_else(|| AppError::UnknownSystem(system_id.clone()))?;

    Ok(HttpResponse::Ok().json(UrlResponse { url: url.into() }))
}

pub async fn upsert_subscription(
    req: HttpRequest,
    path: web::Path<Uuid>,
    fields: web::Json<SubscriptionFields>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let caller = require_master(&req, &state).await?;
    let user_id = path.into_inner();

    let subscription = state.store.upsert_subscription(user_id, fields.into_inner()).await?;
    info!(
        user_id = %user_id,
        by = %caller.user.id,
        plan = %subscription.plan_type,
        status = %subscription.status,
        "Subscription updated"
    );

    Ok(HttpResponse::Ok().json(subscription))
}

pub async fn start_trial(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_master(&req, &state).await?;
    let user_id = path.into_inner();

    let fields = SubscriptionFields::trial(Utc::now(), state.config.auth.trial_days);
    let subscription = state.store.upsert_subscription(user_id, fields).await?;
    info!(user_id = %user_id, ends_at = ?subscription.trial_end_date, "Trial started");

    Ok(HttpResponse::Created().json(subscription))
}

/// Registers every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/session", web::post().to(create_session))
        .route("/auth/session", web::get().to(current_session))
        .route("/auth/logout", web::post().to(logout))
        .route("/auth/sessions", web::get().to(list_sessions))
        .route("/dashboard", web::get().to(dashboard))
        .route("/redirect/{system_id}", web::get().to(redirect))
        .route("/sso/{system_id}", web::get().to(sso_redirect))
        .route("/subscriptions/{user_id}", web::put().to(upsert_subscription))
        .route("/subscriptions/{user_id}/trial", web::post().to(start_trial));
}
