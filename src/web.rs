use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use chrono::{Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{AllocationConfig, AppConfig};
use crate::error::{AppError, ModelError, StoreError};
use crate::model::{
    AttendanceStatus, Exclusion, ParkingSpace, SpaceId, SpaceType, UserId, UserProfile, UserRole,
};
use crate::schedule::date_utils::months_after;
use crate::schedule::eligibility::{check_window_start, SELECTION_HORIZON_MONTHS};
use crate::schedule::WindowRunner;
use crate::settings::SettingsPatch;
use crate::store::{AllocationStore, MemoryStore};

const ADMIN_HEADER: &str = "X-Admin-Password";

/// Shared server state. The store lives behind a mutex and is flushed to the snapshot after
/// every successful mutation.
pub struct AppState {
    pub store: Mutex<MemoryStore>,
    pub snapshot_path: Option<PathBuf>,
    pub admin_password: String,
    pub allocation: AllocationConfig,
}

impl AppState {
    pub fn new(
        store: MemoryStore,
        snapshot_path: Option<PathBuf>,
        admin_password: String,
        allocation: AllocationConfig,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            snapshot_path,
            admin_password,
            allocation,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>> {
        self.store
            .lock()
            .map_err(|_| actix_web::error::ErrorInternalServerError("store lock poisoned"))
    }

    fn persist(&self, store: &MemoryStore) -> Result<(), StoreError> {
        match &self.snapshot_path {
            Some(path) => store.save_snapshot(path),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(rename = "type", default)]
    space_type: Option<SpaceType>,
    #[serde(default)]
    reserved: bool,
    #[serde(default)]
    owner: Option<UserId>,
}

impl SpaceBody {
    fn into_space(self, id: String) -> ParkingSpace {
        ParkingSpace {
            name: if self.name.trim().is_empty() { id.clone() } else { self.name },
            id: SpaceId::new(id),
            location: self.location,
            space_type: self.space_type.unwrap_or(SpaceType::Standard),
            reserved: self.reserved,
            owner: self.owner,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserBody {
    display_name: Option<String>,
    role: Option<UserRole>,
    department: Option<String>,
    /// Absent keeps the current requirement, `null` clears it.
    #[serde(deserialize_with = "present")]
    required_space: Option<Option<SpaceType>>,
    active: Option<bool>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct UserQuery {
    search: Option<String>,
    /// `all` or a role name.
    role: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct AttendanceBody {
    status: AttendanceStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionBody {
    start_date: NaiveDate,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct AllocateBody {
    start: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryResponse<'a> {
    success: bool,
    spaces: Vec<&'a ParkingSpace>,
    by_type: std::collections::BTreeMap<SpaceType, usize>,
    by_location: std::collections::BTreeMap<&'a str, Vec<&'a ParkingSpace>>,
}

#[derive(Serialize)]
struct ExclusionView<'a> {
    #[serde(flatten)]
    exclusion: &'a Exclusion,
    permanent: bool,
    active: bool,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn is_admin(req: &HttpRequest, state: &AppState) -> bool {
    req.headers()
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|password| password == state.admin_password)
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"}))
}

/// Maps store errors onto status codes with the usual `{success, error}` body.
fn error_response(err: &StoreError) -> HttpResponse {
    let body = serde_json::json!({"success": false, "error": err.to_string()});
    match err {
        StoreError::CommitConflict { .. } => HttpResponse::Conflict().json(body),
        StoreError::Model(ModelError::DuplicateSpace(_)) => HttpResponse::Conflict().json(body),
        StoreError::Model(
            ModelError::UnknownUser(_) | ModelError::UnknownSpace(_) | ModelError::UnknownExclusion(_),
        ) => HttpResponse::NotFound().json(body),
        StoreError::Model(_) => HttpResponse::BadRequest().json(body),
        StoreError::Settings(crate::error::AllocationError::InvalidSettings(violations)) => {
            let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
            HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": err.to_string(),
                "violations": details,
            }))
        }
        StoreError::Io(_) | StoreError::Json(_) => {
            error!(error = %err, "store failure");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Runs a mutation against a copy of the store. The copy replaces the live store only once it
/// has been persisted, so a failed save leaves memory and disk in agreement.
fn mutate<T, F>(state: &AppState, f: F) -> Result<HttpResponse>
where
    T: Serialize,
    F: FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
{
    let mut store = state.lock()?;
    let mut draft = MemoryStore::clone(&store);
    let outcome = f(&mut draft).and_then(|value| {
        state.persist(&draft)?;
        Ok(value)
    });
    if outcome.is_ok() {
        *store = draft;
    }
    Ok(match outcome {
        Ok(value) => HttpResponse::Ok().json(serde_json::json!({"success": true, "data": value})),
        Err(err) => error_response(&err),
    })
}

// Admin login endpoint
async fn admin_login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if req.password == state.admin_password {
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.lock()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "settings": store.settings()})))
}

async fn update_settings(
    req: HttpRequest,
    patch: web::Json<SettingsPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    mutate(&state, |store| store.update_settings(&patch))
}

async fn reset_settings(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    mutate(&state, |store| Ok(store.reset_settings().clone()))
}

async fn list_spaces(state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.lock()?;
    let inventory = store.inventory();
    Ok(HttpResponse::Ok().json(InventoryResponse {
        success: true,
        spaces: inventory.iter().collect(),
        by_type: inventory.count_by_type(),
        by_location: inventory.group_by_location(),
    }))
}

async fn add_space(
    req: HttpRequest,
    body: web::Json<SpaceBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let mut body = body.into_inner();
    let id = body.id.take().unwrap_or_default();
    let space = body.into_space(id);
    mutate(&state, move |store| {
        store.add_space(space.clone())?;
        Ok(space)
    })
}

async fn update_space(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SpaceBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let space = body.into_inner().into_space(path.into_inner());
    mutate(&state, move |store| {
        store.update_space(space.clone())?;
        Ok(space)
    })
}

async fn delete_space(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let id = SpaceId::new(path.into_inner());
    mutate(&state, |store| store.remove_space(&id))
}

async fn upsert_user(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UserBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let id = path.into_inner();
    let body = body.into_inner();
    mutate(&state, move |store| {
        let mut profile = store
            .user(&UserId::new(id.as_str()))
            .cloned()
            .unwrap_or_else(|| UserProfile::new(id.as_str()));
        if let Some(name) = body.display_name {
            profile.display_name = name;
        }
        if let Some(role) = body.role {
            profile.role = role;
        }
        if let Some(department) = body.department {
            profile.department = department;
        }
        if let Some(required_space) = body.required_space {
            profile.required_space = required_space;
        }
        if let Some(active) = body.active {
            profile.active = active;
        }
        store.upsert_user(profile.clone())?;
        Ok(profile)
    })
}

async fn delete_user(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let id = UserId::new(path.into_inner());
    mutate(&state, |store| store.remove_user(&id))
}

async fn mark_attendance(
    path: web::Path<(String, NaiveDate)>,
    body: web::Json<AttendanceBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user, date) = path.into_inner();
    let user = UserId::new(user);
    mutate(&state, |store| {
        store.mark_attendance(&user, date, body.status, today())?;
        Ok(serde_json::json!({"date": date, "status": body.status}))
    })
}

async fn remove_attendance(
    path: web::Path<(String, NaiveDate)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user, date) = path.into_inner();
    let user = UserId::new(user);
    mutate(&state, |store| store.remove_attendance(&user, date, today()))
}

async fn add_exclusion(
    path: web::Path<String>,
    body: web::Json<ExclusionBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user = UserId::new(path.into_inner());
    let body = body.into_inner();
    mutate(&state, |store| {
        store.add_exclusion(&user, body.start_date, body.end_date, body.reason, Utc::now())
    })
}

async fn remove_exclusion(
    path: web::Path<(String, u64)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (user, id) = path.into_inner();
    let user = UserId::new(user);
    mutate(&state, |store| store.remove_exclusion(&user, id))
}

async fn list_users(query: web::Query<UserQuery>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.lock()?;
    let users = match store.list_users() {
        Ok(users) => users,
        Err(err) => return Ok(error_response(&err)),
    };
    let search = query.search.as_deref().unwrap_or_default();
    let role = query.role.as_deref().map(str::to_lowercase).filter(|r| r != "all");
    let users: Vec<UserProfile> = users
        .into_iter()
        .filter(|u| u.matches(search))
        .filter(|u| role.as_deref().map_or(true, |r| u.role.to_string() == r))
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "users": users})))
}

fn not_found_user(user: &UserId) -> HttpResponse {
    error_response(&StoreError::Model(ModelError::UnknownUser(user.clone())))
}

async fn user_attendance(
    path: web::Path<String>,
    query: web::Query<RangeQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let user = UserId::new(path.into_inner());
    let store = state.lock()?;
    if store.user(&user).is_none() {
        return Ok(not_found_user(&user));
    }
    let from = query.from.unwrap_or_else(today);
    let to = query.to.unwrap_or_else(|| months_after(today(), SELECTION_HORIZON_MONTHS));
    match store.load_attendance(&user, from..=to) {
        Ok(calendar) => {
            let records: Vec<_> = calendar.records().collect();
            Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "attendance": records})))
        }
        Err(err) => Ok(error_response(&err)),
    }
}

async fn user_exclusions(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = UserId::new(path.into_inner());
    let store = state.lock()?;
    if store.user(&user).is_none() {
        return Ok(not_found_user(&user));
    }
    let mut exclusions = match store.load_exclusions(&user) {
        Ok(exclusions) => exclusions,
        Err(err) => return Ok(error_response(&err)),
    };
    exclusions.sort_by_key(|e| (e.start_date(), e.id()));
    let today = today();
    let views: Vec<ExclusionView<'_>> = exclusions
        .iter()
        .map(|exclusion| ExclusionView {
            exclusion,
            permanent: exclusion.is_permanent(),
            active: exclusion.covers(today),
        })
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "exclusions": views})))
}

async fn user_assignments(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = UserId::new(path.into_inner());
    let store = state.lock()?;
    let upcoming = store.upcoming_assignments(&user, today());
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "assignments": upcoming})))
}

async fn assignments_on(path: web::Path<NaiveDate>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let date = path.into_inner();
    let store = state.lock()?;
    let assignments = store.assignments_on(date).map(|day| day.to_assignments(date)).unwrap_or_default();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "date": date,
        "assignments": assignments,
    })))
}

async fn run_allocation(
    req: HttpRequest,
    body: Option<web::Json<AllocateBody>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        return Ok(unauthorized());
    }
    let today = today();
    let start = body.and_then(|b| b.into_inner().start).unwrap_or(today);
    let allocation = state.allocation.clone();
    mutate(&state, |store| {
        check_window_start(today, start)?;
        WindowRunner::new(store, allocation.trailing_days, allocation.commit_retries).run(start)
    })
}

async fn get_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let store = state.lock()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "stats": store.stats(today())})))
}

/// Registers every API route. Shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(admin_login))
        .route("/api/settings", web::get().to(get_settings))
        .route("/api/settings", web::put().to(update_settings))
        .route("/api/settings/reset", web::post().to(reset_settings))
        .route("/api/spaces", web::get().to(list_spaces))
        .route("/api/spaces", web::post().to(add_space))
        .service(
            web::resource("/api/spaces/{id}")
                .route(web::put().to(update_space))
                .route(web::delete().to(delete_space)),
        )
        .route("/api/users", web::get().to(list_users))
        .service(
            web::resource("/api/users/{id}")
                .route(web::put().to(upsert_user))
                .route(web::delete().to(delete_user)),
        )
        .service(
            web::resource("/api/users/{id}/attendance/{date}")
                .route(web::put().to(mark_attendance))
                .route(web::delete().to(remove_attendance)),
        )
        .route("/api/users/{id}/attendance", web::get().to(user_attendance))
        .service(
            web::resource("/api/users/{id}/exclusions")
                .route(web::get().to(user_exclusions))
                .route(web::post().to(add_exclusion)),
        )
        .route("/api/users/{id}/exclusions/{eid}", web::delete().to(remove_exclusion))
        .route("/api/users/{id}/assignments", web::get().to(user_assignments))
        .route("/api/assignments/{date}", web::get().to(assignments_on))
        .route("/api/allocate", web::post().to(run_allocation))
        .route("/api/stats", web::get().to(get_stats));
}

/// Runs the window once a day at `notificationTime` (local hour) while `autoAssign` is on.
fn spawn_auto_assign(state: web::Data<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        let mut last_run: Option<NaiveDate> = None;
        loop {
            ticker.tick().await;
            let now = Local::now();
            let date = now.date_naive();
            if last_run == Some(date) {
                continue;
            }

            let Ok(mut store) = state.store.lock() else {
                error!("store lock poisoned, stopping auto-assign");
                return;
            };
            if now.hour() != store.settings().notification_time {
                continue;
            }
            last_run = Some(date);

            let allocation = &state.allocation;
            let result = WindowRunner::new(&mut *store, allocation.trailing_days, allocation.commit_retries)
                .run_if_auto(date);
            match result {
                Ok(Some(report)) => {
                    info!(committed = report.committed_count(), "scheduled allocation finished");
                    if let Err(e) = state.persist(&store) {
                        error!(error = %e, "failed to save snapshot after scheduled allocation");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "scheduled allocation skipped"),
            }
        }
    });
}

pub async fn start_server(config: AppConfig) -> Result<(), AppError> {
    let store = MemoryStore::load_snapshot(&config.storage.snapshot_path)?;
    let app_state = web::Data::new(AppState::new(
        store,
        Some(config.storage.snapshot_path.clone()),
        config.server.admin_password.clone(),
        config.allocation.clone(),
    ));

    spawn_auto_assign(app_state.clone());

    info!(port = config.server.port, "starting web server");
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", config.server.port))?
    .run()
    .await?;
    Ok(())
}
