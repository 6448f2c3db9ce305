// WhatsApp Finance Bot - Web Server
// REST API, chat webhook and realtime dashboard feed with Axum

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use wa_finance_bot::{
    db, finance, init_tracing, AppSettings, Balance, BudgetStatus, CommandInterpreter,
    DashboardUpdate, FinanceBot, FinancialReport, Intent, LedgerEntry, NewGoal, Period,
    UpdateHub,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 500;
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    bot: Arc<FinanceBot>,
    hub: UpdateHub,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!(error = %e, "request failed");
        ApiError::internal("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::error(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Run `f` with the database lock held; the guard never crosses an await
fn with_db<T>(
    state: &AppState,
    f: impl FnOnce(&Connection) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let conn = state
        .db
        .lock()
        .map_err(|_| ApiError::internal("Database lock poisoned"))?;
    f(&conn)
}

fn require_user(conn: &Connection, user_id: i64) -> Result<(), ApiError> {
    match db::get_user(conn, user_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found(format!("User {} not found", user_id))),
    }
}

fn parse_period(value: Option<&str>) -> Result<Period, ApiError> {
    match value {
        None => Ok(Period::Month),
        Some(raw) => Period::parse(raw)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown period: {}", raw))),
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

#[derive(Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
}

#[derive(Serialize)]
struct TransactionPage {
    total: i64,
    transactions: Vec<LedgerEntry>,
}

#[derive(Serialize)]
struct CategoriesResponse {
    expense: Vec<String>,
    income: Vec<String>,
}

#[derive(Serialize)]
struct StatsResponse {
    report: FinancialReport,
    budget: Vec<BudgetStatus>,
    balance: Balance,
}

/// Incoming chat message from the messaging gateway
#[derive(Deserialize)]
struct IncomingMessage {
    from: String,
    text: String,
}

#[derive(Serialize)]
struct MessageResponse {
    user_id: Option<i64>,
    intent: Intent,
    reply: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/v1/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/v1/transactions/:user_id - Newest transactions first
async fn get_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<TransactionPage> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0).max(0);

    let data = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(TransactionPage {
            total: db::count_user_transactions(conn, user_id)?,
            transactions: db::get_user_transactions(conn, user_id, limit, offset)?,
        })
    })?;

    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/v1/balance/:user_id
async fn get_balance(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Balance> {
    let balance = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(finance::get_balance(conn, user_id)?)
    })?;

    Ok(Json(ApiResponse::ok(balance)))
}

/// GET /api/v1/budget/:user_id
async fn get_budget(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<BudgetStatus>> {
    let statuses = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(finance::check_budget_status(conn, user_id)?)
    })?;

    Ok(Json(ApiResponse::ok(statuses)))
}

/// GET /api/v1/report/:user_id?period=month
async fn get_report(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<FinancialReport> {
    let period = parse_period(query.period.as_deref())?;

    let report = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(finance::generate_report(conn, user_id, period, Utc::now())?)
    })?;

    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/v1/insights/:user_id
async fn get_insights(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<finance::Insight>> {
    let insights = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(finance::get_financial_insights(conn, user_id)?)
    })?;

    Ok(Json(ApiResponse::ok(insights)))
}

/// GET /api/v1/notifications/:user_id?unread_only=true
async fn get_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<db::Notification>> {
    let notifications = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(db::get_user_notifications(conn, user_id, query.unread_only)?)
    })?;

    Ok(Json(ApiResponse::ok(notifications)))
}

/// POST /api/v1/notifications/:id/read
async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
) -> ApiResult<&'static str> {
    let updated = with_db(&state, |conn| Ok(db::mark_notification_read(conn, notification_id)?))?;

    if !updated {
        return Err(ApiError::not_found(format!(
            "Notification {} not found",
            notification_id
        )));
    }
    Ok(Json(ApiResponse::ok("OK")))
}

/// GET /api/v1/categories
async fn get_categories(State(state): State<AppState>) -> ApiResult<CategoriesResponse> {
    let config = state.bot.interpreter().config();

    Ok(Json(ApiResponse::ok(CategoriesResponse {
        expense: config.expense_categories.clone(),
        income: config.income_categories.clone(),
    })))
}

/// GET /api/v1/stats/:user_id?period=monthly - Report, budgets and balance in one call
async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<StatsResponse> {
    let period = parse_period(query.period.as_deref())?;

    let stats = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(StatsResponse {
            report: finance::generate_report(conn, user_id, period, Utc::now())?,
            budget: finance::check_budget_status(conn, user_id)?,
            balance: finance::get_balance(conn, user_id)?,
        })
    })?;

    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/v1/goals/:user_id
async fn get_goals(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<db::FinancialGoal>> {
    let goals = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(db::get_user_goals(conn, user_id)?)
    })?;

    Ok(Json(ApiResponse::ok(goals)))
}

/// POST /api/v1/goals/:user_id
async fn create_goal(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(goal): Json<NewGoal>,
) -> Result<(StatusCode, Json<ApiResponse<db::FinancialGoal>>), ApiError> {
    if goal.name.trim().is_empty() {
        return Err(ApiError::bad_request("Goal name is required"));
    }
    if !goal.target_amount.is_finite() || goal.target_amount <= 0.0 {
        return Err(ApiError::bad_request("Goal target must be positive"));
    }

    let created = with_db(&state, |conn| {
        require_user(conn, user_id)?;
        Ok(db::insert_goal(conn, user_id, &goal)?)
    })?;

    tracing::info!(user_id, goal_id = created.id, "goal created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// POST /api/v1/messages - Chat webhook: interpret, reply, push dashboard updates
async fn receive_message(
    State(state): State<AppState>,
    Json(message): Json<IncomingMessage>,
) -> ApiResult<MessageResponse> {
    if message.from.trim().is_empty() {
        return Err(ApiError::bad_request("Sender is required"));
    }

    let reply = with_db(&state, |conn| {
        Ok(state.bot.handle_message(conn, message.from.trim(), &message.text, Utc::now()))
    })?;

    if let Some(user_id) = reply.user_id {
        state.hub.publish_all(user_id, &reply.updates).await;
    }

    Ok(Json(ApiResponse::ok(MessageResponse {
        user_id: reply.user_id,
        intent: reply.intent,
        reply: reply.text,
    })))
}

// ============================================================================
// WebSocket
// ============================================================================

/// GET /ws/:user_id - Realtime dashboard feed
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user_id: i64) {
    let mut updates = state.hub.subscribe(user_id).await;

    // Current balance first so a fresh dashboard is never blank
    let initial = with_db(&state, |conn| Ok(finance::get_balance(conn, user_id)?));
    if let Ok(balance) = initial {
        if let Ok(payload) = serde_json::to_string(&DashboardUpdate::Balance(balance)) {
            if socket.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(payload) => {
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id, skipped, "dashboard connection lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(user_id, "dashboard disconnected");
}

// ============================================================================
// Pages
// ============================================================================

/// GET / and /dashboard - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/transactions/:user_id", get(get_transactions))
        .route("/balance/:user_id", get(get_balance))
        .route("/budget/:user_id", get(get_budget))
        .route("/report/:user_id", get(get_report))
        .route("/insights/:user_id", get(get_insights))
        .route("/notifications/:user_id", get(get_notifications))
        .route("/notifications/:id/read", post(mark_notification_read))
        .route("/categories", get(get_categories))
        .route("/stats/:user_id", get(get_stats))
        .route("/goals/:user_id", get(get_goals).post(create_goal))
        .route("/messages", post(receive_message));

    Router::new()
        .route("/", get(serve_index))
        .route("/dashboard", get(serve_index))
        .route("/ws/:user_id", get(ws_handler))
        .nest("/api/v1", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppSettings::from_env()?;
    init_tracing(&settings.log_level);

    println!("🌐 WhatsApp Finance Bot - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = db::open_database(&settings.database_path)?;
    println!("✓ Database opened: {:?}", settings.database_path);

    let interpreter = CommandInterpreter::new(settings.load_interpreter_config()?)
        .context("Invalid interpreter config")?;
    let bot = FinanceBot::new(Arc::new(interpreter), settings.dashboard_url.clone());

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        bot: Arc::new(bot),
        hub: UpdateHub::default(),
    };

    let hub = state.hub.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = hub.prune().await;
            if removed > 0 {
                tracing::debug!(removed, "pruned idle dashboard channels");
            }
        }
    });

    let app = build_router(state);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API:       {}/api/v1/health", settings.dashboard_url);
    println!("   Dashboard: {}/dashboard?user_id=1", settings.dashboard_url);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use wa_finance_bot::InterpreterConfig;

    fn test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let interpreter = CommandInterpreter::new(InterpreterConfig::default()).unwrap();

        AppState {
            db: Arc::new(Mutex::new(conn)),
            bot: Arc::new(FinanceBot::new(Arc::new(interpreter), "http://localhost:8000")),
            hub: UpdateHub::default(),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(build_router(test_state()), get_req("/api/v1/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_message_records_and_pushes_updates() {
        let state = test_state();
        let mut feed = state.hub.subscribe(1).await;

        let (status, json) = send(
            build_router(state.clone()),
            post_json(
                "/api/v1/messages",
                serde_json::json!({"from": "628111", "text": "catat pengeluaran 50000 untuk makanan"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["user_id"], 1);
        assert_eq!(json["data"]["intent"], "expense");

        let first: serde_json::Value = serde_json::from_str(&feed.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "transaction");
        assert_eq!(first["data"]["amount"], 50000.0);

        let (_, page) = send(build_router(state), get_req("/api/v1/transactions/1")).await;
        assert_eq!(page["data"]["total"], 1);
        assert_eq!(page["data"]["transactions"][0]["type"], "expense");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (status, json) = send(build_router(test_state()), get_req("/api/v1/balance/42")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_report_rejects_unknown_period() {
        let state = test_state();
        {
            let conn = state.db.lock().unwrap();
            db::create_user(&conn, "628111", None).unwrap();
        }

        let (status, _) = send(build_router(state.clone()), get_req("/api/v1/report/1?period=decade")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(build_router(state), get_req("/api/v1/stats/1?period=monthly")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["report"]["period"], "month");
        assert_eq!(json["data"]["balance"]["current_balance"], 0.0);
    }

    #[tokio::test]
    async fn test_goals_round_trip() {
        let state = test_state();
        {
            let conn = state.db.lock().unwrap();
            db::create_user(&conn, "628111", None).unwrap();
        }

        let (status, created) = send(
            build_router(state.clone()),
            post_json("/api/v1/goals/1", serde_json::json!({"name": "Dana darurat", "target_amount": 10000000.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["status"], "active");

        let (status, _) = send(
            build_router(state.clone()),
            post_json("/api/v1/goals/1", serde_json::json!({"name": "Liburan", "target_amount": -5.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, goals) = send(build_router(state), get_req("/api/v1/goals/1")).await;
        assert_eq!(goals["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_notification_read() {
        let state = test_state();
        let notification_id = {
            let conn = state.db.lock().unwrap();
            let user = db::create_user(&conn, "628111", None).unwrap();
            db::insert_notification(&conn, user.id, "budget_alert", "hampir habis").unwrap().id
        };

        let uri = format!("/api/v1/notifications/{}/read", notification_id);
        let request = Request::builder().method("POST").uri(&uri).body(Body::empty()).unwrap();
        let (status, _) = send(build_router(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);

        let (_, unread) = send(
            build_router(state.clone()),
            get_req("/api/v1/notifications/1?unread_only=true"),
        )
        .await;
        assert!(unread["data"].as_array().unwrap().is_empty());

        let request = Request::builder().method("POST").uri("/api/v1/notifications/999/read").body(Body::empty()).unwrap();
        let (status, _) = send(build_router(state), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_categories_from_config() {
        let (_, json) = send(build_router(test_state()), get_req("/api/v1/categories")).await;

        let expense = json["data"]["expense"].as_array().unwrap();
        assert!(expense.iter().any(|c| c == "Makanan & Minuman"));
        assert!(!json["data"]["income"].as_array().unwrap().is_empty());
    }
}
