use axum::{
    Router,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

use crate::client::SimulationService;
use crate::core::{
    Asset, CUSTOM_TICKER, ContributionTranche, DerivedKpis, DisplayUnits, SimulationConfig,
    TickerMatch, ViewKind,
};
use crate::error::{EngineError, ServiceError, SubmitError};
use crate::session::{
    BacktestOutcome, Orchestrator, Phase, Render, SessionState, SessionStore, SubmissionId,
    SubmissionOutcome, ViewBinder,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranchePayload {
    years: u32,
    #[serde(alias = "monthly_amount")]
    monthly_amount: f64,
}

/// Form fields as the front end sends them. Inflation and the custom asset
/// parameters are percentages.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPayload {
    initial_capital: Option<f64>,
    contributions: Option<Vec<TranchePayload>>,
    ticker: Option<String>,
    custom_return: Option<f64>,
    custom_volatility: Option<f64>,
    #[serde(alias = "inflationRate")]
    inflation: Option<f64>,
    financial_goal: Option<f64>,
    start_year: Option<i32>,
    black_swan_enabled: Option<bool>,
    degrees_of_freedom: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UnitsPayload {
    units: DisplayUnits,
}

#[derive(Debug, Default, Deserialize)]
struct TickerQuery {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse<'a> {
    units: DisplayUnits,
    has_run: bool,
    phase: &'static str,
    in_flight: bool,
    error: Option<String>,
    latest_submission: Option<SubmissionId>,
    result_submission: Option<SubmissionId>,
    result_config: Option<&'a SimulationConfig>,
}

impl<'a> SessionResponse<'a> {
    fn from_state(state: &'a SessionState) -> Self {
        Self {
            units: state.units,
            has_run: state.has_run,
            phase: state.phase.label(),
            in_flight: state.phase.in_flight(),
            error: match &state.phase {
                Phase::Failed(err) => Some(err.to_string()),
                _ => None,
            },
            latest_submission: state.latest,
            result_submission: state.results.as_ref().map(|r| r.submission),
            result_config: state.results.as_ref().map(|r| r.config.as_ref()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    submission: SubmissionId,
    superseded: bool,
    backtest: Option<BacktestOutcome>,
    kpis: Option<DerivedKpis>,
}

/// One session per process: a single store, its orchestrator and the binder
/// that serves the derived views.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Orchestrator,
    binder: Arc<Mutex<ViewBinder>>,
}

impl AppState {
    pub fn new(service: Arc<dyn SimulationService>) -> Self {
        let store = SessionStore::new();
        let binder = ViewBinder::new(store.reader());
        Self {
            orchestrator: Orchestrator::new(service, store),
            binder: Arc::new(Mutex::new(binder)),
        }
    }

    fn binder(&self) -> MutexGuard<'_, ViewBinder> {
        let mut binder = self
            .binder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        binder.refresh();
        binder
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/simulate", post(simulate_handler))
        .route("/api/session", get(session_handler))
        .route("/api/units", put(units_handler))
        .route("/api/kpis", get(kpis_handler))
        .route("/api/views/:kind", get(view_handler))
        .route("/api/tickers/search", get(ticker_search_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, service: Arc<dyn SimulationService>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState::new(service));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "plansim session host listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ConfigPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };
    let config = match build_config(payload) {
        Ok(config) => config,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let outcome = match state.orchestrator.submit(config).await {
        Ok(outcome) => outcome,
        Err(err) => return submit_error_response(&err),
    };

    let response = match outcome {
        SubmissionOutcome::Complete {
            submission,
            backtest,
        } => {
            let kpis = kpis_for(&state.binder(), submission);
            SimulateResponse {
                submission,
                superseded: false,
                backtest: Some(backtest),
                kpis,
            }
        }
        SubmissionOutcome::Superseded { submission } => SimulateResponse {
            submission,
            superseded: true,
            backtest: None,
            kpis: None,
        },
    };
    json_response(StatusCode::OK, response)
}

/// KPIs of `submission`, or nothing if a newer submission has already
/// replaced its result.
fn kpis_for(binder: &ViewBinder, submission: SubmissionId) -> Option<DerivedKpis> {
    if binder.submission() != Some(submission) {
        return None;
    }
    match binder.views() {
        Some(Ok(views)) => Some(views.kpis),
        _ => None,
    }
}

async fn session_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.orchestrator.store().snapshot();
    json_response(StatusCode::OK, SessionResponse::from_state(&snapshot))
}

async fn units_handler(
    State(state): State<AppState>,
    payload: Result<Json<UnitsPayload>, JsonRejection>,
) -> Response {
    let units = match payload {
        Ok(Json(payload)) => payload.units,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };
    state.orchestrator.store().set_units(units);
    let snapshot = state.orchestrator.store().snapshot();
    json_response(StatusCode::OK, SessionResponse::from_state(&snapshot))
}

async fn kpis_handler(State(state): State<AppState>) -> Response {
    let binder = state.binder();
    match binder.views() {
        None => no_result_response(),
        Some(Ok(views)) => json_response(StatusCode::OK, views.kpis),
        Some(Err(err)) => engine_error_response(err),
    }
}

async fn view_handler(
    State(state): State<AppState>,
    kind: Result<Path<ViewKind>, PathRejection>,
) -> Response {
    let kind = match kind {
        Ok(Path(kind)) => kind,
        Err(_) => return error_response(StatusCode::NOT_FOUND, "Unknown view"),
    };

    let mut binder = state.binder();
    binder.select(kind);
    match binder.render() {
        Render::NotRun => no_result_response(),
        render @ Render::Ready { .. } => json_response(StatusCode::OK, render),
        Render::Error { message } => error_response(StatusCode::BAD_GATEWAY, &message),
    }
}

async fn ticker_search_handler(
    State(state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Response {
    let service = state.orchestrator.service();
    match service.search_tickers(&query.query).await {
        Ok(matches) => json_response::<Vec<TickerMatch>>(StatusCode::OK, matches),
        Err(err) => service_error_response(&err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn no_result_response() -> Response {
    error_response(StatusCode::CONFLICT, "No simulation result yet")
}

fn service_error_response(err: &ServiceError) -> Response {
    let status = match err {
        ServiceError::Connectivity(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Request { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, &err.to_string())
}

fn engine_error_response(err: &EngineError) -> Response {
    let status = match err {
        EngineError::InvalidInflationRate { .. } => StatusCode::BAD_REQUEST,
        EngineError::Alignment { .. } => StatusCode::BAD_GATEWAY,
    };
    error_response(status, &err.to_string())
}

fn submit_error_response(err: &SubmitError) -> Response {
    match err {
        SubmitError::Service(err) => service_error_response(err),
        SubmitError::Engine(err) => engine_error_response(err),
        SubmitError::InvalidConfig(msg) => error_response(StatusCode::BAD_REQUEST, msg),
    }
}

pub fn config_from_json(json: &str) -> Result<SimulationConfig, String> {
    let payload = serde_json::from_str::<ConfigPayload>(json)
        .map_err(|e| format!("Invalid configuration JSON: {e}"))?;
    build_config(payload)
}

pub fn build_config(payload: ConfigPayload) -> Result<SimulationConfig, String> {
    let mut config = default_config();

    if let Some(v) = payload.initial_capital {
        config.initial_capital = v;
    }
    if let Some(tranches) = payload.contributions {
        config.contributions = tranches
            .into_iter()
            .map(|t| ContributionTranche {
                years: t.years,
                monthly_amount: t.monthly_amount,
            })
            .collect();
    }
    if let Some(v) = payload.inflation {
        config.inflation_rate = v / 100.0;
    }
    if let Some(v) = payload.financial_goal {
        config.financial_goal = v;
    }
    if let Some(v) = payload.start_year {
        config.backtest_start_year = Some(v);
    }
    if let Some(v) = payload.black_swan_enabled {
        config.black_swan_enabled = v;
    }
    if let Some(v) = payload.degrees_of_freedom {
        config.degrees_of_freedom = v;
    }

    if let Some(ticker) = payload.ticker {
        let ticker = ticker.trim();
        config.asset = if ticker.eq_ignore_ascii_case(CUSTOM_TICKER) {
            let (Some(expected_return), Some(volatility)) =
                (payload.custom_return, payload.custom_volatility)
            else {
                return Err(
                    "customReturn and customVolatility are required when ticker is CUSTOM"
                        .to_string(),
                );
            };
            Asset::Custom {
                expected_return: expected_return / 100.0,
                volatility: volatility / 100.0,
            }
        } else {
            Asset::Ticker {
                symbol: ticker.to_string(),
            }
        };
    } else if payload.custom_return.is_some() || payload.custom_volatility.is_some() {
        return Err("customReturn and customVolatility require ticker CUSTOM".to_string());
    }

    Ok(config)
}

fn default_config() -> SimulationConfig {
    SimulationConfig {
        initial_capital: 10_000.0,
        contributions: vec![ContributionTranche {
            years: 20,
            monthly_amount: 500.0,
        }],
        asset: Asset::Ticker {
            symbol: "VWRL.AS".to_string(),
        },
        inflation_rate: 0.02,
        financial_goal: 500_000.0,
        backtest_start_year: Some(2008),
        black_swan_enabled: true,
        degrees_of_freedom: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FakeService;
    use axum::body::to_bytes;
    use serde_json::Value;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn app_with(service: FakeService) -> AppState {
        AppState::new(Arc::new(service))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn payload(json: &str) -> Result<Json<ConfigPayload>, JsonRejection> {
        Ok(Json(serde_json::from_str(json).expect("payload json")))
    }

    #[test]
    fn empty_payload_uses_form_defaults() {
        let config = config_from_json("{}").expect("defaults");
        assert_eq!(config, default_config());
        assert_eq!(config.horizon_years(), 20);
        assert_eq!(config.backtest_year(), Some(2008));
    }

    #[test]
    fn config_from_json_parses_form_keys() {
        let json = r#"{
          "initialCapital": 25000,
          "inflation": 3.5,
          "ticker": " SPY ",
          "contributions": [
            { "years": 10, "monthly_amount": 300 },
            { "years": 5, "monthlyAmount": 800 }
          ],
          "financialGoal": 750000,
          "startYear": 2012,
          "blackSwanEnabled": false,
          "degreesOfFreedom": 5
        }"#;
        let config = config_from_json(json).expect("json should parse");

        assert_approx(config.initial_capital, 25_000.0);
        assert_approx(config.inflation_rate, 0.035);
        assert_eq!(config.ticker(), "SPY");
        assert_eq!(config.contributions.len(), 2);
        assert_approx(config.contributions[1].monthly_amount, 800.0);
        assert_eq!(config.horizon_years(), 15);
        assert_approx(config.financial_goal, 750_000.0);
        assert_eq!(config.backtest_year(), Some(2012));
        assert!(!config.black_swan_enabled);
        assert_eq!(config.degrees_of_freedom, 5);
    }

    #[test]
    fn start_year_at_or_below_1900_disables_backtest() {
        let config = config_from_json(r#"{"startYear": 0}"#).expect("parses");
        assert_eq!(config.backtest_year(), None);
    }

    #[test]
    fn custom_ticker_converts_percentages() {
        let config =
            config_from_json(r#"{"ticker": "custom", "customReturn": 7, "customVolatility": 15}"#)
                .expect("custom asset");
        match config.asset {
            Asset::Custom {
                expected_return,
                volatility,
            } => {
                assert_approx(expected_return, 0.07);
                assert_approx(volatility, 0.15);
            }
            other => panic!("unexpected asset {other:?}"),
        }
        assert_eq!(config.backtest_year(), None);
    }

    #[test]
    fn custom_ticker_requires_both_parameters() {
        let err = config_from_json(r#"{"ticker": "CUSTOM", "customReturn": 7}"#)
            .expect_err("missing volatility");
        assert!(err.contains("customVolatility"));

        let err = config_from_json(r#"{"customReturn": 7, "customVolatility": 15}"#)
            .expect_err("custom values without CUSTOM ticker");
        assert!(err.contains("ticker CUSTOM"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = config_from_json(r#"{"initialCapital": "lots"}"#).expect_err("bad type");
        assert!(err.starts_with("Invalid configuration JSON"));
    }

    #[tokio::test]
    async fn views_conflict_before_first_run() {
        let state = app_with(FakeService::default());
        let response = view_handler(State(state.clone()), Ok(Path(ViewKind::Projection))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );

        let response = kpis_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn simulate_then_read_views() {
        let state = app_with(FakeService::default());

        let response = simulate_handler(State(state.clone()), payload("{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["superseded"], Value::Bool(false));
        assert_eq!(body["backtest"], "ready");
        assert_eq!(body["kpis"]["units"], "real");

        let response = view_handler(State(state.clone()), Ok(Path(ViewKind::Backtest))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["kind"], "backtest");
        assert_eq!(body["view"]["status"], "available");

        let response = session_handler(State(state)).await;
        let body = body_json(response).await;
        assert_eq!(body["hasRun"], Value::Bool(true));
        assert_eq!(body["phase"], "complete");
        assert_eq!(body["resultConfig"]["initialCapital"], 10_000.0);
    }

    #[tokio::test]
    async fn simulate_response_never_carries_a_newer_submissions_kpis() {
        let state = app_with(FakeService::default());
        let first = match state.orchestrator.submit(default_config()).await {
            Ok(SubmissionOutcome::Complete { submission, .. }) => submission,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert!(kpis_for(&state.binder(), first).is_some());

        let mut newer = default_config();
        newer.initial_capital = 40_000.0;
        let second = match state.orchestrator.submit(newer).await {
            Ok(SubmissionOutcome::Complete { submission, .. }) => submission,
            other => panic!("unexpected outcome {other:?}"),
        };

        let binder = state.binder();
        assert_eq!(kpis_for(&binder, first), None);
        let kpis = kpis_for(&binder, second).expect("latest kpis");
        assert_eq!(kpis.units, DisplayUnits::Real);
    }

    #[tokio::test]
    async fn oversized_contribution_schedule_is_a_bad_request() {
        let state = app_with(FakeService::default());
        let response = simulate_handler(
            State(state.clone()),
            payload(r#"{"contributions": [{"years": 50000, "monthly_amount": 500}]}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = simulate_handler(
            State(state),
            payload(
                r#"{"contributions": [{"years": 4294967295, "monthly_amount": 500}, {"years": 1, "monthly_amount": 500}]}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("at most"));
    }

    #[tokio::test]
    async fn units_toggle_changes_kpis() {
        let state = app_with(FakeService::default());
        simulate_handler(State(state.clone()), payload("{}")).await;

        let real = body_json(kpis_handler(State(state.clone())).await).await;
        let response = units_handler(
            State(state.clone()),
            Ok(Json(UnitsPayload {
                units: DisplayUnits::Nominal,
            })),
        )
        .await;
        assert_eq!(body_json(response).await["units"], "nominal");

        let nominal = body_json(kpis_handler(State(state)).await).await;
        assert_eq!(nominal["units"], "nominal");
        let real_final = real["finalNet"].as_f64().expect("number");
        let nominal_final = nominal["finalNet"].as_f64().expect("number");
        assert!(nominal_final > real_final);
    }

    #[tokio::test]
    async fn service_failures_map_to_status_codes() {
        let state = app_with(FakeService::failing_simulate(ServiceError::Connectivity(
            "refused".to_string(),
        )));
        let response = simulate_handler(State(state.clone()), payload("{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let session = body_json(session_handler(State(state)).await).await;
        assert_eq!(session["phase"], "failed");
        assert_eq!(session["hasRun"], Value::Bool(false));

        let state = app_with(FakeService::failing_simulate(ServiceError::Request {
            status: 404,
            message: "Ticker NOPE not found".to_string(),
        }));
        let response = simulate_handler(State(state), payload(r#"{"ticker": "NOPE"}"#)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Ticker NOPE not found"));
    }

    #[tokio::test]
    async fn invalid_inflation_is_a_bad_request() {
        let state = app_with(FakeService::default());
        let response = simulate_handler(State(state), payload(r#"{"inflation": -150}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ticker_search_passes_through() {
        let state = app_with(FakeService::default());
        let response = ticker_search_handler(
            State(state),
            Query(TickerQuery {
                query: "vwrl".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["symbol"], "VWRL");
    }
}
