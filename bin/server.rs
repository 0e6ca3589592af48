// Food Donation - Web Server
// REST API with Axum over the listing, claim and analytics operations

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, put},
    Router,
};
use chrono::Local;
use clap::Parser;
use food_donation::{
    analytics, crud, query, workflow, ClaimStatus, Config, Database, DonationError, Filter,
    FoodListing, FoodListingDraft, FoodType, ListingFilter, MealType, Provider, ProviderDraft,
    Receiver, ReceiverDraft, Table,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(name = "food-donation-server", version, about = "Food donation REST API")]
struct ServerArgs {
    #[command(flatten)]
    config: Config,

    /// Address to listen on
    #[arg(long, env = "FOOD_DONATION_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
}

impl AppState {
    /// A panicked handler leaves the connection itself intact, so keep serving
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Map a core result onto a status code and the JSON envelope
fn respond<T: Serialize>(result: food_donation::Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            let status = match &e {
                DonationError::Validation(_) => StatusCode::BAD_REQUEST,
                DonationError::NotFound { .. } => StatusCode::NOT_FOUND,
                DonationError::Storage(cause) => {
                    error!("storage error: {}", cause);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
        }
    }
}

fn created(result: food_donation::Result<i64>) -> Response {
    match result {
        Ok(id) => (StatusCode::CREATED, Json(ApiResponse::ok(IdResponse { id }))).into_response(),
        Err(e) => respond::<()>(Err(e)),
    }
}

/// Unwrap a JSON body, answering malformed payloads with the same envelope
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        (
            rejection.status(),
            Json(ApiResponse::<()>::err(rejection.body_text())),
        )
            .into_response()
    })
}

#[derive(Serialize)]
struct IdResponse {
    id: i64,
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListingParams {
    city: Option<String>,
    food_type: Option<String>,
    meal_type: Option<String>,
}

impl ListingParams {
    /// Missing, empty or "All" parameters leave that dimension unconstrained
    fn to_filter(&self) -> food_donation::Result<ListingFilter> {
        Ok(ListingFilter {
            location: city_filter(&self.city),
            food_type: parse_filter::<FoodType>(&self.food_type)?,
            meal_type: parse_filter::<MealType>(&self.meal_type)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct CityParams {
    city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusParams {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    #[serde(rename = "Food_ID")]
    food_id: i64,
    #[serde(rename = "Receiver_ID")]
    receiver_id: i64,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    #[serde(rename = "Status")]
    status: String,
}

fn city_filter(raw: &Option<String>) -> Filter<String> {
    raw.as_deref()
        .unwrap_or_default()
        .parse()
        .unwrap_or_default()
}

fn parse_filter<T>(raw: &Option<String>) -> food_donation::Result<Filter<T>>
where
    T: std::str::FromStr<Err = food_donation::ValidationError>,
{
    let filter = raw.as_deref().unwrap_or_default().parse()?;
    Ok(filter)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/listings - Filtered listings, soonest expiry first
async fn get_listings(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Response {
    let db = state.db();
    respond(params.to_filter().and_then(|f| query::food_listings(&db, &f)))
}

/// POST /api/listings
async fn create_listing(
    State(state): State<AppState>,
    payload: Result<Json<FoodListingDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    created(crud::create::<FoodListing>(&state.db(), &draft))
}

/// PUT /api/listings/:id
async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<FoodListingDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    respond(crud::update::<FoodListing>(&state.db(), id, &draft))
}

/// GET /api/providers - Provider directory, optionally for one city
async fn get_providers(
    State(state): State<AppState>,
    Query(params): Query<CityParams>,
) -> Response {
    respond(query::providers_by_city(&state.db(), &city_filter(&params.city)))
}

/// POST /api/providers
async fn create_provider(
    State(state): State<AppState>,
    payload: Result<Json<ProviderDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    created(crud::create::<Provider>(&state.db(), &draft))
}

/// PUT /api/providers/:id
async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ProviderDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    respond(crud::update::<Provider>(&state.db(), id, &draft))
}

/// GET /api/receivers
async fn get_receivers(
    State(state): State<AppState>,
    Query(params): Query<CityParams>,
) -> Response {
    respond(query::receivers_by_city(&state.db(), &city_filter(&params.city)))
}

/// POST /api/receivers
async fn create_receiver(
    State(state): State<AppState>,
    payload: Result<Json<ReceiverDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    created(crud::create::<Receiver>(&state.db(), &draft))
}

/// PUT /api/receivers/:id
async fn update_receiver(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ReceiverDraft>, JsonRejection>,
) -> Response {
    let draft = match body(payload) {
        Ok(draft) => draft,
        Err(rejected) => return rejected,
    };
    respond(crud::update::<Receiver>(&state.db(), id, &draft))
}

/// GET /api/claims - Claims joined with listing, receiver and provider
async fn get_claims(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Response {
    let db = state.db();
    respond(
        parse_filter::<ClaimStatus>(&params.status)
            .and_then(|status| query::claims_by_status(&db, &status)),
    )
}

/// POST /api/claims - Submit a Pending claim
async fn submit_claim(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    created(workflow::submit_claim(
        &state.db(),
        request.food_id,
        request.receiver_id,
    ))
}

/// PUT /api/claims/:id/status
async fn update_claim_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    respond(workflow::update_status_str(&state.db(), id, &request.status))
}

/// GET /api/claims/recent
async fn get_recent_claims(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Response {
    respond(query::recent_claims(&state.db(), params.limit.unwrap_or(10)))
}

/// Values offered in the filter dropdowns
#[derive(Serialize)]
struct FilterOptions {
    locations: Vec<String>,
    food_types: Vec<FoodType>,
    meal_types: Vec<MealType>,
    provider_cities: Vec<String>,
    receiver_cities: Vec<String>,
}

fn filter_options(db: &Database) -> food_donation::Result<FilterOptions> {
    Ok(FilterOptions {
        locations: query::listing_locations(db)?,
        food_types: query::listing_food_types(db)?,
        meal_types: query::listing_meal_types(db)?,
        provider_cities: query::provider_cities(db)?,
        receiver_cities: query::receiver_cities(db)?,
    })
}

/// GET /api/filters
async fn get_filter_options(State(state): State<AppState>) -> Response {
    respond(filter_options(&state.db()))
}

/// GET /api/tables/:table - Every row of one table
async fn get_table(State(state): State<AppState>, Path(table): Path<String>) -> Response {
    let db = state.db();
    respond(
        table
            .parse::<Table>()
            .map_err(DonationError::from)
            .and_then(|t| crud::read_table(&db, t)),
    )
}

/// DELETE /api/tables/:table/:id
async fn delete_row(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
) -> Response {
    let db = state.db();
    respond(
        table
            .parse::<Table>()
            .map_err(DonationError::from)
            .and_then(|t| crud::delete_from(&db, t, id)),
    )
}

/// GET /api/analytics/summary - Dashboard headline numbers
async fn get_summary(State(state): State<AppState>) -> Response {
    respond(analytics::kpi_snapshot(&state.db(), Local::now().naive_local()))
}

/// GET /api/analytics/top-providers
async fn get_top_providers(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Response {
    respond(analytics::top_providers(&state.db(), params.limit.unwrap_or(5)))
}

#[derive(Serialize)]
struct Breakdowns {
    providers_by_type: Vec<analytics::GroupCount>,
    claims_by_status: Vec<analytics::GroupCount>,
    listings_by_food_type: Vec<analytics::GroupCount>,
    receiver_type_claims: Vec<analytics::GroupCount>,
    quantity_by_city: Vec<analytics::QuantityTotals>,
    provider_type_totals: Vec<analytics::QuantityTotals>,
}

fn breakdowns(db: &Database) -> food_donation::Result<Breakdowns> {
    Ok(Breakdowns {
        providers_by_type: analytics::providers_by_type(db)?,
        claims_by_status: analytics::claims_by_status(db)?,
        listings_by_food_type: analytics::listings_by_food_type(db)?,
        receiver_type_claims: analytics::receiver_type_claims(db)?,
        quantity_by_city: analytics::quantity_by_city(db)?,
        provider_type_totals: analytics::provider_type_totals(db)?,
    })
}

/// GET /api/analytics/breakdowns - Grouped counts for the charts
async fn get_breakdowns(State(state): State<AppState>) -> Response {
    respond(breakdowns(&state.db()))
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/listings", get(get_listings).post(create_listing))
        .route("/listings/:id", put(update_listing))
        .route("/providers", get(get_providers).post(create_provider))
        .route("/providers/:id", put(update_provider))
        .route("/receivers", get(get_receivers).post(create_receiver))
        .route("/receivers/:id", put(update_receiver))
        .route("/claims", get(get_claims).post(submit_claim))
        .route("/claims/recent", get(get_recent_claims))
        .route("/claims/:id/status", put(update_claim_status))
        .route("/filters", get(get_filter_options))
        .route("/tables/:table", get(get_table))
        .route("/tables/:table/:id", delete(delete_row))
        .route("/analytics/summary", get(get_summary))
        .route("/analytics/top-providers", get(get_top_providers))
        .route("/analytics/breakdowns", get(get_breakdowns))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    args.config.init_logging()?;

    let db = Database::open(&args.config.database)
        .with_context(|| format!("Failed to open {}", args.config.database.display()))?;
    info!("database opened: {}", args.config.database.display());

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
    };

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    info!("server running on http://{}", args.addr);
    println!("🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/listings", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::{FromRequest, Request};
    use axum::http::header::CONTENT_TYPE;

    fn state() -> AppState {
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
        }
    }

    async fn json_payload<T>(raw: &'static str) -> Result<Json<T>, JsonRejection>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(raw))
            .unwrap();
        Json::<T>::from_request(request, &()).await
    }

    async fn envelope(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_body_is_wrapped_in_envelope() {
        let state = state();

        let response = create_provider(
            State(state.clone()),
            json_payload::<ProviderDraft>("{\"Name\": ").await,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let value = envelope(response).await;
        assert_eq!(value["success"], false);
        assert!(!value["error"].as_str().unwrap().is_empty());
        assert_eq!(state.db().count(Table::Provider).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_shape_body_is_wrapped_in_envelope() {
        let response = submit_claim(
            State(state()),
            json_payload::<ClaimRequest>("{\"Food_ID\": \"one\"}").await,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_valid_body_creates_row() {
        let state = state();

        let response = create_provider(
            State(state.clone()),
            json_payload::<ProviderDraft>(
                "{\"Name\": \"Acme\", \"Type\": \"Bakery\", \"Address\": \"1 Main St\",
                  \"City\": \"X\", \"Contact\": \"555\"}",
            )
            .await,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let value = envelope(response).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(state.db().count(Table::Provider).unwrap(), 1);
    }
}
