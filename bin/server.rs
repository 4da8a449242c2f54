// Skali Cards - Web Server
// REST API + HTML gallery with Axum

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use skali_cards::discord::link_member;
use skali_cards::render::{card_page, gallery_page};
use skali_cards::{
    engine_from_config, get_all_members, get_all_performances, record_gallery_generated, setup_database, AppConfig,
    Card, CardEngine, DiscordClient, ElementType, Gallery, GalleryFilter, GalleryStats, Gender, LinkOutcome,
    PeerReference, SortOrder, Tier,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: Arc<CardEngine>,
    config: Arc<AppConfig>,
    /// Peer bests, rebuilt once older than the configured TTL
    peer: Arc<Mutex<Option<PeerReference>>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
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

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: context.to_string(),
        }
    }

    fn not_found(message: String) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

/// Query string accepted by /api/cards and /
#[derive(Debug, Default, Deserialize)]
struct CardQuery {
    #[serde(rename = "type")]
    element: Option<ElementType>,
    tier: Option<Tier>,
    gender: Option<Gender>,
    search: Option<String>,
    #[serde(default)]
    sort: SortOrder,
}

impl CardQuery {
    fn filter(&self) -> GalleryFilter {
        GalleryFilter {
            element: self.element,
            tier: self.tier,
            gender: self.gender,
            search: self.search.clone(),
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: GalleryStats,
    generated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    member_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: String,
    /// Member id passed through the OAuth state
    #[serde(default)]
    state: Option<String>,
}

// ============================================================================
// Gallery
// ============================================================================

/// Regenerate the gallery from the store, reusing the cached peer reference
/// while it is fresh.
fn current_gallery(state: &AppState) -> Result<Gallery, ApiError> {
    let conn = state
        .db
        .lock()
        .map_err(|e| ApiError::internal("Database lock poisoned", e))?;

    let members = get_all_members(&conn).map_err(|e| ApiError::internal("Failed to load members", e))?;
    let records = get_all_performances(&conn).map_err(|e| ApiError::internal("Failed to load performances", e))?;

    let mut peer = state
        .peer
        .lock()
        .map_err(|e| ApiError::internal("Peer cache lock poisoned", e))?;

    let now = Utc::now();
    let ttl = state.config.peer_reference_ttl();
    let (reference, rebuilt) = match peer.take() {
        Some(cached) if !cached.is_stale(now, ttl) => (cached, false),
        _ => {
            let fresh = PeerReference::build(&members, &records);
            info!(bests = fresh.len(), "Peer reference rebuilt");
            (fresh, true)
        }
    };

    let gallery = state.engine.regenerate_gallery(&members, &records, Some(&reference));
    *peer = Some(reference);

    // One audit event per reference rebuild, not per request
    if rebuilt {
        let mode = gallery.cards().first().map(|c| c.scoring_mode.as_str()).unwrap_or("none");
        if let Err(e) = record_gallery_generated(&conn, gallery.len(), mode) {
            warn!("Failed to record gallery event: {}", e);
        }
    }

    Ok(gallery)
}

fn owned(cards: Vec<&Card>) -> Vec<Card> {
    cards.into_iter().cloned().collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/cards?type=&tier=&gender=&search=&sort=
async fn get_cards(State(state): State<AppState>, Query(query): Query<CardQuery>) -> Result<Response, ApiError> {
    let gallery = current_gallery(&state)?;
    let cards = owned(gallery.query(&query.filter(), query.sort));
    Ok((StatusCode::OK, Json(ApiResponse::ok(cards))).into_response())
}

/// GET /api/cards/:id
async fn get_card(State(state): State<AppState>, Path(member_id): Path<String>) -> Result<Response, ApiError> {
    let gallery = current_gallery(&state)?;
    match gallery.find(&member_id) {
        Some(card) => Ok(Json(ApiResponse::ok(card.clone())).into_response()),
        None => Err(ApiError::not_found(format!("No member with id {}", member_id))),
    }
}

/// GET /api/cards/type/:type
async fn get_cards_by_type(
    State(state): State<AppState>,
    Path(element): Path<String>,
) -> Result<Response, ApiError> {
    let element: ElementType = element.parse().map_err(|e: String| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: e,
    })?;

    let gallery = current_gallery(&state)?;
    let filter = GalleryFilter {
        element: Some(element),
        ..Default::default()
    };
    let cards = owned(gallery.query(&filter, SortOrder::Level));
    Ok(Json(ApiResponse::ok(cards)).into_response())
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let gallery = current_gallery(&state)?;
    let response = StatsResponse {
        stats: gallery.stats(),
        generated_at: gallery.generated_at(),
    };
    Ok(Json(ApiResponse::ok(response)).into_response())
}

// ============================================================================
// HTML Pages
// ============================================================================

/// GET / - Gallery page
async fn serve_gallery(State(state): State<AppState>, Query(query): Query<CardQuery>) -> Result<Response, ApiError> {
    let gallery = current_gallery(&state)?;
    let cards = gallery.query(&query.filter(), query.sort);
    Ok(Html(gallery_page(&cards, &gallery.stats())).into_response())
}

/// GET /cards/:id - Single card page
async fn serve_card(State(state): State<AppState>, Path(member_id): Path<String>) -> Result<Response, ApiError> {
    let gallery = current_gallery(&state)?;
    match gallery.find(&member_id) {
        Some(card) => Ok(Html(card_page(card)).into_response()),
        None => Err(ApiError::not_found(format!("No member with id {}", member_id))),
    }
}

// ============================================================================
// Discord login
// ============================================================================

fn discord_client(config: &AppConfig) -> Result<DiscordClient, ApiError> {
    DiscordClient::new(config.discord_settings(), Duration::from_secs(15)).map_err(|e| ApiError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: e.to_string(),
    })
}

/// GET /auth/discord?member_id= - Redirect to Discord's consent screen
async fn discord_login(State(state): State<AppState>, Query(query): Query<LoginQuery>) -> Result<Response, ApiError> {
    let client = discord_client(&state.config)?;
    let url = client.authorize_url(query.member_id.as_deref().unwrap_or(""));
    Ok(Redirect::temporary(&url).into_response())
}

/// GET /auth/callback?code=&state= - Exchange the code and link the member
async fn discord_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let config = Arc::clone(&state.config);
    let code = query.code.clone();

    // The Discord client is blocking
    let (user, member_of_guild) = tokio::task::spawn_blocking(move || {
        let client = discord_client(&config)?;
        let token = client.exchange_code(&code).map_err(|e| ApiError::internal("Discord code exchange failed", e))?;
        let user = client
            .fetch_user(&token.access_token)
            .map_err(|e| ApiError::internal("Discord user fetch failed", e))?;
        let member_of_guild = client
            .is_in_guild(&token.access_token)
            .map_err(|e| ApiError::internal("Discord guild check failed", e))?;
        Ok::<_, ApiError>((user, member_of_guild))
    })
    .await
    .map_err(|e| ApiError::internal("Discord task failed", e))??;

    let conn = state
        .db
        .lock()
        .map_err(|e| ApiError::internal("Database lock poisoned", e))?;
    let member_id = query.state.as_deref().filter(|s| !s.is_empty());
    let outcome = link_member(&conn, &user, member_id, member_of_guild)
        .map_err(|e| ApiError::internal("Failed to link member", e))?;

    match outcome {
        LinkOutcome::AlreadyLinked(member) | LinkOutcome::Linked(member) => {
            Ok(Redirect::to(&format!("/cards/{}", urlencoding::encode(&member.id))).into_response())
        }
        LinkOutcome::MemberTaken => Err(ApiError {
            status: StatusCode::CONFLICT,
            message: "This member is already linked to another Discord account".to_string(),
        }),
        LinkOutcome::NotInGuild => Err(ApiError {
            status: StatusCode::FORBIDDEN,
            message: "Discord account is not in the gym's server".to_string(),
        }),
        LinkOutcome::UnknownMember => Err(ApiError::not_found("No member linked to this Discord account".to_string())),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🌐 Skali Cards - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::load(None)?;

    let db_path = std::path::Path::new(&config.database_path);
    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: skali-cards import <members.csv> <performances.csv>");
        std::process::exit(1);
    }

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database opened: {:?}", db_path);

    let engine = engine_from_config(&config)?;
    let bind_addr = config.server.bind_addr.clone();

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: Arc::new(engine),
        config: Arc::new(config),
        peer: Arc::new(Mutex::new(None)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/cards", get(get_cards))
        .route("/cards/type/:type", get(get_cards_by_type))
        .route("/cards/:id", get(get_card))
        .route("/stats", get(get_stats))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .route("/", get(serve_gallery))
        .route("/cards/:id", get(serve_card))
        .route("/auth/discord", get(discord_login))
        .route("/auth/callback", get(discord_callback))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    println!("\n🚀 Server running on http://{}", bind_addr);
    println!("   API: http://{}/api/cards", bind_addr);
    println!("   UI:  http://{}", bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
