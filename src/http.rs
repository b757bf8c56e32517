use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::http::{header, StatusCode};
use actix_web::web::{self, Data};
use actix_web::{App, HttpResponse, HttpServer, ResponseError};
use bytes::Bytes;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error};
use ulid::Ulid;

use crate::auth::{self, AuthError, Operator, TokenSecret};
use crate::config::Config;
use crate::engine::{BlockRequest, BookingRequest, Engine, EngineError};
use crate::lifecycle::local_now;
use crate::notify::Notice;

/// Where temporal checks get their "now". The service reads the wall clock
/// in the calendar's timezone; tests pin an instant and the whole surface
/// becomes deterministic.
#[derive(Clone, Copy)]
pub enum CalendarClock {
    Wall(Tz),
    Fixed(NaiveDateTime),
}

impl CalendarClock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            CalendarClock::Wall(tz) => local_now(*tz),
            CalendarClock::Fixed(instant) => *instant,
        }
    }
}

/// The single operator account, checked by the login exchange.
#[derive(Clone)]
pub struct OperatorCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

// ── Response plumbing ────────────────────────────────────────

/// Map an engine failure onto the wire. Client-correctable kinds come back
/// as 400 with the stable kind and the human-readable reason; a store
/// failure is logged and surfaced as a generic 500, detail stays server-side.
fn failure(e: &EngineError) -> HttpResponse {
    match e {
        EngineError::Store(_) => {
            error!("request failed in the store: {e}");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "store_error",
                "message": "internal error",
            }))
        }
        _ => HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": e.kind(),
            "message": e.to_string(),
        })),
    }
}

fn observe(op: &'static str, started: Instant, status: StatusCode) {
    metrics::counter!(
        crate::observability::REQUESTS_TOTAL,
        "op" => op,
        "status" => status.as_u16().to_string(),
    )
    .increment(1);
    metrics::histogram!(crate::observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}

// ── Public surface ───────────────────────────────────────────

async fn list_calendar(engine: Data<Engine>) -> HttpResponse {
    let started = Instant::now();
    let snapshot = engine.snapshot().await;
    let response = HttpResponse::Ok().json(json!({
        "success": true,
        "appointments": snapshot.appointments,
        "blockedSlots": snapshot.blocked_slots,
    }));
    observe("list_calendar", started, response.status());
    response
}

async fn get_catalog(engine: Data<Engine>) -> HttpResponse {
    let started = Instant::now();
    let catalog = engine.catalog();
    let start_times: Vec<String> = catalog
        .start_times()
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect();
    let response = HttpResponse::Ok().json(json!({
        "success": true,
        "weekday": catalog.weekday,
        "weekend": catalog.weekend,
        "startTimes": start_times,
    }));
    observe("get_catalog", started, response.status());
    response
}

async fn create_appointment(
    engine: Data<Engine>,
    clock: Data<CalendarClock>,
    body: web::Json<BookingRequest>,
) -> HttpResponse {
    let started = Instant::now();
    let response = match engine.book_slot(&body, clock.now()).await {
        Ok(appointment) => {
            debug!("booked {} {}", appointment.date, appointment.time.format("%H:%M"));
            HttpResponse::Created().json(json!({
                "success": true,
                "appointment": appointment,
            }))
        }
        Err(e) => failure(&e),
    };
    observe("create_appointment", started, response.status());
    response
}

// ── Event stream ─────────────────────────────────────────────

/// Tracks one connected viewer for the gauge; decrements when the stream
/// is dropped, however the connection ends.
struct ViewerGuard;

impl ViewerGuard {
    fn connect() -> Self {
        metrics::counter!(crate::observability::VIEWERS_TOTAL).increment(1);
        metrics::gauge!(crate::observability::VIEWERS_ACTIVE).increment(1.0);
        Self
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        metrics::gauge!(crate::observability::VIEWERS_ACTIVE).decrement(1.0);
    }
}

fn sse_frame(notice: &Notice) -> Bytes {
    let data = match notice {
        Notice::AppointmentCreated(appointment) => {
            serde_json::to_string(appointment).unwrap_or_else(|_| "{}".into())
        }
        Notice::SlotUpdated | Notice::WeeklyReset => "{}".into(),
    };
    Bytes::from(format!("event: {}\ndata: {data}\n\n", notice.name()))
}

/// Server-sent events: every committed calendar change fans out here.
/// Best-effort only — a viewer that lags drops old notices and is expected
/// to reconcile with a full fetch, same as one that reconnects.
async fn event_stream(engine: Data<Engine>) -> HttpResponse {
    let rx = engine.notify.subscribe();
    let guard = ViewerGuard::connect();

    let notices = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        loop {
            match rx.recv().await {
                Ok(notice) => {
                    return Some((Ok::<_, actix_web::Error>(sse_frame(&notice)), (rx, guard)));
                }
                // Dropped notices are the viewer's cue to refetch; the
                // stream itself stays up.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });
    let hello = stream::once(async { Ok(Bytes::from_static(b": connected\n\n")) });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(hello.chain(notices))
}

// ── Operator surface ─────────────────────────────────────────

async fn login(
    credentials: Data<OperatorCredentials>,
    secret: Data<TokenSecret>,
    body: web::Json<LoginRequest>,
) -> HttpResponse {
    let started = Instant::now();
    let response = if body.username == credentials.username
        && body.password == credentials.password
    {
        match auth::issue_token(&body.username, &secret.0) {
            Ok(token) => HttpResponse::Ok().json(json!({ "success": true, "token": token })),
            Err(e) => {
                error!("token signing failed: {e}");
                HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": "store_error",
                    "message": "internal error",
                }))
            }
        }
    } else {
        metrics::counter!(
            crate::observability::AUTH_FAILURES_TOTAL,
            "kind" => AuthError::InvalidCredentials.kind(),
        )
        .increment(1);
        AuthError::InvalidCredentials.error_response()
    };
    observe("login", started, response.status());
    response
}

async fn admin_appointments(engine: Data<Engine>, _operator: Operator) -> HttpResponse {
    let started = Instant::now();
    let appointments = engine.appointments_sorted().await;
    let response = HttpResponse::Ok().json(json!({
        "success": true,
        "appointments": appointments,
    }));
    observe("admin_appointments", started, response.status());
    response
}

async fn admin_slots(engine: Data<Engine>, _operator: Operator) -> HttpResponse {
    let started = Instant::now();
    let snapshot = engine.snapshot().await;
    let response = HttpResponse::Ok().json(json!({
        "success": true,
        "appointments": snapshot.appointments,
        "blockedSlots": snapshot.blocked_slots,
    }));
    observe("admin_slots", started, response.status());
    response
}

async fn admin_delete_appointment(
    engine: Data<Engine>,
    _operator: Operator,
    path: web::Path<String>,
) -> HttpResponse {
    let started = Instant::now();
    let response = match Ulid::from_string(&path) {
        Ok(id) => match engine.delete_appointment(&id).await {
            // Deleting an unknown id reports success too: already gone.
            Ok(removed) => HttpResponse::Ok().json(json!({
                "success": true,
                "removed": removed,
            })),
            Err(e) => failure(&e),
        },
        Err(_) => failure(&EngineError::Validation(
            "id must be a valid appointment identifier".into(),
        )),
    };
    observe("admin_delete_appointment", started, response.status());
    response
}

async fn admin_block_slot(
    engine: Data<Engine>,
    _operator: Operator,
    body: web::Json<BlockRequest>,
) -> HttpResponse {
    let started = Instant::now();
    let response = match engine.block_slot(&body).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "blockedSlot": { "date": body.date, "time": body.time },
        })),
        Err(e) => failure(&e),
    };
    observe("admin_block_slot", started, response.status());
    response
}

async fn admin_unblock_slot(
    engine: Data<Engine>,
    _operator: Operator,
    body: web::Json<BlockRequest>,
) -> HttpResponse {
    let started = Instant::now();
    let response = match engine.unblock_slot(&body).await {
        Ok(removed) => HttpResponse::Ok().json(json!({
            "success": true,
            "removed": removed,
        })),
        Err(e) => failure(&e),
    };
    observe("admin_unblock_slot", started, response.status());
    response
}

// ── App assembly ─────────────────────────────────────────────

/// Route table, shared between the real server and the in-process test app.
/// App data (engine, clock, credentials, token secret) is registered by the
/// caller.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/appointments", web::get().to(list_calendar))
            .route("/appointments", web::post().to(create_appointment))
            .route("/catalog", web::get().to(get_catalog))
            .route("/events", web::get().to(event_stream))
            .service(
                web::scope("/admin")
                    .route("/login", web::post().to(login))
                    .route("/appointments", web::get().to(admin_appointments))
                    .route(
                        "/appointments/{id}",
                        web::delete().to(admin_delete_appointment),
                    )
                    .route("/slots", web::get().to(admin_slots))
                    .route("/block-slot", web::post().to(admin_block_slot))
                    .route("/unblock-slot", web::post().to(admin_unblock_slot)),
            ),
    );
}

fn cors_for(origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(3600);
    for origin in origins {
        cors = cors.allowed_origin(origin);
    }
    cors
}

/// Bind and serve until shutdown. actix handles ctrl-c and drains workers.
pub async fn serve(engine: Arc<Engine>, config: Config) -> std::io::Result<()> {
    let engine = Data::from(engine);
    let clock = Data::new(CalendarClock::Wall(config.reset_timezone));
    let secret = Data::new(TokenSecret(config.token_secret.clone()));
    let credentials = Data::new(OperatorCredentials {
        username: config.operator_username.clone(),
        password: config.operator_password.clone(),
    });
    let origins = config.allowed_origins.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .app_data(clock.clone())
            .app_data(secret.clone())
            .app_data(credentials.clone())
            .wrap(cors_for(&origins))
            .configure(routes)
    })
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await
}
