use std::net::SocketAddr;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::admin::{
    create_prize, delete_prize, list_point_events, list_prizes, reorder_prizes, update_prize,
};
use crate::api::handler::{get_progress, post_claim};
use crate::api::ingest::{ingest_adjustment, ingest_match_result};
use crate::api::middleware::cors;
use crate::api::middleware::identity::require_user_ident;
use crate::api::middleware::verify_admin::verify_admin_ident;
use crate::api::middleware::verify_gateway::verify_gateway_ident;
use crate::db::prelude::*;
use crate::util::env::{EnvErr, Var};
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db_pool: &'static PgPool,
}

#[instrument(skip(tx))]
pub async fn router(tx: UnboundedSender<SocketAddr>) {
    let state = Arc::new(AppState {
        db_pool: db_pool().await.unwrap(),
    });

    //
    // ledger feed from the match-result collaborator
    let internal_routes = Router::new()
        .route("/internal/match-result", post(ingest_match_result))
        .route("/internal/adjust", post(ingest_adjustment))
        .route_layer(middleware::from_fn(verify_gateway_ident));

    //
    // catalog curation
    let admin_routes = Router::new()
        .route("/admin/prizes", get(list_prizes).post(create_prize))
        .route("/admin/prizes/reorder", post(reorder_prizes))
        .route("/admin/prizes/{id}", put(update_prize).delete(delete_prize))
        .route("/admin/ledger/{user_id}", get(list_point_events))
        .route_layer(middleware::from_fn(verify_admin_ident));

    //
    // user-facing progression routes, identity set by the auth gateway
    let user_routes = Router::new()
        .route("/progress", get(get_progress))
        .route("/claim/{prize_id}", post(post_claim))
        .route_layer(middleware::from_fn(require_user_ident));

    let app = Router::new()
        .merge(internal_routes)
        .merge(admin_routes)
        .merge(user_routes)
        .route("/", get(|| async { Response::new(Body::empty()) }))
        .route("/checkhealth", get(|| async { "SERVER_OK" }))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors::cors_layer())
        .with_state(state);

    let port = var!(Var::ServerApiPort)
        .await
        .unwrap()
        .parse::<u16>()
        .unwrap();

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await.unwrap();

    tx.send(socket_addr).unwrap();
    axum::serve(listener, app).await.unwrap()
}

/// Surfaces `RouteError`s left in response extensions by `IntoResponse`, so
/// handler failures are traced with their originating route.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(tx, rx))]
pub async fn start_server(
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let server_handle = tokio::task::spawn(async move {
        router(tx).await;
    });

    let logging_handle = tokio::task::spawn(async move {
        while !rx.is_closed() {
            if let Some(msg) = rx.recv().await {
                tracing::info!(
                    server_url = &format!("http://127.0.0.1:{}", msg.port()),
                    "server ready"
                );
                break;
            }
        }
    });

    let handles = vec![server_handle, logging_handle];
    Ok(handles)
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    QueryError(#[from] PgError),

    #[error(transparent)]
    SqlxError(#[from] sqlx::error::Error),

    #[error(transparent)]
    EnvError(#[from] EnvErr),

    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("display_order already in use by an active prize")]
    DuplicateDisplayOrder,

    #[error("prize '{prize_id}' has {claims} claim(s) and cannot be hard-deleted")]
    PrizeHasClaims { prize_id: PrizeId, claims: i64 },

    #[error("no prize with id '{0}'")]
    PrizeNotFound(PrizeId),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            field: Option<&'static str>,
        }

        let (status, message, field) = match &self {
            RouteError::Validation(err) => {
                (StatusCode::BAD_REQUEST, err.reason.clone(), Some(err.field))
            }

            RouteError::DuplicateDisplayOrder => {
                (StatusCode::CONFLICT, self.to_string(), None)
            }

            RouteError::PrizeHasClaims { .. } => (StatusCode::CONFLICT, self.to_string(), None),

            RouteError::PrizeNotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),

            RouteError::QueryError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
            }

            RouteError::SqlxError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
            }

            RouteError::EnvError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
            }
        };

        let mut response = (status, Json(ErrorResponse { message, field })).into_response();
        response.extensions_mut().insert(Arc::new(self));

        response
    }
}
