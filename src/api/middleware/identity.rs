use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::StatusCode;

use crate::constants::USER_ID_HEADER;
use crate::db::models::balance::UserId;

/// Pulls the verified user identity out of the gateway-set header and makes
/// it available to handlers as a request extension. Requests without one
/// never reach a progression route.
pub async fn require_user_ident(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id: UserId = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(UserId::from)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
