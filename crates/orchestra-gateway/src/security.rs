//! Service-to-service auth (§6 "INTERNAL_SERVICE_SECRET"): when a secret
//! is configured, every request must carry a matching
//! `X-Internal-Service-Secret` header. Comparison uses `subtle` to avoid
//! leaking the secret's value through response-timing side channels.

use axum::extract::Request as AxumRequest;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

const SECRET_HEADER: &str = "x-internal-service-secret";

#[derive(Clone)]
pub struct ServiceSecret(pub Option<String>);

pub async fn require_service_secret(
    axum::extract::State(secret): axum::extract::State<ServiceSecret>,
    request: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &secret.0 else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1 && provided.len() == expected.len() {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
