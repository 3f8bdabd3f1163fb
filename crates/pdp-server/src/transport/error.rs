//! HTTP error mapping for both planes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdp_core::error::{ClientCode, PdpError};
use serde_json::json;

/// `PdpError` as an HTTP response: `{ "error": CODE, "message": ... }`.
#[derive(Debug)]
pub struct ApiError(pub PdpError);

impl From<PdpError> for ApiError {
    fn from(e: PdpError) -> Self {
        Self(e)
    }
}

pub fn status_for(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::BadRequest | ClientCode::UnsupportedVersion => StatusCode::BAD_REQUEST,
        ClientCode::InvalidPolicy | ClientCode::EvaluationFailed => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ClientCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let body = Json(json!({
            "error": code.as_str(),
            "message": self.0.to_string(),
        }));
        (status_for(code), body).into_response()
    }
}
