use crate::shared::error::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use log::{error, warn};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Invalid {field} time format")]
    InvalidTimestamp {
        field: &'static str,
        #[source]
        source: chrono::ParseError,
    },
    #[error("Missing required query parameter: {0}")]
    MissingParameter(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Storage query failed: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTimestamp { .. } | Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::InvalidTimestamp { source, .. } => {
                error!("{}: {}", self, source);
                json!({ "message": self.to_string(), "error": source.to_string(), "time": Utc::now() })
            }
            Self::MissingParameter(_) => {
                error!("{}", self);
                json!({ "message": self.to_string(), "time": Utc::now() })
            }
            Self::NotFound(_) => {
                warn!("{}", self);
                json!({ "message": self.to_string(), "time": Utc::now() })
            }
            Self::Storage(e) => {
                error!("{} ({:?})", self, e);
                json!({ "message": self.to_string(), "time": Utc::now() })
            }
        };

        (status, Json(body)).into_response()
    }
}
