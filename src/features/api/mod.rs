mod error;
mod handlers;
mod router;

pub use error::ApiError;
pub use handlers::{parse_timestamp, AverageBody, AverageResponse, ListResponse};
pub use router::{create_router, AppState};
