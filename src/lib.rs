pub mod auth;
pub mod client;
pub mod db;
pub mod error;
pub mod message;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{AppError, Result};
pub use routes::create_router;
pub use state::{AppState, Config};
