pub mod routes;
pub mod server;

pub use routes::SESSION_HEADER;
pub use server::{AppState, HttpServer};
