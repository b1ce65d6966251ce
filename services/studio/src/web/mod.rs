pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the router so the binary can mount it next to the Swagger UI.
pub use rest::{api_router, ApiDoc};
