mod events;
mod middleware;
mod router;
mod state;
pub mod targets;

pub use router::{create_router, serve_until};
pub use state::AppState;
