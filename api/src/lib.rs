pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod submit;
pub mod validate;

pub use config::Config;
pub use error::ApiError;
pub use session::SessionStore;
pub use state::AppState;
