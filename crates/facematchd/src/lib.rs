//! facematchd — HTTP service comparing the face on a CNIC card with a profile picture.
//!
//! Images arrive as multipart uploads or URLs, are resolved to bytes by the
//! [`resolver`], and are compared on the inference [`engine`] thread.

pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod routes;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::ApiError;
pub use resolver::{ImageResolver, ImageSource};
pub use routes::{router, AppState};
