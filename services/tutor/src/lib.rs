pub mod adapters;
pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use adapters::HttpBackendAdapter;
pub use config::Config;
pub use error::ClientError;
pub use session::TutorSession;
pub use state::OperationState;
