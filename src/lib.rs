pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod google;
pub mod logging;
pub mod providers;
pub mod sheet;

pub mod util {
    pub mod env;
}

pub use batch::runner::{JobRunner, RunOutcome};
pub use config::{AppConfig, JobSpec};
pub use error::{ProviderError, TransportError};
