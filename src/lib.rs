pub mod config;
pub mod intake;
pub mod models;
pub mod pipeline;
pub mod pipeline_config;
pub mod store;

pub use intake::{CredentialIntake, IntakeError};
pub use models::{CredentialField, CredentialFields, ExtractionResult, MediaKind, SourceDocument};
pub use pipeline::extraction::ExtractionError;
pub use pipeline::processor::{build_processor, CredentialProcessor};
pub use pipeline_config::PipelineConfig;
pub use store::{ExtractionStore, JsonDirStore, MemoryStore, StoreError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
