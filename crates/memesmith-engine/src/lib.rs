pub mod acquisition;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod providers;

pub use acquisition::{acquire_from_file, ImageAcquirer, ImageSource};
pub use error::{
    error_chain_text, AcquisitionError, EditError, ErrorKind, GenerationError, ServiceError,
};
pub use export::{export_path, save_image};
pub use orchestrator::{Orchestrator, Outcome};
pub use providers::{build_client, ClientConfig, DryrunClient, GeminiClient, GenerativeClient};
