pub mod backends;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod relay;
pub mod template;
pub mod translate;

pub use backends::Backend;
pub use config::BridgeConfig;
pub use dispatch::{Dispatcher, InferenceStrategy};
pub use error::{BridgeError, Result};
pub use logging::SharedLogger;
pub use translate::request::{ProviderRequest, TranslationParams};
pub use translate::streaming::ToolCallIndexState;
