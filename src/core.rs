pub mod error;
pub mod http;
pub mod traits;
pub mod types;

pub use error::{CompletionError, ErrorClass, UpstreamError};
pub use http::{HttpClient, HttpClientConfig};
pub use traits::CompletionBackend;
pub use types::{DEFAULT_SYSTEM_MESSAGE, EMPTY_RESPONSE_FALLBACK, Prompt};
