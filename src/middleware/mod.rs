mod api_key;
mod request_logger;

pub use api_key::{ApiKeyIdentity, API_KEY_HEADER};
pub use request_logger::RequestLogger;
