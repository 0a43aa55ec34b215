mod link;

pub use link::{validate_custom_alias, validate_url};
