mod api_key;
mod link;

pub use api_key::{ApiKeyRepository, ApiKeyRepositoryTrait};
pub use link::{LinkRepository, LinkRepositoryTrait};

#[cfg(test)]
pub use api_key::MockApiKeyRepositoryTrait;
#[cfg(test)]
pub use link::MockLinkRepositoryTrait;
