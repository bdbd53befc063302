//! GitHub implementation of the code host client, over octocrab.
//!
//! - [`error`] - Error types and their mapping to platform errors
//! - [`types`] - Wire shapes of the REST endpoints used
//! - [`client`] - Client creation, paging and the trait implementation
//! - [`convert`] - Conversion to platform types
//!
//! ```ignore
//! use gitrail::github::GitHubClient;
//! use gitrail::platform::RepositoryClient;
//!
//! let client = GitHubClient::new(&token, None)?;
//! let commits = client.list_commits(&"acme/app".parse()?, "main").await?;
//! ```

mod client;
mod convert;
mod error;
mod types;

pub use client::{
    GitHubClient, OctocrabClientFactory, REQUEST_TIMEOUT, create_client, get_rate_limit,
};
pub use error::{GitHubError, is_rate_limit_error};
pub use types::{DEFAULT_MAX_PAGES, PER_PAGE};
