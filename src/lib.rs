//! Cachewire: a client for a remote cache and topic publish/subscribe service.
//!
//! # Architecture
//!
//! - **Credentials**: one opaque auth token resolves to an API key plus the
//!   control and cache endpoints
//! - **Errors**: every transport status goes through one classifier into a
//!   stable [`DomainError`] taxonomy
//! - **Topics**: unary publish and a server-streaming subscription that filters
//!   control frames and tracks a resume cursor
//!
//! # Modules
//!
//! - [`client`]: Topic client, publish and subscription handling
//! - [`config`]: Transport configuration
//! - [`credential`]: Auth token parsing
//! - [`error`]: Domain errors and the status classifier
//! - [`proto`]: Re-exported protobuf code
//!
//! # Example
//!
//! ```no_run
//! use cachewire::{Credential, SubscriptionItem, TopicClient};
//!
//! # async fn run() -> Result<(), cachewire::DomainError> {
//! let credential = Credential::from_env_var("CACHEWIRE_AUTH_TOKEN")?;
//! let client = TopicClient::builder(credential).build()?;
//!
//! let mut subscription = client.subscribe("cache", "topic").await;
//! client.publish("cache", "topic", "hello").await?;
//!
//! while let Some(item) = subscription.next_item().await {
//!     match item {
//!         SubscriptionItem::Text(text) => println!("{text}"),
//!         SubscriptionItem::Binary(bytes) => println!("{} bytes", bytes.len()),
//!         SubscriptionItem::Error(err) => eprintln!("{err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // client::TopicClient is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod proto;

pub use client::{
    PublishResult, Subscription, SubscriptionCloser, SubscriptionItem, TopicClient, TopicValue,
};
pub use config::TopicConfig;
pub use credential::{Credential, CredentialError};
pub use error::{classify, DomainError, ErrorKind};
