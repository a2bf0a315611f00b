//! Configuration loading.
//!
//! Account descriptors are read once per invocation from a JSON file in the
//! user's config directory and treated as immutable afterwards.

mod settings;

pub use settings::{AccountsConfig, DEFAULT_ACCOUNT};
