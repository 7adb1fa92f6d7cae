//! Domain model: identifiers, credentials, providers, and access tokens.

pub mod credential;
pub mod id;
pub mod provider;
pub mod token;

pub use credential::*;
pub use id::*;
pub use provider::*;
pub use token::*;
