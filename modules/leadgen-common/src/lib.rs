pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::Config;
pub use error::LeadGenError;
pub use identity::{normalize_domain, normalize_email, EntityKind, IdentityKey};
pub use types::*;
