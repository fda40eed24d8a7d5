//! Shared service helpers: settings caching, credentials, mail and telemetry.

pub mod cache;
pub mod credentials;
pub mod mailer;
pub mod telemetry;

pub use cache::*;
pub use credentials::*;
pub use mailer::*;
pub use telemetry::*;
