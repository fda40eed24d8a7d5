//! Domain-level building blocks shared across the API and storage crates.
//!
//! Everything here is storage-agnostic: the rate engine, the accrual plan for
//! a single access, the withdrawal ledger rules and the storage traits the
//! SeaORM adapters implement.

pub mod accrual;
pub mod config;
pub mod model;
pub mod rates;
pub mod services;
pub mod settings;
pub mod storage;
pub mod withdrawal;

pub use accrual::*;
pub use config::*;
pub use model::*;
pub use rates::*;
pub use services::*;
pub use settings::*;
pub use storage::*;
pub use withdrawal::*;
