//! Storage seams implemented by the SeaORM adapters.

mod traits;

pub use traits::*;
