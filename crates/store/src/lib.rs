//! Persistence for the storefront.
//!
//! [`Store`] is the seam both services talk to. [`InMemoryStore`] backs tests
//! and local runs without a database; [`PostgresStore`] is the production
//! implementation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{StockChange, Store, StoreCounts};
