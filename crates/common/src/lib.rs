//! Shared identifier and money types used by every storefront crate.

mod money;
mod types;

pub use money::Money;
pub use types::{CustomerId, OrderId, ProductId, UserId};
