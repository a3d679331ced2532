//! Storefront operations that run against the store directly.

pub mod accounts;
pub mod cart;
pub mod orders;

pub use accounts::AccountService;
pub use cart::{CartService, CheckoutReceipt};
pub use orders::{NewOrder, OrderService};

use domain::{DomainError, Product};
use store::{StockChange, Store};

use crate::error::StorefrontError;

/// Takes `quantity` units of `product` out of stored stock.
///
/// The store checks and decrements in one step, so a request that lost the
/// race to another buyer gets the usual insufficient-stock error.
pub(crate) async fn withdraw<S: Store>(
    store: &S,
    product: &Product,
    quantity: u32,
) -> Result<StockChange, StorefrontError> {
    if let Some(change) = store.withdraw_stock(product.id, quantity).await? {
        return Ok(change);
    }
    let available = store
        .get_product(product.id)
        .await?
        .map_or(0, |current| current.stock_available);
    Err(DomainError::InsufficientStock {
        product_name: product.name.clone(),
        available,
        requested: quantity,
    }
    .into())
}
