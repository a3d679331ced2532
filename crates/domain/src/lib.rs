//! Storefront business rules.
//!
//! Everything here is synchronous and free of I/O: the entities the store
//! persists, and the rules applied when carts, orders and stock change.
//! - [`cart`]: cart lines and the merge rules for adding products
//! - [`checkout`]: turning a cart into one order per line
//! - [`order`]: the order record and its status state machine
//! - [`product`]: catalog products and stock movements
//! - [`account`]: users, customers, registration and password hashing

pub mod account;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod order;
pub mod product;

pub use account::{
    Customer, Registration, Role, User, hash_password, secrets_match, verify_password,
};
pub use cart::{Cart, CartItem, CartLine, CartSummary};
pub use checkout::{CheckoutPlan, plan_checkout};
pub use error::DomainError;
pub use order::{Order, OrderAction, OrderStatus, PlacedOrder, Transition};
pub use product::{MAX_PRICE_CENTS, Product, ProductDraft, StockEdit, StockMovement, StockReason};
