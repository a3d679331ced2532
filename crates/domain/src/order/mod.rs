//! Orders and their status lifecycle.

mod model;
mod state;

pub use model::{Order, PlacedOrder, Transition};
pub use state::{OrderAction, OrderStatus};
