//! The functions themselves, independent of HTTP.

pub mod files;
pub mod notifications;
pub mod orders;
pub mod stock;

pub use files::{FileKind, FileManagement, FileStore, InMemoryFileStore, LocalFileStore};
pub use notifications::{InMemoryQueue, NotificationQueue, ORDER_NOTIFICATIONS, STOCK_UPDATES};
pub use orders::OrderProcessing;
pub use stock::StockManagement;
