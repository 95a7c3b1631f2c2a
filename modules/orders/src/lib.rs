pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod repo;
pub mod service;

pub use domain::{Order, OrderCancelled, OrderPlaced, OrderStatus};
pub use error::OrderError;
pub use repo::OrderReader;
pub use service::OrderService;
