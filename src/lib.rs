//! Statement patterns over an embedded SQLite database.
//!
//! # Intention
//!
//! - Show the classic ways of talking to a relational database: plain
//!   statements, reusable prepared statements, batched statements, result-set
//!   iteration and callable statements.
//! - Keep SQLite-specific logic, types, and error handling behind the
//!   [`sqlite`] module so the [`runner`] reads as a plain sequence of steps.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code and the demonstration sequence belong here.
//! - Console output is written to a caller-supplied [`std::io::Write`]; logs go
//!   through the `log` facade.

pub mod config;
pub mod error;
pub mod logging;
pub mod order_item;
pub mod runner;
pub mod sqlite;

pub use config::DemoConfig;
pub use error::DatabaseError;
pub use order_item::OrderItem;
pub use runner::{DemoReport, DemoRunner};
