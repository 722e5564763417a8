//! # Commands Module
//!
//! One function per `nytax` subcommand.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports)
//! ├── import.rs    ◄─── import, show-import
//! ├── order.rs     ◄─── create-order, list-orders
//! ├── boundary.rs  ◄─── load-boundaries
//! └── health.rs    ◄─── check
//! ```
//!
//! Each command takes the state it needs plus its parsed arguments and
//! returns `Result<T, ApiError>` where `T: Serialize`. `main` prints either
//! side as JSON.

pub mod boundary;
pub mod health;
pub mod import;
pub mod order;
