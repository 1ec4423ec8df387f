//! Parfocal Hardware Abstraction Layer
//!
//! This crate defines the traits the focuser core uses to reach the outside
//! world. Chip- and board-specific code implements them; the core never
//! touches a peripheral directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Board glue (serial / HTTP / TCP, EEPROM)│
//! └──────────────────────────────────────────┘
//!                      │ implements
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │  parfocal-hal (this crate - traits)      │
//! └──────────────────────────────────────────┘
//!                      ▲ consumes
//!                      │
//! ┌──────────────────────────────────────────┐
//! │  parfocal-core                           │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`storage::NvStorage`] - Byte-addressed non-volatile record storage
//! - [`transport::Transport`] - Outbound text on a command channel

#![no_std]
#![deny(unsafe_code)]

pub mod storage;
pub mod transport;

// Re-export key traits at crate root for convenience
pub use storage::{check_bounds, NvStorage, StorageError};
pub use transport::{ChannelId, Transport};
