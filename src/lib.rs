#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the Go-Back-N ARQ protocol library.
//! Go-Back-N 自动重传协议库的根。

pub mod config;
pub mod error;
pub mod packet;
pub mod transport;

pub mod core;

pub use crate::core::{
    chunker::split_into_chunks,
    receiver::{Delivery, GbnReceiver, ReceiverHandle},
    sender::{GbnSender, SendReport},
};
pub use config::Config;
pub use error::{Error, Result};
