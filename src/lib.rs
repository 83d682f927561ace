//! Watch a partner order list page in a real browser, click every new order
//! card and log the parsed order details to flat files.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod order;
pub mod output;
pub mod wait;
pub mod watch;

pub use error::{Result, WatchError};
