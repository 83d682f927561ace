pub mod browsers;
pub mod config;
pub mod parse;
pub mod snapshot;
pub mod watch;
