//! feedwatch: announce newly-appeared game-data records in a Discord channel.
//!
//! Each configured feed (JSON or CSV over HTTP) is polled on a fixed
//! interval. Record identifiers are diffed against the previous poll; every
//! identifier not seen before is posted to the configured channel. The first
//! poll of a feed only records a baseline.

pub mod bot;
pub mod config;
pub mod diff;
pub mod feed;
pub mod notify;
pub mod poller;
pub mod snapshot;
pub mod util;
