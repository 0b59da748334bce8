#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! The engine of a ping utility.
//!
//! A [`Pinger`] sends one ICMP (v4 or v6) echo request per tick to a single
//! resolved host, waits for the matching echo reply until a deadline and
//! aggregates the outcome into [`Stats`]. Printing, argument parsing and signal
//! handling are left to the caller: it holds a [`ShutdownHandle`] to stop
//! [`Pinger::run`] and reads the [`Summary`] once `run` has returned.

pub use config::PingerConfig;
pub use ping_error::{PingError, PingResult};
pub use ping_output::PingOutput;
pub use pinger::Pinger;
pub use resolve::lookup_host;
pub use shutdown::ShutdownHandle;
pub use stats::{RttSummary, Stats, Summary};

mod config;
mod details;
mod ping_error;
mod ping_output;
mod pinger;
mod resolve;
mod shutdown;
mod stats;
