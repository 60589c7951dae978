#![no_std]
#[cfg(feature = "std")]
extern crate std;

mod frame;
mod mutex;
mod utils;

pub mod clock;
pub mod registers;
pub mod host;
pub mod scene;
pub mod director;
#[cfg(feature = "sim")]
pub mod sim;

pub use frame::{AddressFrame, Direction, HostCommand, Transaction, READY, MAX_CHUNK, READ_LATENCY};
