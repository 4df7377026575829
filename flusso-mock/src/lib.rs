//! Test doubles for the flusso engine.
//!
//! [`pair`] builds an in-memory [`MockTransport`]/[`MockServer`] link
//! so integration tests can play the venue side of a connection frame
//! by frame, and [`MockVenue`] is a small reference adapter speaking
//! the `{event|topic, data}` dialect the engine routes on.
#![warn(missing_docs)]

mod transport;
mod venue;

pub use transport::{MockPeer, MockServer, MockStream, MockTransport, pair};
pub use venue::{MockState, MockUpdate, MockVenue, Ticker, Trade};
