//! Proxcast relay server library.
//!
//! Receiver selection ([`policy`], [`proximity`], [`throttle`]), liveness
//! monitoring ([`liveness`]) and disconnect bookkeeping ([`disconnect`]), plus
//! the WebSocket relay that drives them. Exposed for tests and binaries.

pub mod activity;
pub mod app;
pub mod config;
pub mod disconnect;
pub mod error;
pub mod liveness;
pub mod participant;
pub mod policy;
pub mod proximity;
pub mod registry;
pub mod relay_loop;
pub mod state;
pub mod throttle;
pub mod ws;
