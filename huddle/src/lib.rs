//! Huddle client core.
//!
//! This crate is the transport and session backbone of the Huddle client:
//! a realtime WebSocket connection with category-based dispatch, and an
//! authenticated HTTP path that survives access-token expiry by refreshing
//! credentials mid-flight and retrying. Screens and business logic sit on
//! top of these pieces; nothing here knows what a message *means*.
//!
//! The main entry points are:
//!
//! - [`socket::Connection`] — the realtime socket with its send queue.
//! - [`registry::DispatchRegistry`] — routes inbound frames to listeners.
//! - [`auth::AuthExecutor`] — issues authenticated requests with refresh
//!   and bounded retry.
//! - [`sync::DeliverySync`] — the at-least-once undelivered-message sweep.

pub mod auth;
pub mod config;
pub mod http;
pub mod logging;
pub mod registry;
pub mod session;
pub mod socket;
pub mod sync;
