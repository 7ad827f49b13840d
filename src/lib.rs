//! Client-side realtime layer for the Aliboard collaborative whiteboard.
//!
//! One [`Session`] per joined room keeps a WebSocket to
//! `{ws|wss}://{host}/ws/aliboard/{room}/`, queues sends while disconnected,
//! reconnects with capped backoff, drops echoes of its own messages, and
//! routes everything else into a last-writer-wins element store, host hooks
//! and named listeners.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Room resolution, identity, env loading, endpoint URL |
//! | [`session`] | Connection state machine and the outbound API |
//! | [`router`] | Inbound decoding, echo suppression, kind → handler table |
//! | [`store`] | Element map with subscribers |
//! | [`queue`] | Bounded FIFO of frames sent while offline |
//! | [`backoff`] | Reconnect delay schedule |
//! | [`throttle`] | Cursor send sampling |
//! | [`listeners`] | Event-name keyed callbacks |
//! | [`hooks`] | Board and chat/voice host traits |
//! | [`transport`] | Outbound seam between session and socket |
//! | [`connection`] | Tokio driver and [`RealtimeHandle`] |

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod listeners;
pub mod queue;
pub mod router;
pub mod session;
pub mod store;
pub mod throttle;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::RealtimeConfig;
pub use connection::{RealtimeHandle, spawn, start};
pub use error::RealtimeError;
pub use frames::{Element, Frame, GridState, MessageKind};
pub use hooks::{BoardHooks, SignalHandler};
pub use listeners::{CallbackError, CallbackResult, ListenerId};
pub use router::Disposition;
pub use session::{ConnectionState, Delivery, Session};
pub use store::{DocStore, SubscriptionId};
