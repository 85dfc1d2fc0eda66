//! Wire vocabulary of the realtime duplex channel.

pub mod client_events;
pub mod models;
pub mod server_events;
