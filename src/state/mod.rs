//! Shared server state: the hub registry and its satellite stores.

pub mod hub;
pub mod motd;
pub mod nick;
pub mod snapshot;

pub use hub::{Hub, HubConfig};
pub use motd::Motd;
