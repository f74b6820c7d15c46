//! Flood control, IP denylist, and admin authentication.

pub mod bans;
pub mod bucket;
pub mod password;

pub use bans::BanList;
pub use bucket::TokenBucket;
