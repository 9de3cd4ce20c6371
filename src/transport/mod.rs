//! Wire layer: per-origin clients, the client pool, the bounded body
//! reader, and redirect policy.

pub mod client;
pub mod pool;
pub(crate) mod reader;
pub(crate) mod redirect;

pub use client::{Origin, OriginClient};
pub use pool::ClientPool;
