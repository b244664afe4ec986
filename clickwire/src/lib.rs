#![doc = include_str!("../README.md")]

mod client;
mod constants;
mod errors;
mod io;
pub mod native;
pub mod prelude;
mod query;

pub use client::*;
pub use errors::*;
pub use native::block::{Block, Column};
pub use native::block_info::BlockInfo;
pub use native::protocol::{ProfileInfo, Progress, ServerInfo};
/// The column types the codec understands, parsed from their wire spelling.
pub use native::types::Type;
pub use native::values::*;
pub use query::{ParsedQuery, Qid};
/// Re-exports
///
/// Exporting different external modules used by the library.
pub use reexports::*;

mod reexports {
    pub use chrono_tz::Tz;
    pub use indexmap::IndexMap;
    pub use uuid::Uuid;
    pub use {rustc_hash, tracing};
}

// Type aliases used throughout the library
pub use aliases::*;
mod aliases {
    /// A non-cryptographically secure [`std::hash::BuildHasherDefault`] using
    /// [`rustc_hash::FxHasher`].
    pub type HashBuilder = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
    /// A non-cryptographically secure [`indexmap::IndexMap`] using [`HashBuilder`].
    pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, HashBuilder>;
}

/// A decoded result row: column name to value, in server column order.
pub type Row = FxIndexMap<String, Value>;

/// A [`Client`] over a plain TCP stream.
pub type TcpClient = Client<tokio::net::TcpStream>;

// Silent lints for dev dependencies
#[cfg(test)]
mod dev_crates {
    use tracing_subscriber as _;
}
