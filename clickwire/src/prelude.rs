//! ## Convenience exports for working with the library.
pub use tracing::{Instrument, Span, debug, error, info, instrument, trace, trace_span, warn};

pub use crate::client::{Client, ClientOptions, Destination, QueryResult};
pub use crate::errors::*;
pub use crate::native::block::{Block, Column};
pub use crate::native::protocol::*;
pub use crate::native::types::Type;
pub use crate::native::values::*;
pub use crate::query::{ParsedQuery, Qid};
pub use crate::{Row, TcpClient};

/// Newtype to protect secrets from being logged
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Secret(String);

impl Secret {
    pub fn new<P: AsRef<str>>(s: P) -> Self { Self(s.as_ref().to_string()) }

    #[must_use]
    pub fn get(&self) -> &str { &self.0 }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password(*****)")
    }
}

impl<T: AsRef<str>> From<T> for Secret {
    fn from(s: T) -> Self { Self(s.as_ref().to_string()) }
}
