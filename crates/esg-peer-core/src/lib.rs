pub mod error;
pub mod types;

#[cfg(feature = "scoring")]
pub mod scoring;

#[cfg(feature = "returns")]
pub mod returns;

#[cfg(feature = "compliance")]
pub mod compliance;

pub use error::EsgPeerError;
pub use types::*;

/// Standard result type for all esg-peer operations
pub type EsgPeerResult<T> = Result<T, EsgPeerError>;
