//! Shared primitives for the `treb` workspace: the aggregated error type, deterministic id
//! construction, atomic JSON persistence, the cross-process advisory lock, and cancellation.

pub mod cancel;
pub mod error;
pub mod fs;
pub mod ids;
pub mod lock;
pub mod time;

pub use cancel::CancelToken;
pub use error::{Result, ResultExt, TrebError};
