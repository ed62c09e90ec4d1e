//! Vanity Redis - networked assignment store
//!
//! A small RESP client over `tokio::net::TcpStream` and [`RedisStore`], the
//! [`Store`](vanity_experiment::Store) implementation used outside test mode.
//!
//! # Key layout
//!
//! ```text
//! <ns>:<experiment>:participant:<identity>:show   alternative index (SET NX)
//! <ns>:<experiment>:alts:<index>:participants     set of identities
//! <ns>:<experiment>:alts:<index>:converted        set of identities
//! <ns>:<experiment>:alts:<index>:conversions      counter
//! <ns>:metrics:<metric>:<yyyy-mm-dd>:value        counter
//! ```
//!
//! The connection is opened lazily on the first command and re-opened after
//! any IO failure. Connect and command round trips share one timeout; both
//! failures surface as connectivity errors.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod client;
pub mod resp;
pub mod store;

pub use client::RedisClient;
pub use resp::{RespError, RespValue};
pub use store::{RedisStore, DEFAULT_NAMESPACE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
