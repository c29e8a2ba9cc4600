//! RFC 2136 dynamic DNS update client with TSIG authentication.
//!
//! [`Rfc2136Provider`] lists the records of a zone and appends, replaces or
//! deletes records on a nameserver that accepts dynamic updates.

pub mod config;
pub mod dns;
pub mod dynamic_update;
pub mod error;
pub mod nameserver;
pub mod provider;
pub mod query;
pub mod record;
pub mod transport;

pub use config::ProviderConfig;
pub use dns::DNSPacket;
pub use dynamic_update::UpdateMode;
pub use error::{ConfigError, Result, Rfc2136Error};
pub use provider::{RecordProvider, Rfc2136Provider};
pub use record::{OwnerScope, Record};
pub use transport::{DnsTransport, Exchanger, Protocol};
