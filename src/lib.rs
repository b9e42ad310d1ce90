//! Authoritative-only DNS server library: a static in-memory record table
//! served over UDP and TCP with a single-threaded reactor.

pub mod buffer;
pub mod config;
pub mod control;
pub mod logging;
pub mod message;
pub mod query;
pub mod reactor;
pub mod records;
pub mod table;
pub mod wire;

pub use config::{ConfigError, RecordConfig, ServerConfig};
pub use logging::{QuerySink, TracingSink};
pub use reactor::DnsServer;
pub use records::{RecordBody, RecordType, ResultCode};
pub use table::RecordTable;
