//! Log-sink capability (spec §6): a single `log(message)` operation consumed
//! by the reactor for lifecycle and per-query events, with the sink injected
//! by the caller — the same external-collaborator boundary `hr-dns` draws
//! around its `QueryLogger`, but emitting through `tracing` instead of a
//! background file writer since the core has no query-log file of its own.

use tracing::info;

/// Injected by the caller; the reactor only ever calls `log`.
pub trait QuerySink: Send + Sync {
    fn log(&self, message: &str);
}

/// Default sink: forwards to the `tracing` subscriber installed by `main`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl QuerySink for TracingSink {
    fn log(&self, message: &str) {
        info!("{}", message);
    }
}
