//! JSON configuration loading (spec §6). Delivered to the core as a parsed
//! table of records — this module is the "external collaborator" spec.md §1
//! keeps out of the core proper, following `hr-dns::config`'s serde style.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::records::RecordType;
use crate::table::RecordTable;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown record type {type_str:?} for host {host:?}")]
    UnknownRecordType { type_str: String, host: String },
    #[error("invalid answer {value:?} for {type_str} record {host:?}: {reason}")]
    InvalidAnswer {
        type_str: String,
        host: String,
        value: String,
        reason: String,
    },
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    10000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    #[serde(rename = "type")]
    pub type_str: String,
    pub host: String,
    pub response: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub records: Vec<RecordConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            records: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Eagerly rejects unknown record types and malformed answer text, so a
    /// bad config fails fast at startup (spec §7: `ConfigError` is fatal)
    /// instead of surfacing as a per-query `ServerFailure` later.
    fn validate(&self) -> Result<(), ConfigError> {
        for record in &self.records {
            let Some(rtype) = RecordType::from_text(&record.type_str) else {
                return Err(ConfigError::UnknownRecordType {
                    type_str: record.type_str.clone(),
                    host: record.host.clone(),
                });
            };
            for value in &record.response {
                if let Err(reason) = crate::records::RecordBody::from_text(rtype, value) {
                    return Err(ConfigError::InvalidAnswer {
                        type_str: record.type_str.clone(),
                        host: record.host.clone(),
                        value: value.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn build_table(&self) -> RecordTable {
        let mut table = RecordTable::new();
        for record in &self.records {
            // Already validated in `load`; `from_text` cannot fail here.
            let rtype = RecordType::from_text(&record.type_str)
                .expect("record type was validated at load time");
            table.add_record(rtype, &record.host, record.response.clone());
        }
        table
    }
}
