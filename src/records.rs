//! Record type/result-code tags and per-type answer-body codecs (RFC 1035 §3.2, §3.3).

use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::buffer::{EncodeError, OutputBuffer};
use crate::wire::{read_domain, read_string, read_u16, WireError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyDecodeError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("A record RDLENGTH must be 4, got {0}")]
    BadARecordLength(u16),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyEncodeError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Rejects domain-name text `OutputBuffer::append_domain` would refuse to
/// encode: a label over 63 bytes, an empty label (leading/trailing/double
/// dot), or a name over 255 bytes. Mirrors the limits `append_domain`
/// enforces in `src/buffer.rs` so a bad name is caught at config load
/// instead of panicking at query time.
fn validate_domain_text(name: &str) -> Result<(), String> {
    if name.len() > 255 {
        return Err(format!("domain name exceeds 255 bytes: {name:?}"));
    }
    if name.is_empty() {
        return Ok(());
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(format!("label {label:?} in {name:?} must be 1-63 bytes"));
        }
    }
    Ok(())
}

/// A DNS resource record type, tagged over the wire type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    CNAME,
    PTR,
    MX,
    TXT,
    Other(u16),
}

impl RecordType {
    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => Self::A,
            5 => Self::CNAME,
            12 => Self::PTR,
            15 => Self::MX,
            16 => Self::TXT,
            other => Self::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::CNAME => 5,
            Self::PTR => 12,
            Self::MX => 15,
            Self::TXT => 16,
            Self::Other(v) => v,
        }
    }

    /// Parses the textual spelling used in the JSON config, case-insensitively.
    pub fn from_text(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "CNAME" => Some(Self::CNAME),
            "PTR" => Some(Self::PTR),
            "MX" => Some(Self::MX),
            "TXT" => Some(Self::TXT),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::CNAME => write!(f, "CNAME"),
            Self::PTR => write!(f, "PTR"),
            Self::MX => write!(f, "MX"),
            Self::TXT => write!(f, "TXT"),
            Self::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// 4-bit DNS result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
}

impl ResultCode {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormatError => 1,
            Self::ServerFailure => 2,
            Self::NameError => 3,
            Self::NotImplemented => 4,
            Self::Refused => 5,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v & 0xF {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            _ => Self::ServerFailure,
        }
    }
}

/// The per-type resource-record body. Carried by value inside `Answer` — no
/// shared ownership is needed since answers are never aliased. `Other`
/// retains the raw bytes so a record type the server does not understand is
/// still echoed losslessly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    A(Ipv4Addr),
    Cname(String),
    Ptr(String),
    Mx { preference: u16, exchange: String },
    /// One or more character-strings, each `<len:u8><bytes>` with `len <= 255`.
    Txt(Vec<Vec<u8>>),
    Other(Vec<u8>),
}

impl RecordBody {
    /// Constructs a body from one configured answer string for `rtype`.
    /// `A` text that fails to parse as a dotted-quad is rejected rather than
    /// silently coerced to `0.0.0.0`; CNAME/PTR/MX text that would not fit
    /// the wire's label/name-length limits is rejected the same way, so an
    /// oversize name is caught here (at config load) rather than panicking
    /// `OutputBuffer::append_domain` later at query time.
    pub fn from_text(rtype: RecordType, text: &str) -> Result<Self, String> {
        match rtype {
            RecordType::A => text
                .parse::<Ipv4Addr>()
                .map(Self::A)
                .map_err(|_| format!("invalid IPv4 address: {text:?}")),
            RecordType::CNAME => {
                validate_domain_text(text)?;
                Ok(Self::Cname(text.to_string()))
            }
            RecordType::PTR => {
                validate_domain_text(text)?;
                Ok(Self::Ptr(text.to_string()))
            }
            RecordType::MX => {
                validate_domain_text(text)?;
                Ok(Self::Mx {
                    preference: 10,
                    exchange: text.to_string(),
                })
            }
            RecordType::TXT => Ok(Self::Txt(vec![text.as_bytes().to_vec()])),
            RecordType::Other(_) => {
                let bytes = text.as_bytes().to_vec();
                if bytes.len() > u16::MAX as usize {
                    return Err(format!("RDATA exceeds 65535 bytes: {} bytes", bytes.len()));
                }
                Ok(Self::Other(bytes))
            }
        }
    }

    /// Decodes `rdlength` bytes of body for `rtype`, starting at `*cursor`
    /// (cursor already positioned past RDLENGTH).
    pub fn decode(
        msg: &[u8],
        cursor: &mut usize,
        rtype: RecordType,
        rdlength: u16,
    ) -> Result<Self, BodyDecodeError> {
        let body_start = *cursor;
        let rdlength = rdlength as usize;

        let body = match rtype {
            RecordType::A => {
                if rdlength != 4 {
                    return Err(BodyDecodeError::BadARecordLength(rdlength as u16));
                }
                let bytes = read_string(msg, cursor, 4)?;
                Self::A(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]))
            }
            RecordType::CNAME => Self::Cname(read_domain(msg, cursor)?),
            RecordType::PTR => Self::Ptr(read_domain(msg, cursor)?),
            RecordType::MX => {
                let preference = read_u16(msg, cursor)?;
                let exchange = read_domain(msg, cursor)?;
                Self::Mx { preference, exchange }
            }
            RecordType::TXT => {
                let end = body_start + rdlength;
                let mut strings = Vec::new();
                while *cursor < end {
                    let len = read_string(msg, cursor, 1)?[0] as usize;
                    strings.push(read_string(msg, cursor, len)?);
                }
                Self::Txt(strings)
            }
            RecordType::Other(_) => Self::Other(read_string(msg, cursor, rdlength)?),
        };

        // CNAME/PTR/MX/Other advance the cursor themselves; clamp back onto
        // the declared RDLENGTH boundary in case a compressed name inside the
        // body jumped out of it (the outer cursor only ever advances past the
        // in-stream representation, per `read_domain`'s contract).
        let declared_end = body_start + rdlength;
        if *cursor < declared_end {
            *cursor = declared_end;
        }

        Ok(body)
    }

    /// Emits a placeholder RDLENGTH, writes the body, then backfills the
    /// length unconditionally (even if it computes to zero).
    pub fn encode(&self, buf: &mut OutputBuffer) -> Result<(), BodyEncodeError> {
        let rdlength_pos = buf.len();
        buf.write_u16(0);
        let body_start = buf.len();

        match self {
            Self::A(ip) => buf.write_bytes(&ip.octets()),
            Self::Cname(name) | Self::Ptr(name) => buf.append_domain(name)?,
            Self::Mx { preference, exchange } => {
                buf.write_u16(*preference);
                buf.append_domain(exchange)?;
            }
            Self::Txt(strings) => {
                for s in strings {
                    for chunk in s.chunks(255) {
                        buf.write_u8(chunk.len() as u8);
                        buf.write_bytes(chunk);
                    }
                }
            }
            Self::Other(bytes) => buf.write_bytes(bytes),
        }

        let rdlength = (buf.len() - body_start) as u16;
        buf.overwrite_u16(rdlength_pos, rdlength);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_text_is_case_insensitive() {
        assert_eq!(RecordType::from_text("a"), Some(RecordType::A));
        assert_eq!(RecordType::from_text("A"), Some(RecordType::A));
        assert_eq!(RecordType::from_text("Txt"), Some(RecordType::TXT));
        assert_eq!(RecordType::from_text("bogus"), None);
    }

    #[test]
    fn a_body_rejects_invalid_text() {
        assert!(RecordBody::from_text(RecordType::A, "not-an-ip").is_err());
        assert!(RecordBody::from_text(RecordType::A, "1.2.3.4").is_ok());
    }

    #[test]
    fn a_body_decode_requires_rdlength_four() {
        let msg = [1u8, 2, 3];
        let mut cursor = 0;
        let err = RecordBody::decode(&msg, &mut cursor, RecordType::A, 3).unwrap_err();
        assert!(matches!(err, BodyDecodeError::BadARecordLength(3)));
    }

    #[test]
    fn mx_default_preference_is_ten() {
        let body = RecordBody::from_text(RecordType::MX, "mail.example.com").unwrap();
        assert_eq!(body, RecordBody::Mx { preference: 10, exchange: "mail.example.com".to_string() });
    }

    #[test]
    fn a_round_trips_through_encode_decode() {
        let mut buf = OutputBuffer::new(0, 0);
        let body = RecordBody::A(Ipv4Addr::new(185, 253, 219, 92));
        body.encode(&mut buf).unwrap();

        let mut cursor = 0;
        let rdlength = read_u16(&buf.result, &mut cursor).unwrap();
        let decoded = RecordBody::decode(&buf.result, &mut cursor, RecordType::A, rdlength).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn txt_encodes_each_string_as_its_own_character_string() {
        let mut buf = OutputBuffer::new(0, 0);
        let body = RecordBody::Txt(vec![b"v=spf1 a -all".to_vec()]);
        body.encode(&mut buf).unwrap();
        // rdlength(2) + len(1) + 13 bytes
        assert_eq!(buf.result.len(), 2 + 1 + 13);
    }

    #[test]
    fn cname_rejects_label_over_63_bytes() {
        let label = "a".repeat(64);
        let name = format!("{label}.example.com");
        assert!(RecordBody::from_text(RecordType::CNAME, &name).is_err());
    }

    #[test]
    fn ptr_rejects_name_over_255_bytes() {
        let name = format!("{}.example.com", "a".repeat(63)).repeat(5);
        assert!(name.len() > 255);
        assert!(RecordBody::from_text(RecordType::PTR, &name).is_err());
    }

    #[test]
    fn mx_rejects_exchange_with_empty_label() {
        assert!(RecordBody::from_text(RecordType::MX, "mail..example.com").is_err());
    }

    #[test]
    fn cname_accepts_name_within_limits() {
        assert!(RecordBody::from_text(RecordType::CNAME, "mail.example.com").is_ok());
    }
}
