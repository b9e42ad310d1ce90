//! Header/question/answer/authority entities and full-message parse/serialize
//! (RFC 1035 §4).

use thiserror::Error;

use crate::buffer::{EncodeError, OutputBuffer};
use crate::records::{BodyDecodeError, BodyEncodeError, RecordBody, RecordType, ResultCode};
use crate::wire::{read_domain, read_u16, read_u32, WireError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Body(#[from] BodyDecodeError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageEncodeError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Body(#[from] BodyEncodeError),
}

pub const CLASS_IN: u16 = 1;

/// The 16-bit header flags word, decomposed into named fields. Constructed
/// explicitly rather than aliased onto a bit-field struct, so the wire layout
/// does not depend on compiler-specific bit-field ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFlags {
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: ResultCode,
}

impl HeaderFlags {
    pub fn from_u16(v: u16) -> Self {
        Self {
            qr: v & 0x8000 != 0,
            opcode: ((v >> 11) & 0xF) as u8,
            aa: v & 0x0400 != 0,
            tc: v & 0x0200 != 0,
            rd: v & 0x0100 != 0,
            ra: v & 0x0080 != 0,
            // Z (bits 6..4) is ignored on decode.
            rcode: ResultCode::from_u8((v & 0xF) as u8),
        }
    }

    pub fn to_u16(self) -> u16 {
        let mut v: u16 = 0;
        if self.qr {
            v |= 0x8000;
        }
        v |= ((self.opcode & 0xF) as u16) << 11;
        if self.aa {
            v |= 0x0400;
        }
        if self.tc {
            v |= 0x0200;
        }
        if self.rd {
            v |= 0x0100;
        }
        if self.ra {
            v |= 0x0080;
        }
        // Z is always zero on send.
        v |= self.rcode.to_u8() as u16;
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: HeaderFlags,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

impl Header {
    fn decode(msg: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        Ok(Self {
            id: read_u16(msg, cursor)?,
            flags: HeaderFlags::from_u16(read_u16(msg, cursor)?),
            qd_count: read_u16(msg, cursor)?,
            an_count: read_u16(msg, cursor)?,
            ns_count: read_u16(msg, cursor)?,
            ar_count: read_u16(msg, cursor)?,
        })
    }

    fn encode(&self, buf: &mut OutputBuffer) {
        buf.write_u16(self.id);
        buf.write_u16(self.flags.to_u16());
        buf.write_u16(self.qd_count);
        buf.write_u16(self.an_count);
        buf.write_u16(self.ns_count);
        buf.write_u16(self.ar_count);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    fn decode(msg: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let name = read_domain(msg, cursor)?;
        let qtype = read_u16(msg, cursor)?;
        let qclass = read_u16(msg, cursor)?;
        Ok(Self { name, qtype, qclass })
    }

    fn encode(&self, buf: &mut OutputBuffer) -> Result<(), EncodeError> {
        buf.append_domain(&self.name)?;
        buf.write_u16(self.qtype);
        buf.write_u16(self.qclass);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub body: RecordBody,
}

impl Answer {
    fn decode(msg: &[u8], cursor: &mut usize) -> Result<Self, MessageError> {
        let name = read_domain(msg, cursor)?;
        let rtype = read_u16(msg, cursor)?;
        let rclass = read_u16(msg, cursor)?;
        let ttl = read_u32(msg, cursor)?;
        let rdlength = read_u16(msg, cursor)?;
        let body = RecordBody::decode(msg, cursor, RecordType::from_u16(rtype), rdlength)?;
        Ok(Self { name, rtype, rclass, ttl, body })
    }

    fn encode(&self, buf: &mut OutputBuffer) -> Result<(), MessageEncodeError> {
        buf.append_domain(&self.name)?;
        buf.write_u16(self.rtype);
        buf.write_u16(self.rclass);
        buf.write_u32(self.ttl);
        self.body.encode(buf)?;
        Ok(())
    }
}

/// SOA authority record, decoded from upstream inputs. The server never
/// synthesizes one itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub primary: String,
    pub mbox: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub ttl_min: u32,
}

impl Authority {
    fn decode(msg: &[u8], cursor: &mut usize) -> Result<Self, WireError> {
        let name = read_domain(msg, cursor)?;
        let rtype = read_u16(msg, cursor)?;
        let rclass = read_u16(msg, cursor)?;
        let ttl = read_u32(msg, cursor)?;
        let _rdlength = read_u16(msg, cursor)?;
        let primary = read_domain(msg, cursor)?;
        let mbox = read_domain(msg, cursor)?;
        let serial = read_u32(msg, cursor)?;
        let refresh = read_u32(msg, cursor)?;
        let retry = read_u32(msg, cursor)?;
        let expire = read_u32(msg, cursor)?;
        let ttl_min = read_u32(msg, cursor)?;
        Ok(Self {
            name,
            rtype,
            rclass,
            ttl,
            primary,
            mbox,
            serial,
            refresh,
            retry,
            expire,
            ttl_min,
        })
    }

    fn encode(&self, buf: &mut OutputBuffer) -> Result<(), EncodeError> {
        buf.append_domain(&self.name)?;
        buf.write_u16(self.rtype);
        buf.write_u16(self.rclass);
        buf.write_u32(self.ttl);
        let rdlength_pos = buf.len();
        buf.write_u16(0);
        let body_start = buf.len();
        buf.append_domain(&self.primary)?;
        buf.append_domain(&self.mbox)?;
        buf.write_u32(self.serial);
        buf.write_u32(self.refresh);
        buf.write_u32(self.retry);
        buf.write_u32(self.expire);
        buf.write_u32(self.ttl_min);
        let rdlength = (buf.len() - body_start) as u16;
        buf.overwrite_u16(rdlength_pos, rdlength);
        Ok(())
    }
}

/// A full DNS message: header plus question/answer/authority sections. The
/// additional section is never parsed (spec: ARCOUNT is ignored on decode)
/// and never synthesized (ARCOUNT is always written as 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub authorities: Vec<Authority>,
}

impl Message {
    pub fn parse(msg: &[u8]) -> Result<Self, MessageError> {
        let mut cursor = 0;
        let header = Header::decode(msg, &mut cursor)?;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            questions.push(Question::decode(msg, &mut cursor)?);
        }

        let mut answers = Vec::with_capacity(header.an_count as usize);
        for _ in 0..header.an_count {
            answers.push(Answer::decode(msg, &mut cursor)?);
        }

        let mut authorities = Vec::with_capacity(header.ns_count as usize);
        for _ in 0..header.ns_count {
            authorities.push(Authority::decode(msg, &mut cursor)?);
        }

        // Additional section (ARCOUNT) is intentionally not parsed.

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
        })
    }

    /// Serializes into `out`. The header's *COUNT fields must already match
    /// the number of items in each section — callers (the query processor)
    /// are responsible for keeping them in sync before calling this.
    pub fn serialize(&self, out: &mut OutputBuffer) -> Result<(), MessageEncodeError> {
        debug_assert_eq!(self.header.qd_count as usize, self.questions.len());
        debug_assert_eq!(self.header.an_count as usize, self.answers.len());
        debug_assert_eq!(self.header.ns_count as usize, self.authorities.len());

        self.header.encode(out);
        for q in &self.questions {
            q.encode(out)?;
        }
        for a in &self.answers {
            a.encode(out)?;
        }
        for auth in &self.authorities {
            auth.encode(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn header_flags_round_trip() {
        for raw in [0x0100u16, 0x8180, 0x8183, 0x0000, 0xFFFF & !0x0070] {
            let flags = HeaderFlags::from_u16(raw);
            // Z bits are always zero on our own encode, so mask them out of
            // the expected value before comparing.
            assert_eq!(flags.to_u16(), raw & !0x0070);
        }
    }

    #[test]
    fn scenario_1_parse_a_query_no_compression() {
        let bytes = hex("1cb901000001000000000000033132310a766c61736f76736f6674036e65740000010001");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.header.id, 0x1cb9);
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.questions[0].name, "121.vlasovsoft.net");
        assert_eq!(msg.questions[0].qtype, 1);
        assert_eq!(msg.questions[0].qclass, 1);
    }

    #[test]
    fn scenario_2_parse_a_response_compressed_name() {
        let bytes = hex("4f16818000010001000000000a766c61736f76736f6674036e65740000010001c00c0001000100000e100004b9fddb5c");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.header.id, 0x4f16);
        assert_eq!(msg.header.flags.rcode, ResultCode::NoError);
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].name, "vlasovsoft.net");
        assert_eq!(msg.answers[0].ttl, 0x0e10);
        assert_eq!(msg.answers[0].body, RecordBody::A("185.253.219.92".parse().unwrap()));
    }

    #[test]
    fn scenario_3_nxdomain_with_soa_authority() {
        let bytes = hex("db2481830001000000010000086e78646f6d61696e0a766c61736f76736f6674036e65740000010001c01500060001000006fd002e056e7331303107636c6f75646e73c02007737570706f7274c03b78a4450e00001c20000007080012750000000e10");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.header.flags.rcode, ResultCode::NameError);
        assert_eq!(msg.answers.len(), 0);
        assert_eq!(msg.authorities.len(), 1);
        assert_eq!(msg.authorities[0].name, "nxdomain.vlasovsoft.net");
        assert_eq!(msg.authorities[0].serial, 0x78a4450e);
    }

    #[test]
    fn scenario_4_parse_mx_response() {
        let bytes = hex("3f2c8180000100010000000006676f6f676c6503636f6d00000f0001c00c000f0001000001060009000a04736d7470c00c");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.answers.len(), 1);
        match &msg.answers[0].body {
            RecordBody::Mx { preference, exchange } => {
                assert_eq!(*preference, 10);
                assert_eq!(exchange, "smtp.google.com");
            }
            other => panic!("expected MX, got {other:?}"),
        }
    }

    #[test]
    fn scenario_5_parse_txt_response() {
        let bytes = hex("248c818000010001000000000a766c61736f76736f6674036e65740000100001c00c0010000100000e10000e0d763d737066312061202d616c6c");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].ttl, 0x0e10);
        match &msg.answers[0].body {
            RecordBody::Txt(strings) => {
                assert_eq!(strings.len(), 1);
                assert_eq!(strings[0], b"v=spf1 a -all");
            }
            other => panic!("expected TXT, got {other:?}"),
        }
    }

    #[test]
    fn scenario_6_parse_cname_response() {
        let bytes = hex("09178180000100010000000005636d61696c0a766c61736f76736f6674036e65740000050001c00c0005000100000e100007046d61696cc012");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].name, "cmail.vlasovsoft.net");
        match &msg.answers[0].body {
            RecordBody::Cname(target) => assert_eq!(target, "mail.vlasovsoft.net"),
            other => panic!("expected CNAME, got {other:?}"),
        }
    }

    #[test]
    fn golden_round_trip_a_response() {
        let bytes = hex("4f16818000010001000000000a766c61736f76736f6674036e65740000010001c00c0001000100000e100004b9fddb5c");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn golden_round_trip_cname_response() {
        let bytes = hex("09178180000100010000000005636d61696c0a766c61736f76736f6674036e65740000050001c00c0005000100000e100007046d61696cc012");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn golden_round_trip_query_no_compression() {
        let bytes = hex("1cb901000001000000000000033132310a766c61736f76736f6674036e65740000010001");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn golden_round_trip_nxdomain_with_soa() {
        let bytes = hex("db2481830001000000010000086e78646f6d61696e0a766c61736f76736f6674036e65740000010001c01500060001000006fd002e056e7331303107636c6f75646e73c02007737570706f7274c03b78a4450e00001c20000007080012750000000e10");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn golden_round_trip_mx_response() {
        let bytes = hex("3f2c8180000100010000000006676f6f676c6503636f6d00000f0001c00c000f0001000001060009000a04736d7470c00c");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn golden_round_trip_txt_response() {
        let bytes = hex("248c818000010001000000000a766c61736f76736f6674036e65740000100001c00c0010000100000e10000e0d763d737066312061202d616c6c");
        let msg = Message::parse(&bytes).unwrap();

        let mut out = OutputBuffer::new(0, 0);
        msg.serialize(&mut out).unwrap();
        assert_eq!(out.result, bytes);
    }

    #[test]
    fn count_consistency_after_parse() {
        let bytes = hex("3f2c8180000100010000000006676f6f676c6503636f6d00000f0001c00c000f0001000001060009000a04736d7470c00c");
        let msg = Message::parse(&bytes).unwrap();
        assert_eq!(msg.header.qd_count as usize, msg.questions.len());
        assert_eq!(msg.header.an_count as usize, msg.answers.len());
        assert_eq!(msg.header.ns_count as usize, msg.authorities.len());
    }
}
