//! C6: consumes a raw request, consults the table, builds a response, and
//! enforces the UDP truncation policy (RFC 1035 §4.1.1, §4.2.1).

use crate::buffer::OutputBuffer;
use crate::message::{Answer, Message, CLASS_IN};
use crate::records::{RecordBody, RecordType, ResultCode};
use crate::table::RecordTable;

const DEFAULT_TTL: u32 = 3600;

/// Runs the full request -> response lifecycle for one query and serializes
/// the result into `out`. `out.data_start`/`out.max_size` must already be set
/// by the caller (0/0 for TCP's unbounded body, 0/512 for UDP).
pub fn process_query(request: &[u8], table: &RecordTable, out: &mut OutputBuffer) {
    let mut pkg = match Message::parse(request) {
        Ok(pkg) => pkg,
        Err(_) => {
            // Can't trust anything past the ID, so synthesize the smallest
            // possible FORMERR response. If even the 16-bit ID is missing
            // there is nothing we can reply with.
            let id = if request.len() >= 2 {
                u16::from_be_bytes([request[0], request[1]])
            } else {
                0
            };
            let response = format_error_response(id);
            response.serialize(out).expect("format-error response always encodes");
            return;
        }
    };

    pkg.header.flags.qr = true;
    pkg.header.flags.ra = true;
    pkg.header.flags.rcode = ResultCode::NoError;

    let mut answers = Vec::new();
    let mut rcode = ResultCode::NoError;

    for question in &pkg.questions {
        let Some(rtype) = supported_qtype(question.qtype) else {
            rcode = ResultCode::NotImplemented;
            break;
        };

        match table.lookup(rtype, &question.name) {
            Some(configured) => {
                for text in configured {
                    let body = match RecordBody::from_text(rtype, text) {
                        Ok(b) => b,
                        Err(_) => {
                            rcode = ResultCode::ServerFailure;
                            break;
                        }
                    };
                    answers.push(Answer {
                        name: question.name.clone(),
                        rtype: rtype.to_u16(),
                        rclass: CLASS_IN,
                        ttl: DEFAULT_TTL,
                        body,
                    });
                }
                if rcode != ResultCode::NoError {
                    break;
                }
            }
            None => {
                rcode = ResultCode::NameError;
                break;
            }
        }
    }

    if rcode != ResultCode::NoError {
        answers.clear();
    }

    pkg.header.flags.rcode = rcode;
    pkg.answers = answers;
    pkg.header.an_count = pkg.answers.len() as u16;
    pkg.header.ar_count = 0;
    // NSCOUNT/authorities are left untouched (both remain 0 on this path).

    pkg.serialize(out).expect("server-synthesized responses always encode");

    // UDP truncation: if the serialized response would exceed max_size,
    // drop answers/authorities, set TC, and re-serialize from scratch.
    if out.max_size > 0 && out.len() > out.max_size {
        let data_start = out.data_start;
        let max_size = out.max_size;
        out.clear();
        out.data_start = data_start;
        out.max_size = max_size;

        pkg.answers.clear();
        pkg.authorities.clear();
        pkg.header.an_count = 0;
        pkg.header.ns_count = 0;
        pkg.header.flags.tc = true;
        pkg.serialize(out).expect("truncated response always encodes");
    }
}

/// Maps a wire QTYPE to a `RecordType` this server answers for. Anything
/// else is `NotImplemented` (spec §6: "Any other QTYPE yields NotImplemented").
fn supported_qtype(qtype: u16) -> Option<RecordType> {
    match RecordType::from_u16(qtype) {
        RecordType::Other(_) => None,
        rtype => Some(rtype),
    }
}

fn format_error_response(id: u16) -> Message {
    use crate::message::{Header, HeaderFlags};

    Message {
        header: Header {
            id,
            flags: HeaderFlags {
                qr: true,
                opcode: 0,
                aa: false,
                tc: false,
                rd: false,
                ra: true,
                rcode: ResultCode::FormatError,
            },
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        },
        questions: Vec::new(),
        answers: Vec::new(),
        authorities: Vec::new(),
    }
}
