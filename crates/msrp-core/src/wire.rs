//! MSRP wire codec: lossless encode/decode of requests and responses.
//!
//! The format is RFC 4975 syntax: a start line, headers, an optional body
//! separated by a blank line, and an end-line `-------<tid><flag>` whose
//! token depends on the transaction id. Because the end-line is dynamic,
//! encoding a text body first checks that the body does not contain the
//! end-line and regenerates the transaction id until it does not (the id
//! space is large enough that this terminates immediately in practice).
//!
//! Decoding never returns partial state: any syntax error, missing
//! end-line or structurally invalid known header fails the whole frame,
//! and the caller is expected to drop the connection.

use bytes::{BufMut, Bytes, BytesMut};

use crate::headers;
use crate::ident::IdSource;
use crate::message::{
    Body, ByteRange, DigestChallenge, Disposition, Flag, Message, Method, Request, Response,
    ResponsePolicy,
};

const CRLF: &[u8] = b"\r\n";

/// Errors produced by [`decode`]. All are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("message has no CRLF line terminator")]
    MissingCrlf,

    #[error("malformed start line: {0:?}")]
    MalformedStartLine(String),

    #[error("malformed header line")]
    MalformedHeader,

    #[error("structurally invalid {0} header")]
    InvalidHeader(String),

    #[error("missing end-line after message body")]
    MissingEndLine,

    #[error("invalid continuation flag")]
    InvalidFlag,
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Serialize a request. Takes the request by `&mut` because encoding a text
/// body may need to re-draw the transaction id to avoid an end-line
/// collision with the body content.
pub fn encode_request(req: &mut Request, ids: &dyn IdSource) -> Bytes {
    if let Some(Body::Text(text)) = &req.body {
        // The end-line must not occur inside the body. Transaction ids are
        // drawn from a large random space, so this terminates.
        let mut end = format!("{}{}\r\n", req.end_line_token(), req.flag.as_char());
        while text.contains(&end) {
            let old = std::mem::replace(&mut req.tid, ids.transaction_id());
            tracing::debug!(old_tid = %old, new_tid = %req.tid, "end-line collision, re-drew transaction id");
            end = format!("{}{}\r\n", req.end_line_token(), req.flag.as_char());
        }
    }

    let mut head = String::new();
    head.push_str("MSRP ");
    head.push_str(&req.tid);
    head.push(' ');
    head.push_str(req.method.as_str());
    head.push_str("\r\n");
    head.push_str("To-Path: ");
    head.push_str(&req.to_path.join(" "));
    head.push_str("\r\nFrom-Path: ");
    head.push_str(&req.from_path.join(" "));
    head.push_str("\r\n");

    for (name, values) in req.headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(&values.join(" "));
        head.push_str("\r\n");
    }

    if let Some(range) = req.byte_range {
        head.push_str("Byte-Range: ");
        head.push_str(&range.to_string());
        head.push_str("\r\n");
    }

    let end_line = format!("{}{}\r\n", req.end_line_token(), req.flag.as_char());

    let mut out = BytesMut::new();
    match (&req.content_type, &req.body) {
        (Some(ctype), Some(body)) => {
            // Content-Type is the last header; a blank line separates the
            // headers from the body.
            head.push_str("Content-Type: ");
            head.push_str(ctype);
            head.push_str("\r\n\r\n");
            out.put_slice(head.as_bytes());
            out.put_slice(body.as_bytes());
            out.put_slice(CRLF);
            out.put_slice(end_line.as_bytes());
        }
        _ => {
            out.put_slice(head.as_bytes());
            out.put_slice(end_line.as_bytes());
        }
    }
    out.freeze()
}

/// Serialize a response. Responses never carry a body.
pub fn encode_response(resp: &Response) -> Bytes {
    let mut out = String::new();
    out.push_str("MSRP ");
    out.push_str(&resp.tid);
    out.push(' ');
    out.push_str(&resp.status.to_string());
    if let Some(comment) = &resp.comment {
        out.push(' ');
        out.push_str(comment);
    }
    out.push_str("\r\n");
    out.push_str("To-Path: ");
    out.push_str(&resp.to_path.join(" "));
    out.push_str("\r\nFrom-Path: ");
    out.push_str(&resp.from_path.join(" "));
    out.push_str("\r\n");
    for (name, values) in resp.headers.iter() {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&values.join(" "));
        out.push_str("\r\n");
    }
    out.push_str(&format!("-------{}{}\r\n", resp.tid, Flag::End.as_char()));
    Bytes::from(out)
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Parse one raw frame into a [`Message`].
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    let first_end = find(data, CRLF, 0).ok_or(DecodeError::MissingCrlf)?;
    let first_line = std::str::from_utf8(&data[..first_end])
        .map_err(|_| DecodeError::MalformedStartLine(String::from_utf8_lossy(&data[..first_end]).into_owned()))?;

    let tokens: Vec<&str> = first_line.split(' ').collect();
    if tokens.len() < 3 || tokens[0] != "MSRP" || tokens[1].is_empty() || tokens[2].is_empty() {
        return Err(DecodeError::MalformedStartLine(first_line.to_string()));
    }
    let tid = tokens[1];

    // A 3-digit numeric second token denotes a response.
    let is_response = tokens[2].len() == 3 && tokens[2].bytes().all(|b| b.is_ascii_digit());

    let mut pos = first_end + CRLF.len();
    let end_token = format!("-------{tid}");

    if is_response {
        let status: u16 = tokens[2]
            .parse()
            .map_err(|_| DecodeError::MalformedStartLine(first_line.to_string()))?;
        let mut resp = Response::new(tid, status);
        resp.comment = if tokens.len() > 3 {
            Some(tokens[3..].join(" "))
        } else {
            None
        };

        let (has_body, at) = read_headers(data, pos, &end_token, |name, value| {
            match headers::normalise(name).as_str() {
                "To-Path" => resp.to_path = value.split(' ').map(str::to_string).collect(),
                "From-Path" => resp.from_path = value.split(' ').map(str::to_string).collect(),
                _ => resp.headers.add(name, value),
            }
        })?;
        if has_body {
            // Responses never carry bodies.
            return Err(DecodeError::MalformedStartLine(first_line.to_string()));
        }
        pos = at;
        parse_known_response_headers(&mut resp)?;
        read_flag(data, pos + end_token.len())?;
        Ok(Message::Response(resp))
    } else {
        if tokens.len() != 3 {
            return Err(DecodeError::MalformedStartLine(first_line.to_string()));
        }
        let mut req = Request::new(tid, Method::from(tokens[2]));
        req.byte_range = Some(ByteRange::unparsed());

        let (has_body, at) = read_headers(data, pos, &end_token, |name, value| {
            req.add_header(name, value);
        })?;
        pos = at;
        parse_known_request_headers(&mut req)?;

        if has_body {
            pos += CRLF.len();
            let needle = format!("\r\n{end_token}");
            let body_end =
                find(data, needle.as_bytes(), pos).ok_or(DecodeError::MissingEndLine)?;
            let raw = &data[pos..body_end];
            req.body = Some(body_from_bytes(raw, req.content_type.as_deref()));
            req.flag = read_flag(data, body_end + needle.len())?;
        } else {
            req.flag = read_flag(data, pos + end_token.len())?;
        }
        Ok(Message::Request(req))
    }
}

/// Walk the header block starting at `pos`. Returns `(has_body, position)`,
/// where the position is at the blank line (body follows) or at the
/// end-line token (no body).
fn read_headers(
    data: &[u8],
    mut pos: usize,
    end_token: &str,
    mut add: impl FnMut(&str, &str),
) -> Result<(bool, usize), DecodeError> {
    loop {
        if pos >= data.len() {
            return Err(DecodeError::MissingEndLine);
        }
        if data[pos..].starts_with(CRLF) {
            return Ok((true, pos));
        }
        if data[pos..].starts_with(end_token.as_bytes()) {
            return Ok((false, pos));
        }

        let line_end = find(data, CRLF, pos).ok_or(DecodeError::MissingCrlf)?;
        let line =
            std::str::from_utf8(&data[pos..line_end]).map_err(|_| DecodeError::MalformedHeader)?;
        let (name, value) = line.split_once(':').ok_or(DecodeError::MalformedHeader)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DecodeError::MalformedHeader);
        }
        add(name, value.trim());
        pos = line_end + CRLF.len();
    }
}

/// Read and validate the continuation flag byte at `at`.
fn read_flag(data: &[u8], at: usize) -> Result<Flag, DecodeError> {
    let byte = *data.get(at).ok_or(DecodeError::MissingEndLine)?;
    Flag::from_byte(byte).ok_or(DecodeError::InvalidFlag)
}

/// Recover the body. Binary content is sliced byte-exact; textual content
/// that is valid UTF-8 comes back as text.
fn body_from_bytes(raw: &[u8], content_type: Option<&str>) -> Body {
    let textual = content_type
        .map(|t| t.starts_with("text/") || t.starts_with("message/"))
        .unwrap_or(false);
    if textual {
        if let Ok(text) = std::str::from_utf8(raw) {
            return Body::Text(text.to_string());
        }
    }
    Body::Binary(Bytes::copy_from_slice(raw))
}

// ── Known-header parsing ──────────────────────────────────────────────────────

fn single<'a>(values: &'a [String], name: &str) -> Result<&'a str, DecodeError> {
    if values.len() != 1 {
        return Err(DecodeError::InvalidHeader(name.to_string()));
    }
    Ok(values[0].trim())
}

fn parse_known_request_headers(req: &mut Request) -> Result<(), DecodeError> {
    // Collect first: parsing writes into other fields of `req`.
    let entries: Vec<(String, Vec<String>)> = req
        .headers
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_vec()))
        .collect();

    for (name, values) in entries {
        match name.as_str() {
            headers::MESSAGE_ID => {
                let value = single(&values, &name)?;
                if value.is_empty() {
                    return Err(DecodeError::InvalidHeader(name));
                }
                req.message_id = Some(value.to_string());
            }
            headers::BYTE_RANGE => {
                req.byte_range = Some(parse_byte_range(single(&values, &name)?)?);
            }
            headers::STATUS => {
                req.report_status = Some(parse_status(single(&values, &name)?)?);
            }
            headers::FAILURE_REPORT => {
                req.response_policy = ResponsePolicy::from_failure_report(single(&values, &name)?)
                    .ok_or(DecodeError::InvalidHeader(name))?;
            }
            headers::CONTENT_DISPOSITION => {
                req.disposition = Some(parse_disposition(single(&values, &name)?)?);
            }
            headers::EXPIRES | headers::MIN_EXPIRES | headers::MAX_EXPIRES => {
                single(&values, &name)?
                    .parse::<u32>()
                    .map_err(|_| DecodeError::InvalidHeader(name))?;
            }
            // Unknown headers are retained verbatim in the map.
            _ => {}
        }
    }
    Ok(())
}

fn parse_known_response_headers(resp: &mut Response) -> Result<(), DecodeError> {
    let entries: Vec<(String, Vec<String>)> = resp
        .headers
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_vec()))
        .collect();

    for (name, values) in entries {
        match name.as_str() {
            headers::WWW_AUTHENTICATE => {
                for value in &values {
                    resp.authenticate.push(parse_challenge(value)?);
                }
            }
            headers::USE_PATH => {
                let value = single(&values, &name)?;
                resp.use_path = value.split(' ').map(str::to_string).collect();
                if resp.use_path.is_empty() {
                    return Err(DecodeError::InvalidHeader(name));
                }
            }
            headers::EXPIRES | headers::MIN_EXPIRES | headers::MAX_EXPIRES => {
                resp.expires = Some(
                    single(&values, &name)?
                        .parse::<u32>()
                        .map_err(|_| DecodeError::InvalidHeader(name))?,
                );
            }
            // A Status header on a response is ignored, not an error.
            _ => {}
        }
    }
    Ok(())
}

/// `start-end/total`, where end and total may be `*` (unknown).
fn parse_byte_range(value: &str) -> Result<ByteRange, DecodeError> {
    let invalid = || DecodeError::InvalidHeader(headers::BYTE_RANGE.to_string());
    let (start, rest) = value.split_once('-').ok_or_else(invalid)?;
    let (end, total) = rest.split_once('/').ok_or_else(invalid)?;

    let parse_part = |s: &str| -> Result<i64, DecodeError> {
        let s = s.trim();
        if s == "*" {
            return Ok(ByteRange::UNKNOWN);
        }
        s.parse::<i64>().map_err(|_| invalid())
    };

    let start: i64 = start.trim().parse().map_err(|_| invalid())?;
    Ok(ByteRange::new(start, parse_part(end)?, parse_part(total)?))
}

/// REPORT Status header: `000 <code> [comment]`.
fn parse_status(value: &str) -> Result<(u16, Option<String>), DecodeError> {
    let invalid = || DecodeError::InvalidHeader(headers::STATUS.to_string());
    let mut parts = value.split(' ');
    if parts.next() != Some("000") {
        return Err(invalid());
    }
    let code: u16 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let comment = parts.collect::<Vec<_>>().join(" ");
    let comment = if comment.is_empty() { None } else { Some(comment) };
    Ok((code, comment))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// `type[;name=value]*`
fn parse_disposition(value: &str) -> Result<Disposition, DecodeError> {
    let invalid = || DecodeError::InvalidHeader(headers::CONTENT_DISPOSITION.to_string());
    let mut parts = value.split(';');
    let kind = parts.next().ok_or_else(invalid)?.trim().to_string();
    if kind.is_empty() {
        return Err(invalid());
    }
    let mut params = Vec::new();
    for part in parts {
        let (name, value) = part.split_once('=').ok_or_else(invalid)?;
        params.push((name.trim().to_string(), unquote(value.trim()).to_string()));
    }
    Ok(Disposition { kind, params })
}

/// `Digest name=value[, name=value]*`, values optionally quoted.
/// RFC 2617 defines no escape sequences inside quoted values.
fn parse_challenge(value: &str) -> Result<DigestChallenge, DecodeError> {
    let invalid = || DecodeError::InvalidHeader(headers::WWW_AUTHENTICATE.to_string());
    let rest = value.strip_prefix("Digest ").ok_or_else(invalid)?;

    let mut challenge = DigestChallenge::default();
    let mut pos = 0;
    while pos < rest.len() {
        let eq = rest[pos..].find('=').ok_or_else(invalid)? + pos;
        let name = rest[pos..eq].trim();

        let mut scan = eq + 1;
        if rest[scan..].starts_with('"') {
            let close = rest[scan + 1..].find('"').ok_or_else(invalid)? + scan + 1;
            scan = close;
        }
        let end = rest[scan..]
            .find(',')
            .map(|i| i + scan)
            .unwrap_or(rest.len());

        let val = unquote(rest[eq + 1..end].trim());
        if name.is_empty() || val.is_empty() {
            return Err(invalid());
        }
        challenge.params.push((name.to_string(), val.to_string()));
        pos = end + 1;
    }
    Ok(challenge)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::SequentialIds;
    use crate::status;

    fn send_request(tid: &str, body: &str) -> Request {
        let mut req = Request::new(tid, Method::Send);
        req.to_path = vec!["msrp://remote/s1;ws".into()];
        req.from_path = vec!["msrp://local/s2;ws".into()];
        req.add_header("Message-ID", "mid1");
        req.byte_range = Some(ByteRange::new(1, body.len() as i64, body.len() as i64));
        req.set_body("text/plain", Body::Text(body.into()));
        req
    }

    fn decode_request(bytes: &[u8]) -> Request {
        match decode(bytes).expect("decode") {
            Message::Request(req) => req,
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn text_request_round_trip() {
        let ids = SequentialIds::new("c");
        let mut req = send_request("abcd1234", "hello msrp");
        let bytes = encode_request(&mut req, &ids);

        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("MSRP abcd1234 SEND\r\n"));
        assert!(text.contains("To-Path: msrp://remote/s1;ws\r\n"));
        assert!(text.contains("Byte-Range: 1-10/10\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhello msrp\r\n"));
        assert!(text.ends_with("-------abcd1234$\r\n"));

        let back = decode_request(&bytes);
        assert_eq!(back.tid, "abcd1234");
        assert_eq!(back.method, Method::Send);
        assert_eq!(back.message_id.as_deref(), Some("mid1"));
        assert_eq!(back.byte_range, Some(ByteRange::new(1, 10, 10)));
        assert_eq!(back.flag, Flag::End);
        assert_eq!(back.body, Some(Body::Text("hello msrp".into())));
    }

    #[test]
    fn bodyless_request_round_trip() {
        let ids = SequentialIds::new("c");
        let mut req = Request::new("t1", Method::Send);
        req.to_path = vec!["msrp://remote/s1;ws".into()];
        req.from_path = vec!["msrp://local/s2;ws".into()];
        req.byte_range = Some(ByteRange::new(1, 0, 0));
        let bytes = encode_request(&mut req, &ids);

        let back = decode_request(&bytes);
        assert!(back.body.is_none());
        assert_eq!(back.byte_range, Some(ByteRange::new(1, 0, 0)));
        assert_eq!(back.flag, Flag::End);
    }

    #[test]
    fn end_line_collision_redraws_transaction_id() {
        let ids = SequentialIds::new("fresh");
        let body = "evil body\r\n-------oldtid$\r\nmore";
        let mut req = send_request("oldtid", body);
        req.byte_range = Some(ByteRange::new(1, body.len() as i64, body.len() as i64));
        let bytes = encode_request(&mut req, &ids);

        assert_eq!(req.tid, "fresh-t1");
        let back = decode_request(&bytes);
        assert_eq!(back.tid, "fresh-t1");
        assert_eq!(back.body, Some(Body::Text(body.into())));
    }

    #[test]
    fn binary_body_is_sliced_byte_exact() {
        let ids = SequentialIds::new("c");
        let payload: Vec<u8> = vec![0x00, 0x0d, 0x0a, 0xff, 0x0d, 0x0a, 0x01];
        let mut req = Request::new("bin1", Method::Send);
        req.to_path = vec!["msrp://remote/s1;ws".into()];
        req.from_path = vec!["msrp://local/s2;ws".into()];
        req.byte_range = Some(ByteRange::new(1, payload.len() as i64, payload.len() as i64));
        req.set_body(
            "application/octet-stream",
            Body::Binary(Bytes::from(payload.clone())),
        );
        let bytes = encode_request(&mut req, &ids);

        let back = decode_request(&bytes);
        assert_eq!(back.body, Some(Body::Binary(Bytes::from(payload))));
    }

    #[test]
    fn continued_flag_round_trip() {
        let ids = SequentialIds::new("c");
        let mut req = send_request("t2", "chunk1");
        req.flag = Flag::Continued;
        let bytes = encode_request(&mut req, &ids);
        assert!(std::str::from_utf8(&bytes).unwrap().ends_with("-------t2+\r\n"));
        assert_eq!(decode_request(&bytes).flag, Flag::Continued);
    }

    #[test]
    fn response_round_trip() {
        let mut resp = Response::new("t9", status::STOP_SENDING);
        resp.to_path = vec!["msrp://remote/s1;ws".into()];
        resp.from_path = vec!["msrp://local/s2;ws".into()];
        let bytes = encode_response(&resp);

        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("MSRP t9 413 Stop Sending Message\r\n"));
        assert!(text.ends_with("-------t9$\r\n"));

        match decode(&bytes).unwrap() {
            Message::Response(back) => {
                assert_eq!(back.status, status::STOP_SENDING);
                assert_eq!(back.comment.as_deref(), Some("Stop Sending Message"));
                assert_eq!(back.to_path, resp.to_path);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn report_status_header_is_parsed() {
        let frame = b"MSRP r1 REPORT\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Message-ID: mid7\r\n\
            Status: 000 200 OK\r\n\
            Byte-Range: 1-6/12\r\n\
            -------r1$\r\n";
        let req = decode_request(frame);
        assert_eq!(req.method, Method::Report);
        assert_eq!(req.report_status, Some((200, Some("OK".into()))));
        assert_eq!(req.byte_range, Some(ByteRange::new(1, 6, 12)));
    }

    #[test]
    fn byte_range_stars_mean_unknown() {
        let frame = b"MSRP t3 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Message-ID: mid2\r\n\
            Byte-Range: 2049-*/*\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            abc\r\n\
            -------t3+\r\n";
        let req = decode_request(frame);
        let range = req.byte_range.unwrap();
        assert_eq!(range.start, 2049);
        assert_eq!(range.end, ByteRange::UNKNOWN);
        assert_eq!(range.total, ByteRange::UNKNOWN);
    }

    #[test]
    fn unknown_headers_are_retained_verbatim() {
        let frame = b"MSRP t4 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            X-Experimental: one two\r\n\
            -------t4$\r\n";
        let req = decode_request(frame);
        assert_eq!(req.header("X-Experimental"), Some("one two"));
    }

    #[test]
    fn www_authenticate_challenge_is_parsed() {
        let frame = b"MSRP a1 401 Unauthorized\r\n\
            To-Path: msrp://b/2;ws\r\n\
            From-Path: msrp://relay/r;ws\r\n\
            WWW-Authenticate: Digest realm=\"msrp.example.com\", nonce=\"abc123\", algorithm=MD5, qop=\"auth\"\r\n\
            -------a1$\r\n";
        match decode(frame).unwrap() {
            Message::Response(resp) => {
                assert_eq!(resp.authenticate.len(), 1);
                let ch = &resp.authenticate[0];
                assert_eq!(ch.realm(), Some("msrp.example.com"));
                assert_eq!(ch.nonce(), Some("abc123"));
                assert_eq!(ch.get("algorithm"), Some("MD5"));
                assert_eq!(ch.get("qop"), Some("auth"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn use_path_and_expires_are_parsed() {
        let frame = b"MSRP a2 200 OK\r\n\
            To-Path: msrp://b/2;ws\r\n\
            From-Path: msrp://relay/r;ws\r\n\
            Use-Path: msrp://relay/p1;ws msrp://relay/p2;ws\r\n\
            Expires: 600\r\n\
            -------a2$\r\n";
        match decode(frame).unwrap() {
            Message::Response(resp) => {
                assert_eq!(resp.use_path.len(), 2);
                assert_eq!(resp.expires, Some(600));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn content_disposition_with_quoted_filename() {
        let frame = b"MSRP t5 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Message-ID: mid3\r\n\
            Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
            Byte-Range: 1-3/3\r\n\
            Content-Type: application/pdf\r\n\
            \r\n\
            xyz\r\n\
            -------t5$\r\n";
        let req = decode_request(frame);
        let disposition = req.disposition.unwrap();
        assert!(disposition.is_file());
        assert_eq!(disposition.filename(), Some("report.pdf"));
    }

    #[test]
    fn decode_rejects_missing_crlf() {
        assert_eq!(decode(b"MSRP t1 SEND"), Err(DecodeError::MissingCrlf));
    }

    #[test]
    fn decode_rejects_malformed_start_line() {
        assert!(matches!(
            decode(b"HTTP t1 SEND\r\n"),
            Err(DecodeError::MalformedStartLine(_))
        ));
        assert!(matches!(
            decode(b"MSRP t1 SEND extra\r\n"),
            Err(DecodeError::MalformedStartLine(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_end_line_after_body() {
        let frame = b"MSRP t6 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            body with no end line";
        assert_eq!(decode(frame), Err(DecodeError::MissingEndLine));
    }

    #[test]
    fn decode_rejects_invalid_byte_range() {
        let frame = b"MSRP t7 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Byte-Range: pears\r\n\
            -------t7$\r\n";
        assert_eq!(
            decode(frame),
            Err(DecodeError::InvalidHeader("Byte-Range".into()))
        );
    }

    #[test]
    fn decode_rejects_repeated_message_id() {
        let frame = b"MSRP t8 SEND\r\n\
            To-Path: msrp://a/1;ws\r\n\
            From-Path: msrp://b/2;ws\r\n\
            Message-ID: one\r\n\
            Message-ID: two\r\n\
            -------t8$\r\n";
        assert_eq!(
            decode(frame),
            Err(DecodeError::InvalidHeader("Message-ID".into()))
        );
    }

    #[test]
    fn decode_rejects_header_without_colon() {
        let frame = b"MSRP t9 SEND\r\n\
            To-Path msrp://a/1;ws\r\n\
            -------t9$\r\n";
        assert_eq!(decode(frame), Err(DecodeError::MalformedHeader));
    }
}
