//! The MSRP message model.
//!
//! A `Message` is either a `Request` (SEND, REPORT, AUTH, ...) or a
//! `Response`. Paths and Content-Type live in dedicated fields; everything
//! else goes through the ordered [`HeaderMap`]. Known headers additionally
//! get structured views populated by the decoder.

use bytes::Bytes;

use crate::headers::{self, HeaderMap};
use crate::status;

/// Continuation flag carried on the end-line of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// `+`: more chunks of this message follow.
    Continued,
    /// `$`: this is the final chunk.
    End,
    /// `#`: the sender aborted the transfer.
    Abort,
}

impl Flag {
    pub fn as_char(self) -> char {
        match self {
            Flag::Continued => '+',
            Flag::End => '$',
            Flag::Abort => '#',
        }
    }

    pub fn from_byte(b: u8) -> Option<Flag> {
        match b {
            b'+' => Some(Flag::Continued),
            b'$' => Some(Flag::End),
            b'#' => Some(Flag::Abort),
            _ => None,
        }
    }
}

/// Request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Send,
    Report,
    Auth,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Send => "SEND",
            Method::Report => "REPORT",
            Method::Auth => "AUTH",
            Method::Other(s) => s,
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "SEND" => Method::Send,
            "REPORT" => Method::Report,
            "AUTH" => Method::Auth,
            other => Method::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk's position within the full message: `start-end/total`.
///
/// Offsets are 1-based. `end` and `total` may be [`ByteRange::UNKNOWN`]
/// (`-1`), rendered as `*` on the wire. An empty message is `1-0/0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: i64,
    pub end: i64,
    pub total: i64,
}

impl ByteRange {
    pub const UNKNOWN: i64 = -1;

    pub fn new(start: i64, end: i64, total: i64) -> Self {
        Self { start, end, total }
    }

    /// Default range for an incoming request before the header is parsed.
    pub fn unparsed() -> Self {
        Self {
            start: 1,
            end: Self::UNKNOWN,
            total: Self::UNKNOWN,
        }
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-", self.start)?;
        if self.end < 0 {
            write!(f, "*")?;
        } else {
            write!(f, "{}", self.end)?;
        }
        if self.total < 0 {
            write!(f, "/*")
        } else {
            write!(f, "/{}", self.total)
        }
    }
}

/// Message body. Text bodies take part in the end-line collision check at
/// encode time; binary bodies are carried byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Bytes),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(s) => s.as_bytes(),
            Body::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Body::Text(_))
    }
}

/// When a request wants responses, per its Failure-Report header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub on_success: bool,
    pub on_failure: bool,
}

impl ResponsePolicy {
    /// Default policy for a freshly-received request of the given method:
    /// SEND wants responses until headers say otherwise, REPORT never does.
    pub fn for_method(method: &Method) -> Self {
        match method {
            Method::Report => Self {
                on_success: false,
                on_failure: false,
            },
            _ => Self {
                on_success: true,
                on_failure: true,
            },
        }
    }

    /// Parse a Failure-Report header value: `yes`, `no` or `partial`.
    pub fn from_failure_report(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "yes" => Some(Self {
                on_success: true,
                on_failure: true,
            }),
            "no" => Some(Self {
                on_success: false,
                on_failure: false,
            }),
            "partial" => Some(Self {
                on_success: false,
                on_failure: true,
            }),
            _ => None,
        }
    }
}

/// Parsed Content-Disposition: a type plus `key=value` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub kind: String,
    pub params: Vec<(String, String)>,
}

impl Disposition {
    /// `attachment` and `render` dispositions denote file transfers.
    pub fn is_file(&self) -> bool {
        self.kind == "attachment" || self.kind == "render"
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn filename(&self) -> Option<&str> {
        self.param("filename")
    }
}

/// One WWW-Authenticate digest challenge, as an attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub params: Vec<(String, String)>,
}

impl DigestChallenge {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn realm(&self) -> Option<&str> {
        self.get("realm")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.get("nonce")
    }
}

/// An MSRP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub tid: String,
    pub method: Method,
    pub to_path: Vec<String>,
    pub from_path: Vec<String>,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub body: Option<Body>,
    pub flag: Flag,
    pub byte_range: Option<ByteRange>,

    // Structured views of known headers, populated by the decoder (and by
    // builders on the outgoing side where the engine needs them).
    pub message_id: Option<String>,
    /// Status header on a REPORT: status code plus optional comment.
    pub report_status: Option<(u16, Option<String>)>,
    pub disposition: Option<Disposition>,
    pub response_policy: ResponsePolicy,
}

impl Request {
    pub fn new(tid: impl Into<String>, method: Method) -> Self {
        let response_policy = ResponsePolicy::for_method(&method);
        Self {
            tid: tid.into(),
            method,
            to_path: Vec::new(),
            from_path: Vec::new(),
            headers: HeaderMap::new(),
            content_type: None,
            body: None,
            flag: Flag::End,
            byte_range: None,
            message_id: None,
            report_status: None,
            disposition: None,
            response_policy,
        }
    }

    /// Add a header by name. Paths and Content-Type are stored in their own
    /// fields; everything else lands in the header map.
    pub fn add_header(&mut self, name: &str, value: &str) {
        match headers::normalise(name).as_str() {
            "To-Path" => {
                self.to_path = value.split(' ').map(str::to_string).collect();
            }
            "From-Path" => {
                self.from_path = value.split(' ').map(str::to_string).collect();
            }
            "Content-Type" => {
                self.content_type = Some(value.to_string());
            }
            _ => self.headers.add(name, value),
        }
    }

    /// First value of a (normalised) header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    pub fn set_body(&mut self, content_type: impl Into<String>, body: Body) {
        self.content_type = Some(content_type.into());
        self.body = Some(body);
    }

    /// The end-line without its continuation flag: `-------<tid>`.
    pub fn end_line_token(&self) -> String {
        format!("-------{}", self.tid)
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(Body::len).unwrap_or(0)
    }
}

/// An MSRP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub tid: String,
    pub status: u16,
    pub comment: Option<String>,
    pub to_path: Vec<String>,
    pub from_path: Vec<String>,
    pub headers: HeaderMap,

    // Structured views of known headers on incoming responses.
    pub authenticate: Vec<DigestChallenge>,
    pub use_path: Vec<String>,
    pub expires: Option<u32>,
}

impl Response {
    pub fn new(tid: impl Into<String>, status: u16) -> Self {
        Self {
            tid: tid.into(),
            status,
            comment: status::comment(status).map(str::to_string),
            to_path: Vec::new(),
            from_path: Vec::new(),
            headers: HeaderMap::new(),
            authenticate: Vec::new(),
            use_path: Vec::new(),
            expires: None,
        }
    }

    /// Build the response to `request`. A SEND response travels only to the
    /// previous hop; other responses use the full reverse path.
    pub fn reply_to(request: &Request, local_uri: &str, status: u16) -> Self {
        let mut resp = Self::new(request.tid.clone(), status);
        resp.to_path = if request.method == Method::Send {
            request.from_path.iter().take(1).cloned().collect()
        } else {
            request.from_path.clone()
        };
        resp.from_path = vec![local_uri.to_string()];
        resp
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}

/// Either kind of MSRP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}
