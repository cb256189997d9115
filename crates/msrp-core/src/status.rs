//! MSRP status codes (RFC 4975 section 10) and their canonical comments.

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const FORBIDDEN: u16 = 403;
pub const REQUEST_TIMEOUT: u16 = 408;
pub const STOP_SENDING: u16 = 413;
pub const UNSUPPORTED_MEDIA: u16 = 415;
pub const INTERVAL_OUT_OF_BOUNDS: u16 = 423;
pub const SESSION_DOES_NOT_EXIST: u16 = 481;
/// Not in the IANA registry, but widely used.
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const NOT_IMPLEMENTED: u16 = 501;
pub const WRONG_CONNECTION: u16 = 506;

/// Canonical comment text for a status code, if one is registered.
pub fn comment(status: u16) -> Option<&'static str> {
    match status {
        OK => Some("OK"),
        BAD_REQUEST => Some("Bad Request"),
        UNAUTHORIZED => Some("Unauthorized"),
        FORBIDDEN => Some("Forbidden"),
        REQUEST_TIMEOUT => Some("Request Timeout"),
        STOP_SENDING => Some("Stop Sending Message"),
        UNSUPPORTED_MEDIA => Some("Unsupported Media Type"),
        INTERVAL_OUT_OF_BOUNDS => Some("Interval Out-of-Bounds"),
        SESSION_DOES_NOT_EXIST => Some("Session Does Not Exist"),
        INTERNAL_SERVER_ERROR => Some("Internal Server Error"),
        NOT_IMPLEMENTED => Some("Not Implemented"),
        WRONG_CONNECTION => Some("Wrong Connection"),
        _ => None,
    }
}
