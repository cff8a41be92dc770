//! The synthetic response builder.
//!
//! Every response this proxy originates itself (as opposed to relaying from
//! an origin) goes through here, so the wire form in the external-interface
//! contract is produced in exactly one place.

/// Builds an `HTTP/1.1` response with the fixed header set the wire protocol
/// promises: `Content-Type: text/html; charset=utf-8`, a matching
/// `Content-Length`, and `Connection: close`.
pub fn synthetic(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        body.len()
    );
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Builds an `HTTP/1.1` response carrying a JSON body — used only by the
/// admin surface, never by the core's synthetic client-facing responses.
pub fn json(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        body.len()
    );
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}

pub const ACCESS_DENIED_BODY: &[u8] = b"<h1>Access Denied</h1>";
pub const BAD_GATEWAY_BODY: &[u8] = b"<h1>Bad Gateway</h1>";
pub const BAD_CONNECT_BODY: &[u8] = b"<h1>Bad CONNECT request</h1>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exact_wire_form() {
        let resp = synthetic(403, "Forbidden", ACCESS_DENIED_BODY);
        let text = String::from_utf8(resp).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 403 Forbidden\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             Content-Length: 22\r\n\
             Connection: close\r\n\r\n\
             <h1>Access Denied</h1>"
        );
    }
}
