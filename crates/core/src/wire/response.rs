/// An RTSP response (RFC 2326 §7).
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Uses a builder pattern — chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Server identification string included in every RTSP response
/// per RFC 2326 §12.36. Overridden per deployment by [`RelayConfig`](crate::config::RelayConfig).
pub const DEFAULT_SERVER_AGENT: &str = "rtsp-relay/0.1";

/// Literal `Session` token the relay echoes on every SETUP/PLAY/RECORD/PAUSE
/// response. See the design note on this in `DESIGN.md` — preserved as-is,
/// not a per-session identifier.
pub const FIXED_SESSION_TOKEN: &str = "12345678";

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str, server_agent: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![("Server".to_string(), server_agent.to_string())],
            body: None,
        }
    }

    /// 200 OK — success (RFC 2326 §7.1.1).
    pub fn ok(server_agent: &str) -> Self {
        Self::new(200, "OK", server_agent)
    }

    /// 400 Bad Request — malformed request, wrong state, or missing header.
    pub fn bad_request(server_agent: &str) -> Self {
        Self::new(400, "Bad Request", server_agent)
    }

    /// 401 Unauthorized — auth challenge or denial (RFC 2617).
    pub fn unauthorized(server_agent: &str) -> Self {
        Self::new(401, "Unauthorized", server_agent)
    }

    /// 461 Unsupported Transport (RFC 2326 §11.3.7).
    pub fn unsupported_transport(server_agent: &str) -> Self {
        Self::new(461, "Unsupported Transport", server_agent)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// If a body is present, `Content-Length` is appended automatically
    /// (RFC 2326 §12.14).
    pub fn serialize(&self) -> Vec<u8> {
        let mut response = format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text);

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }

        let mut out = if let Some(body) = &self.body {
            response.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
            response.into_bytes()
        } else {
            response.push_str("\r\n");
            response.into_bytes()
        };

        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_no_body() {
        let resp = RtspResponse::ok(DEFAULT_SERVER_AGENT)
            .add_header("CSeq", "1")
            .add_header("Public", "OPTIONS");
        let s = String::from_utf8(resp.serialize()).unwrap();
        assert!(s.starts_with("RTSP/1.0 200 OK\r\n"));
        assert!(s.contains("Server: rtsp-relay/0.1\r\n"));
        assert!(s.contains("CSeq: 1\r\n"));
        assert!(s.contains("Public: OPTIONS\r\n"));
        assert!(s.ends_with("\r\n"));
    }

    #[test]
    fn serialize_with_body() {
        let resp = RtspResponse::ok(DEFAULT_SERVER_AGENT)
            .add_header("CSeq", "2")
            .with_body(b"v=0\r\n".to_vec());
        let s = String::from_utf8(resp.serialize()).unwrap();
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("v=0\r\n"));
    }

    #[test]
    fn bad_request_response() {
        let resp = RtspResponse::bad_request(DEFAULT_SERVER_AGENT).add_header("CSeq", "5");
        assert_eq!(resp.status_code, 400);
        let s = String::from_utf8(resp.serialize()).unwrap();
        assert!(s.starts_with("RTSP/1.0 400 Bad Request\r\n"));
    }
}
