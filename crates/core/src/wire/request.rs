use crate::error::{ParseErrorKind, RtspError};

/// A parsed RTSP request (RFC 2326 §6).
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. Headers are kept as
/// an ordered multi-map (a header name may legally repeat) so callers can
/// detect a duplicated `CSeq` rather than silently taking the first value.
#[derive(Debug)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, ANNOUNCE, SETUP, PLAY, PAUSE, RECORD, TEARDOWN).
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:port/cam1/trackID=0`).
    pub uri: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs, stored as received.
    pub headers: Vec<(String, String)>,
    /// Request body, present when `Content-Length` was non-zero.
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// Parse an RTSP request's start-line and headers from its text
    /// representation. The caller is responsible for reading exactly
    /// `Content-Length` further bytes and passing them as `body`
    /// (see [`transport::tcp`](crate::transport::tcp), which reads the
    /// header block line-by-line before knowing the body length).
    pub fn parse(raw: &str, body: Vec<u8>) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().ok_or(RtspError::Parse {
            kind: ParseErrorKind::EmptyRequest,
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(RtspError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers = Vec::new();

        for line in lines {
            if line.is_empty() {
                break;
            }

            let colon_pos = line.find(':').ok_or(RtspError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;

            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();

            headers.push((name, value));
        }

        let request = RtspRequest {
            method,
            uri,
            version,
            headers,
            body,
        };

        // CSeq is mandatory and must appear exactly once (§4.1).
        if request.header_values("CSeq").len() != 1 {
            return Err(RtspError::Parse {
                kind: ParseErrorKind::MissingOrDuplicateCSeq,
            });
        }

        Ok(request)
    }

    /// Look up the first header value by name (case-insensitive, RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values for a header name, in the order they appeared.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17). `parse` already rejects a
    /// missing or duplicated CSeq, so this is infallible on a parsed request.
    pub fn cseq(&self) -> &str {
        self.get_header("CSeq").unwrap_or("0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options_request() {
        let raw = "OPTIONS rtsp://localhost:8554/test RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let req = RtspRequest::parse(raw, Vec::new()).unwrap();
        assert_eq!(req.method, "OPTIONS");
        assert_eq!(req.uri, "rtsp://localhost:8554/test");
        assert_eq!(req.version, "RTSP/1.0");
        assert_eq!(req.cseq(), "1");
    }

    #[test]
    fn parse_setup_with_transport() {
        let raw = "SETUP rtsp://localhost:8554/cam1/trackID=0 RTSP/1.0\r\n\
                   CSeq: 3\r\n\
                   Transport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n";
        let req = RtspRequest::parse(raw, Vec::new()).unwrap();
        assert_eq!(req.method, "SETUP");
        assert_eq!(req.cseq(), "3");
        assert_eq!(
            req.get_header("Transport"),
            Some("RTP/AVP/TCP;unicast;interleaved=0-1")
        );
    }

    #[test]
    fn parse_empty_request() {
        assert!(RtspRequest::parse("", Vec::new()).is_err());
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(RtspRequest::parse("JUST_A_METHOD\r\n\r\n", Vec::new()).is_err());
    }

    #[test]
    fn missing_cseq_is_rejected() {
        let raw = "OPTIONS rtsp://localhost RTSP/1.0\r\n\r\n";
        assert!(matches!(
            RtspRequest::parse(raw, Vec::new()),
            Err(RtspError::Parse {
                kind: ParseErrorKind::MissingOrDuplicateCSeq
            })
        ));
    }

    #[test]
    fn duplicate_cseq_is_rejected() {
        let raw = "OPTIONS rtsp://localhost RTSP/1.0\r\nCSeq: 1\r\nCSeq: 2\r\n\r\n";
        assert!(matches!(
            RtspRequest::parse(raw, Vec::new()),
            Err(RtspError::Parse {
                kind: ParseErrorKind::MissingOrDuplicateCSeq
            })
        ));
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let raw = "OPTIONS rtsp://localhost RTSP/1.0\r\ncseq: 42\r\n\r\n";
        let req = RtspRequest::parse(raw, Vec::new()).unwrap();
        assert_eq!(req.get_header("CSeq"), Some("42"));
        assert_eq!(req.get_header("cseq"), Some("42"));
        assert_eq!(req.get_header("CSEQ"), Some("42"));
    }

}
