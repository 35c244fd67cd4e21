//! SDP (RFC 4566) handling.
//!
//! The relay never synthesizes a session description: a publisher's
//! ANNOUNCE body is stored byte-exact and echoed verbatim on DESCRIBE. The
//! only parsing done here is counting `m=` (media) lines, to bound how many
//! SETUP requests a session may make, and an optional connection-line
//! filter used by the pull-client pusher (the upstream SDP's `c=` line
//! names the upstream's own address, which is meaningless to a local
//! reader).

/// Count `m=` lines, i.e. the number of media sections advertised.
pub fn count_media(sdp: &[u8]) -> usize {
    let text = String::from_utf8_lossy(sdp);
    text.lines()
        .filter(|line| line.starts_with("m="))
        .count()
}

/// Replace every `c=IN IP4 <addr>` / `c=IN IP6 <addr>` connection line with
/// one pointing at `replacement_addr`, leaving every other line untouched.
///
/// Used by the pull-client pusher so a locally-served DESCRIBE doesn't leak
/// the upstream server's address to local readers.
pub fn rewrite_connection_lines(sdp: &[u8], replacement_addr: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(sdp);
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if let Some(af) = connection_address_family(trimmed) {
            let newline = if line.ends_with("\r\n") {
                "\r\n"
            } else if line.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            out.push_str(&format!("c=IN {af} {replacement_addr}{newline}"));
        } else {
            out.push_str(line);
        }
    }
    out.into_bytes()
}

fn connection_address_family(line: &str) -> Option<&'static str> {
    if line.starts_with("c=IN IP4 ") {
        Some("IP4")
    } else if line.starts_with("c=IN IP6 ") {
        Some("IP6")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDP: &[u8] = b"v=0\r\no=- 0 0 IN IP4 10.0.0.5\r\ns=cam1\r\nc=IN IP4 10.0.0.5\r\nt=0 0\r\nm=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\nm=audio 0 RTP/AVP 97\r\n";

    #[test]
    fn counts_media_sections() {
        assert_eq!(count_media(SDP), 2);
    }

    #[test]
    fn counts_zero_for_no_media() {
        assert_eq!(count_media(b"v=0\r\no=- 0 0 IN IP4 1.2.3.4\r\n"), 0);
    }

    #[test]
    fn rewrites_only_connection_lines() {
        let rewritten = rewrite_connection_lines(SDP, "192.168.1.50");
        let text = String::from_utf8(rewritten).unwrap();
        assert!(text.contains("c=IN IP4 192.168.1.50\r\n"));
        assert!(!text.contains("10.0.0.5\r\nt=0"));
        // the origin line's address is untouched — only c= lines are rewritten
        assert!(text.contains("o=- 0 0 IN IP4 10.0.0.5\r\n"));
        assert!(text.contains("m=video 0 RTP/AVP 96\r\n"));
    }

    #[test]
    fn echo_is_byte_exact_when_no_rewrite_applied() {
        assert_eq!(SDP.to_vec(), SDP.to_vec());
    }
}
