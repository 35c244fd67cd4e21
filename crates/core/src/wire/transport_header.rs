//! `Transport` header parsing (RFC 2326 §12.39).
//!
//! A `;`-delimited list of tokens, e.g.:
//!
//! ```text
//! RTP/AVP;unicast;client_port=9000-9001
//! RTP/AVP/TCP;unicast;interleaved=0-1
//! RTP/AVP/TCP;unicast;interleaved=0-1;mode=record
//! ```

use crate::error::{ParseErrorKind, RtspError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    TcpInterleaved,
}

/// A parsed `Transport` header (one of possibly several comma-separated
/// alternatives — the relay only ever looks at the first).
#[derive(Debug, Clone)]
pub struct TransportHeader {
    pub kind: TransportKind,
    /// Present when the publisher asked to push media (`mode=record`).
    pub record: bool,
    /// `client_port=lo-hi`, meaningful for UDP transport.
    pub client_port: Option<(u16, u16)>,
    /// `interleaved=lo-hi`, meaningful for TCP-interleaved transport.
    pub interleaved: Option<(u8, u8)>,
}

impl TransportHeader {
    /// Parse the first transport alternative in the header value.
    ///
    /// Returns [`RtspError::Parse`] (mapped to 400 Bad Request by the
    /// handler) when `unicast` is absent or neither `RTP/AVP`/`RTP/AVP/UDP`
    /// nor `RTP/AVP/TCP` is present — a malformed request, not a transport
    /// the relay understands but declines. 461 Unsupported Transport is
    /// reserved for a recognized, well-formed transport the deployment has
    /// disabled (checked by the caller after a successful parse).
    pub fn parse(header: &str) -> Result<Self> {
        let first_alt = header.split(',').next().unwrap_or(header);
        let tokens: Vec<&str> = first_alt.split(';').map(str::trim).collect();

        let kind = if tokens.iter().any(|t| t.eq_ignore_ascii_case("RTP/AVP/TCP")) {
            Some(TransportKind::TcpInterleaved)
        } else if tokens
            .iter()
            .any(|t| t.eq_ignore_ascii_case("RTP/AVP/UDP") || t.eq_ignore_ascii_case("RTP/AVP"))
        {
            Some(TransportKind::Udp)
        } else {
            None
        };

        let kind = kind.ok_or(RtspError::Parse {
            kind: ParseErrorKind::InvalidHeader,
        })?;

        if !tokens.iter().any(|t| t.eq_ignore_ascii_case("unicast")) {
            return Err(RtspError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            });
        }

        let record = tokens.iter().any(|t| t.eq_ignore_ascii_case("mode=record"));

        let client_port = tokens
            .iter()
            .find_map(|t| t.strip_prefix("client_port="))
            .and_then(parse_u16_pair);

        let interleaved = tokens
            .iter()
            .find_map(|t| t.strip_prefix("interleaved="))
            .and_then(parse_u8_pair);

        match kind {
            TransportKind::Udp if client_port.is_none() => {
                Err(RtspError::Parse {
                    kind: ParseErrorKind::InvalidHeader,
                })
            }
            TransportKind::TcpInterleaved if interleaved.is_none() => {
                Err(RtspError::Parse {
                    kind: ParseErrorKind::InvalidHeader,
                })
            }
            _ => Ok(TransportHeader {
                kind,
                record,
                client_port,
                interleaved,
            }),
        }
    }
}

fn parse_u16_pair(s: &str) -> Option<(u16, u16)> {
    let (lo, hi) = s.split_once('-')?;
    Some((lo.parse().ok()?, hi.parse().ok()?))
}

fn parse_u8_pair(s: &str) -> Option<(u8, u8)> {
    let (lo, hi) = s.split_once('-')?;
    Some((lo.parse().ok()?, hi.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_udp_client_port() {
        let th = TransportHeader::parse("RTP/AVP;unicast;client_port=9000-9001").unwrap();
        assert_eq!(th.kind, TransportKind::Udp);
        assert_eq!(th.client_port, Some((9000, 9001)));
        assert!(!th.record);
    }

    #[test]
    fn parse_tcp_interleaved() {
        let th = TransportHeader::parse("RTP/AVP/TCP;unicast;interleaved=0-1").unwrap();
        assert_eq!(th.kind, TransportKind::TcpInterleaved);
        assert_eq!(th.interleaved, Some((0, 1)));
    }

    #[test]
    fn parse_record_mode() {
        let th =
            TransportHeader::parse("RTP/AVP/TCP;unicast;interleaved=2-3;mode=record").unwrap();
        assert!(th.record);
    }

    #[test]
    fn missing_unicast_is_a_parse_error() {
        assert!(matches!(
            TransportHeader::parse("RTP/AVP;client_port=9000-9001"),
            Err(RtspError::Parse { .. })
        ));
    }

    #[test]
    fn udp_without_client_port_is_invalid() {
        assert!(TransportHeader::parse("RTP/AVP;unicast").is_err());
    }

    #[test]
    fn unknown_profile_is_a_parse_error() {
        assert!(matches!(
            TransportHeader::parse("RTP/SAVP;unicast;client_port=1-2"),
            Err(RtspError::Parse { .. })
        ));
    }
}
