//! Runtime configuration shared by the TCP/UDP listeners, the per-session
//! handler, and the pull-client pusher.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, RtspError};

/// One `username`/`password` pair, present only when both halves of a
/// `--publish-user`/`--publish-pass` (or `--read-user`/`--read-pass`) flag
/// pair are set.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Server-level configuration used by the session handler and transport
/// layer. Built by the CLI from flags, or directly by an embedding caller.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `Server:`/`User-Agent:` product string in every response.
    pub server_agent: String,
    /// Realm advertised in `WWW-Authenticate` challenges.
    pub realm: String,
    pub rtsp_port: u16,
    pub rtp_port: u16,
    pub rtcp_port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub publish_credentials: Option<Credentials>,
    pub read_credentials: Option<Credentials>,
    pub pre_script: Option<PathBuf>,
    pub post_script: Option<PathBuf>,
    /// Whether a SETUP may negotiate plain `RTP/AVP` (UDP). When `false`,
    /// such a SETUP is rejected as unsupported transport.
    pub udp_enabled: bool,
    /// Whether a SETUP may negotiate `RTP/AVP/TCP` (interleaved). When
    /// `false`, such a SETUP is rejected as unsupported transport. The
    /// RTSP control connection itself is always TCP regardless of this flag.
    pub tcp_enabled: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            server_agent: "rtsp-relay/0.1".to_string(),
            realm: "rtsp-relay".to_string(),
            rtsp_port: 8554,
            rtp_port: 8000,
            rtcp_port: 8001,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            publish_credentials: None,
            read_credentials: None,
            pre_script: None,
            post_script: None,
            udp_enabled: true,
            tcp_enabled: true,
        }
    }
}

impl RelayConfig {
    /// Validate the invariants startup must reject: even `rtp_port`,
    /// `rtcp_port == rtp_port + 1`, alphanumeric-only usernames/passwords.
    pub fn validate(&self) -> Result<()> {
        if !self.udp_enabled && !self.tcp_enabled {
            return Err(RtspError::ConfigError(
                "at least one of udp or tcp transport must be enabled".to_string(),
            ));
        }
        if self.udp_enabled {
            crate::transport::udp::check_port_parity(self.rtp_port, self.rtcp_port)?;
        }

        for creds in [&self.publish_credentials, &self.read_credentials]
            .into_iter()
            .flatten()
        {
            if !is_alphanumeric(&creds.username) || !is_alphanumeric(&creds.password) {
                return Err(RtspError::ConfigError(
                    "usernames and passwords must match ^[A-Za-z0-9]+$".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Values read from an optional `--config <path>` INI file. The core logs
/// these at startup but does not act on them — they exist for an external
/// HTTP/service collaborator to pick up rather than the relay itself.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub http_port: Option<u16>,
    pub service_name: Option<String>,
    pub service_display_name: Option<String>,
    pub service_description: Option<String>,
}

/// Minimal `[section]` / `key = value` INI reader covering `[http].port` and
/// `[service].{name,display_name,description}`. No ambient INI crate
/// appears anywhere in the corpus this crate draws its dependencies from,
/// so this is hand-rolled rather than borrowed.
pub fn parse_ini(text: &str) -> RawConfig {
    let mut raw = RawConfig::default();
    let mut section = String::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = line[1..line.len() - 1].trim().to_ascii_lowercase();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();

        match (section.as_str(), key.as_str()) {
            ("http", "port") => raw.http_port = value.parse().ok(),
            ("service", "name") => raw.service_name = Some(value),
            ("service", "display_name") => raw.service_display_name = Some(value),
            ("service", "description") => raw.service_description = Some(value),
            _ => {}
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_odd_rtp_port() {
        let mut cfg = RelayConfig::default();
        cfg.rtp_port = 8001;
        cfg.rtcp_port = 8002;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_alphanumeric_credentials() {
        let mut cfg = RelayConfig::default();
        cfg.publish_credentials = Some(Credentials {
            username: "alice".to_string(),
            password: "bad pass!".to_string(),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_default_config() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_both_transports_disabled() {
        let mut cfg = RelayConfig::default();
        cfg.udp_enabled = false;
        cfg.tcp_enabled = false;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn skips_port_parity_check_when_udp_disabled() {
        let mut cfg = RelayConfig::default();
        cfg.udp_enabled = false;
        cfg.rtp_port = 8001;
        cfg.rtcp_port = 8002;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_ini_sections() {
        let text = "[http]\nport = 9090\n\n[service]\nname = relay\ndisplay_name = Relay Service\n";
        let raw = parse_ini(text);
        assert_eq!(raw.http_port, Some(9090));
        assert_eq!(raw.service_name.as_deref(), Some("relay"));
        assert_eq!(raw.service_display_name.as_deref(), Some("Relay Service"));
    }

    #[test]
    fn ignores_unknown_keys() {
        let raw = parse_ini("[bogus]\nkey = value\n");
        assert_eq!(raw.http_port, None);
    }
}
