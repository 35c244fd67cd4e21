//! HTTP Digest (RFC 2617) and Basic authentication, challenge side and
//! response-generation side.
//!
//! The relay challenges inbound publishers/readers (server role) and also
//! *generates* `Authorization` headers when the pull-client pusher logs
//! into an upstream RTSP server (client role) — both directions share the
//! same MD5 hashing and quoted-parameter parsing.

use std::collections::HashMap;

use md5::{Digest, Md5};
use rand::RngCore;

/// A server-issued Digest challenge for one session/intent pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub nonce: String,
}

impl Challenge {
    /// Mint a fresh challenge with a random 16-byte nonce, hex-encoded.
    pub fn new(realm: &str) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Challenge {
            realm: realm.to_string(),
            nonce,
        }
    }

    /// `WWW-Authenticate` header value offering both schemes, as RFC 2617
    /// permits a server to advertise more than one in separate headers —
    /// the relay sends Digest since it's the one the CLI's credentials
    /// support, Basic is accepted if a client sends it unprompted.
    pub fn www_authenticate(&self) -> String {
        format!(
            "Digest realm=\"{}\", nonce=\"{}\"",
            self.realm, self.nonce
        )
    }
}

/// Validate a client's `Authorization` header against one set of
/// credentials, accepting either Basic or Digest.
///
/// `challenge` must be the one most recently issued on this session/intent;
/// a Digest response against a stale nonce is rejected.
pub fn validate(
    authorization: &str,
    method: &str,
    uri: &str,
    username: &str,
    password: &str,
    challenge: &Challenge,
) -> bool {
    let trimmed = authorization.trim();
    if let Some(rest) = strip_ci_prefix(trimmed, "Basic ") {
        return validate_basic(rest, username, password);
    }
    if let Some(rest) = strip_ci_prefix(trimmed, "Digest ") {
        return validate_digest(rest, method, uri, username, password, challenge);
    }
    false
}

fn validate_basic(encoded: &str, username: &str, password: &str) -> bool {
    use base64::Engine;
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(text) = String::from_utf8(decoded) else {
        return false;
    };
    match text.split_once(':') {
        Some((u, p)) => u == username && p == password,
        None => false,
    }
}

fn validate_digest(
    params_str: &str,
    method: &str,
    uri: &str,
    username: &str,
    password: &str,
    challenge: &Challenge,
) -> bool {
    let params = parse_parameters(params_str);

    let Some(got_username) = params.get("username") else {
        return false;
    };
    if got_username != username {
        return false;
    }
    let Some(nonce) = params.get("nonce") else {
        return false;
    };
    if nonce != &challenge.nonce {
        return false;
    }
    let Some(realm) = params.get("realm") else {
        return false;
    };
    let Some(response) = params.get("response") else {
        return false;
    };
    // `uri` in the Authorization header must match the request-URI the
    // digest was computed over; fall back to the caller-supplied `uri`
    // when absent rather than failing outright, matching common client
    // leniency around trailing-slash/query differences.
    let digest_uri = params.get("uri").map(String::as_str).unwrap_or(uri);

    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{digest_uri}"));

    let expected = match (params.get("qop"), params.get("nc"), params.get("cnonce")) {
        (Some(qop), Some(nc), Some(cnonce)) => {
            md5_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"))
        }
        _ => md5_hex(&format!("{ha1}:{nonce}:{ha2}")),
    };

    &expected == response
}

/// Build an `Authorization: Basic ...` header value for outbound requests
/// (the pull-client pusher logging into an upstream server).
pub fn basic_authorization(username: &str, password: &str) -> String {
    use base64::Engine;
    let raw = format!("{username}:{password}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(raw.as_bytes());
    format!("Basic {encoded}")
}

/// Build an `Authorization: Digest ...` header value in response to a
/// `WWW-Authenticate` challenge received from an upstream server.
pub fn digest_authorization(
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    www_authenticate: &str,
) -> Option<String> {
    let rest = strip_ci_prefix(www_authenticate.trim(), "Digest ")?;
    let params = parse_parameters(rest);
    let realm = params.get("realm")?;
    let nonce = params.get("nonce")?;

    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    let response = md5_hex(&format!("{ha1}:{nonce}:{ha2}"));

    let mut header = format!(
        "Digest username=\"{username}\", realm=\"{realm}\", nonce=\"{nonce}\", uri=\"{uri}\", response=\"{response}\""
    );
    if let Some(opaque) = params.get("opaque") {
        header.push_str(&format!(", opaque=\"{opaque}\""));
    }
    Some(header)
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Parse comma-separated `key=value` / `key="value"` pairs, quote-aware so a
/// comma inside a quoted value (not expected in practice, but cheap to
/// handle) doesn't split the parameter.
fn parse_parameters(params: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in params.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
            continue;
        }
        if ch == ',' && !in_quotes {
            consume_param(&mut map, &mut current);
            continue;
        }
        current.push(ch);
    }
    consume_param(&mut map, &mut current);
    map
}

fn consume_param(map: &mut HashMap<String, String>, buffer: &mut String) {
    let trimmed = buffer.trim().to_string();
    buffer.clear();
    if trimmed.is_empty() {
        return;
    }
    let mut parts = trimmed.splitn(2, '=');
    let key = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let mut value = parts.next().unwrap_or("").trim().to_string();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value = value[1..value.len() - 1].to_string();
    }
    if !key.is_empty() {
        map.insert(key, value);
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trip() {
        let challenge = Challenge {
            realm: "relay".to_string(),
            nonce: "abc123".to_string(),
        };
        let auth = digest_authorization(
            "alice",
            "secret",
            "ANNOUNCE",
            "rtsp://host/cam1",
            &challenge.www_authenticate(),
        )
        .unwrap();
        assert!(validate(
            &auth,
            "ANNOUNCE",
            "rtsp://host/cam1",
            "alice",
            "secret",
            &challenge
        ));
    }

    #[test]
    fn digest_rejects_wrong_password() {
        let challenge = Challenge::new("relay");
        let auth = digest_authorization(
            "alice",
            "wrong",
            "ANNOUNCE",
            "rtsp://host/cam1",
            &challenge.www_authenticate(),
        )
        .unwrap();
        assert!(!validate(
            &auth,
            "ANNOUNCE",
            "rtsp://host/cam1",
            "alice",
            "secret",
            &challenge
        ));
    }

    #[test]
    fn digest_rejects_stale_nonce() {
        let issued = Challenge::new("relay");
        let auth = digest_authorization(
            "alice",
            "secret",
            "ANNOUNCE",
            "rtsp://host/cam1",
            &issued.www_authenticate(),
        )
        .unwrap();
        let rotated = Challenge::new("relay");
        assert!(!validate(
            &auth,
            "ANNOUNCE",
            "rtsp://host/cam1",
            "alice",
            "secret",
            &rotated
        ));
    }

    #[test]
    fn basic_round_trip() {
        let header = format!("Authorization: {}", basic_authorization("bob", "hunter2"));
        let value = header.strip_prefix("Authorization: ").unwrap();
        let challenge = Challenge::new("relay");
        assert!(validate(value, "DESCRIBE", "rtsp://host/cam1", "bob", "hunter2", &challenge));
    }

    #[test]
    fn basic_rejects_wrong_credentials() {
        let value = basic_authorization("bob", "hunter2");
        let challenge = Challenge::new("relay");
        assert!(!validate(&value, "DESCRIBE", "rtsp://host/cam1", "bob", "other", &challenge));
    }
}
