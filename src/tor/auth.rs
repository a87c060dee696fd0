//! Control-port authentication
//!
//! PROTOCOLINFO parsing and the choice of which AUTHENTICATE to send.
//! Tor allows one attempt per connection, so the fallback order only
//! skips methods that are unusable locally (not advertised, cookie file
//! unreadable); a rejected attempt is final.

use super::reply::Reply;
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Authentication method advertised in PROTOCOLINFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Null,
    HashedPassword,
    Cookie,
    SafeCookie,
    Other(String),
}

impl AuthMethod {
    pub fn as_str(&self) -> &str {
        match self {
            AuthMethod::Null => "NULL",
            AuthMethod::HashedPassword => "HASHEDPASSWORD",
            AuthMethod::Cookie => "COOKIE",
            AuthMethod::SafeCookie => "SAFECOOKIE",
            AuthMethod::Other(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name {
            "NULL" => AuthMethod::Null,
            "HASHEDPASSWORD" => AuthMethod::HashedPassword,
            "COOKIE" => AuthMethod::Cookie,
            "SAFECOOKIE" => AuthMethod::SafeCookie,
            other => AuthMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed PROTOCOLINFO reply, valid for one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub auth_methods: Vec<AuthMethod>,
    pub cookie_file: Option<PathBuf>,
    /// Daemon version from the `VERSION Tor="..."` line
    pub tor_version: Option<String>,
}

const AUTH_PREFIX: &str = "AUTH METHODS=";
const COOKIE_PREFIX: &str = "COOKIEFILE=";
const VERSION_PREFIX: &str = "VERSION Tor=";

impl ProtocolInfo {
    /// Parse a successful PROTOCOLINFO reply
    pub fn from_reply(reply: &Reply) -> Result<Self> {
        if !reply.is_ok() {
            return Err(Error::protocol(format!(
                "PROTOCOLINFO failed ({}): {}",
                reply.code,
                reply.message()
            )));
        }

        let mut info = ProtocolInfo::default();
        let mut saw_auth = false;

        for line in &reply.lines {
            if let Some(rest) = line.strip_prefix(AUTH_PREFIX) {
                saw_auth = true;
                let (methods, rest) = rest.split_once(' ').unwrap_or((rest, ""));
                info.auth_methods = methods
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(AuthMethod::parse)
                    .collect();

                if let Some(quoted) = rest.trim_start().strip_prefix(COOKIE_PREFIX) {
                    let (path, _) = unquote_bytes(quoted)?;
                    info.cookie_file = Some(path_from_bytes(path)?);
                }
            } else if let Some(quoted) = line.strip_prefix(VERSION_PREFIX) {
                let (version, _) = unquote(quoted)?;
                info.tor_version = Some(version);
            }
        }

        if !saw_auth {
            return Err(Error::protocol("PROTOCOLINFO reply has no AUTH METHODS line"));
        }
        Ok(info)
    }

    pub fn supports(&self, method: &AuthMethod) -> bool {
        self.auth_methods.contains(method)
    }
}

/// What the next AUTHENTICATE will carry
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    Cookie(Vec<u8>),
    Null,
}

impl Credential {
    pub fn method(&self) -> AuthMethod {
        match self {
            Credential::Password(_) => AuthMethod::HashedPassword,
            Credential::Cookie(_) => AuthMethod::Cookie,
            Credential::Null => AuthMethod::Null,
        }
    }

    /// The AUTHENTICATE command line (without terminator)
    pub fn command(&self) -> String {
        match self {
            Credential::Password(password) => format!("AUTHENTICATE {}", quote(password)),
            Credential::Cookie(cookie) => {
                format!("AUTHENTICATE {}", data_encoding::HEXLOWER.encode(cookie))
            },
            Credential::Null => "AUTHENTICATE".to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.method())
    }
}

/// Pick the credential to present: password, then cookie, then none
///
/// Only advertised methods are considered.
pub async fn choose_credential(info: &ProtocolInfo, password: Option<&str>) -> Result<Credential> {
    if let Some(password) = password {
        if info.supports(&AuthMethod::HashedPassword) {
            return Ok(Credential::Password(password.to_string()));
        }
        warn!("Control password configured but HASHEDPASSWORD is not offered; skipping it");
    }

    if info.supports(&AuthMethod::Cookie) {
        match &info.cookie_file {
            Some(path) => match read_cookie(path).await {
                Ok(cookie) => return Ok(Credential::Cookie(cookie)),
                Err(e) => warn!("Cannot read control cookie {:?}: {}", path, e),
            },
            None => debug!("COOKIE offered without a COOKIEFILE"),
        }
    }

    if info.supports(&AuthMethod::Null) {
        return Ok(Credential::Null);
    }

    let offered: Vec<&str> = info.auth_methods.iter().map(AuthMethod::as_str).collect();
    Err(Error::Auth(format!(
        "no usable authentication method (offered: {})",
        offered.join(",")
    )))
}

async fn read_cookie(path: &Path) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

/// Encode a string as a control-protocol quoted string
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a leading quoted string, returning it and the unparsed remainder
///
/// The decoded bytes must be UTF-8; use this for text values.
pub fn unquote(s: &str) -> Result<(String, &str)> {
    let (bytes, rest) = unquote_bytes(s)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::protocol(format!("quoted string is not UTF-8: {:?}", s)))?;
    Ok((text, rest))
}

/// Decode a leading quoted string into raw bytes
///
/// Handles `\n`, `\r`, `\t`, `\NNN` octal escapes (up to three digits, as
/// Tor writes for bytes outside printable ASCII) and backslash before any
/// other character.
pub fn unquote_bytes(s: &str) -> Result<(Vec<u8>, &str)> {
    let body = s
        .strip_prefix('"')
        .ok_or_else(|| Error::protocol(format!("expected quoted string: {:?}", s)))?;
    let bytes = body.as_bytes();

    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Ok((out, &body[i + 1..])),
            b'\\' => {
                let escaped = *bytes
                    .get(i + 1)
                    .ok_or_else(|| Error::protocol("dangling escape in quoted string"))?;
                i += 2;
                match escaped {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'0'..=b'7' => {
                        let mut value = u32::from(escaped - b'0');
                        let mut digits = 1;
                        while digits < 3 {
                            match bytes.get(i) {
                                Some(&(digit @ b'0'..=b'7')) => {
                                    value = value * 8 + u32::from(digit - b'0');
                                    i += 1;
                                    digits += 1;
                                },
                                _ => break,
                            }
                        }
                        let byte = u8::try_from(value).map_err(|_| {
                            Error::protocol(format!("octal escape out of range: \\{:o}", value))
                        })?;
                        out.push(byte);
                    },
                    other => out.push(other),
                }
            },
            byte => {
                out.push(byte);
                i += 1;
            },
        }
    }

    Err(Error::protocol(format!("unterminated quoted string: {:?}", s)))
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| Error::protocol("COOKIEFILE path is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(methods: &[AuthMethod], cookie: Option<&Path>) -> ProtocolInfo {
        ProtocolInfo {
            auth_methods: methods.to_vec(),
            cookie_file: cookie.map(Path::to_path_buf),
            tor_version: None,
        }
    }

    #[test]
    fn test_parse_auth_line() {
        let reply =
            Reply::parse("250-AUTH METHODS=NULL,COOKIE COOKIEFILE=\"/tmp/c\"\r\n250 OK\r\n")
                .unwrap();
        let info = ProtocolInfo::from_reply(&reply).unwrap();

        assert_eq!(info.auth_methods, vec![AuthMethod::Null, AuthMethod::Cookie]);
        assert_eq!(info.cookie_file, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_parse_full_protocolinfo() {
        let reply = Reply::parse(
            "250-PROTOCOLINFO 1\r\n\
             250-AUTH METHODS=COOKIE,SAFECOOKIE,HASHEDPASSWORD COOKIEFILE=\"/run/tor/my \\\"cookie\\\"\"\r\n\
             250-VERSION Tor=\"0.4.8.12\"\r\n\
             250 OK\r\n",
        )
        .unwrap();
        let info = ProtocolInfo::from_reply(&reply).unwrap();

        assert_eq!(
            info.auth_methods,
            vec![
                AuthMethod::Cookie,
                AuthMethod::SafeCookie,
                AuthMethod::HashedPassword
            ]
        );
        assert_eq!(info.cookie_file, Some(PathBuf::from("/run/tor/my \"cookie\"")));
        assert_eq!(info.tor_version.as_deref(), Some("0.4.8.12"));
    }

    #[test]
    fn test_missing_auth_line() {
        let reply = Reply::parse("250-PROTOCOLINFO 1\r\n250 OK\r\n").unwrap();
        assert!(matches!(
            ProtocolInfo::from_reply(&reply),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_non_ok_protocolinfo() {
        let reply = Reply::parse("513 Unrecognized command\r\n").unwrap();
        assert!(matches!(
            ProtocolInfo::from_reply(&reply),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_quote_unquote() {
        let raw = "pa\"ss\\wo\nrd";
        let quoted = quote(raw);
        assert_eq!(quoted, "\"pa\\\"ss\\\\wo\\nrd\"");

        let input = format!("{} tail", quoted);
        let (decoded, rest) = unquote(&input).unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(rest, " tail");
    }

    #[test]
    fn test_unquote_errors() {
        assert!(unquote("no quotes").is_err());
        assert!(unquote("\"unterminated").is_err());
        assert!(unquote("\"dangling\\").is_err());
        assert!(unquote_bytes("\"\\777\"").is_err());
        // Valid escapes, but the bytes are not UTF-8
        assert!(unquote("\"\\377\"").is_err());
    }

    #[test]
    fn test_unquote_octal_escapes() {
        let (decoded, rest) = unquote("\"caf\\303\\251 \\101B \\0x\" end").unwrap();
        assert_eq!(decoded, "caf\u{e9} AB \0x");
        assert_eq!(rest, " end");

        let (raw, _) = unquote_bytes("\"\\377\\1\\12\"").unwrap();
        assert_eq!(raw, vec![0xff, 0x01, 0x0a]);
    }

    #[test]
    fn test_parse_octal_escaped_cookie_path() {
        let reply = Reply::parse(
            "250-AUTH METHODS=COOKIE COOKIEFILE=\"/home/caf\\303\\251/control_auth_cookie\"\r\n250 OK\r\n",
        )
        .unwrap();
        let info = ProtocolInfo::from_reply(&reply).unwrap();

        assert_eq!(
            info.cookie_file,
            Some(PathBuf::from("/home/caf\u{e9}/control_auth_cookie"))
        );
    }

    #[test]
    fn test_credential_commands() {
        assert_eq!(
            Credential::Password("hunter \"2\"".into()).command(),
            "AUTHENTICATE \"hunter \\\"2\\\"\""
        );
        assert_eq!(
            Credential::Cookie(vec![0xde, 0xad, 0x01]).command(),
            "AUTHENTICATE dead01"
        );
        assert_eq!(Credential::Null.command(), "AUTHENTICATE");
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let shown = format!("{:?}", Credential::Password("hunter2".into()));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_password_preferred() {
        let info = info(
            &[AuthMethod::Null, AuthMethod::HashedPassword],
            None,
        );
        let cred = choose_credential(&info, Some("secret")).await.unwrap();
        assert_eq!(cred, Credential::Password("secret".into()));
    }

    #[tokio::test]
    async fn test_password_skipped_when_not_offered() {
        let info = info(&[AuthMethod::Null], None);
        let cred = choose_credential(&info, Some("secret")).await.unwrap();
        assert_eq!(cred, Credential::Null);
    }

    #[tokio::test]
    async fn test_cookie_read_and_used() {
        let dir = tempfile::tempdir().unwrap();
        let cookie_path = dir.path().join("control_auth_cookie");
        std::fs::write(&cookie_path, [7u8; 32]).unwrap();

        let info = info(&[AuthMethod::Cookie, AuthMethod::Null], Some(&cookie_path));
        let cred = choose_credential(&info, None).await.unwrap();
        assert_eq!(cred, Credential::Cookie(vec![7u8; 32]));
    }

    #[tokio::test]
    async fn test_unreadable_cookie_falls_back_to_null() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing_cookie");

        let info = info(&[AuthMethod::Cookie, AuthMethod::Null], Some(&missing));
        let cred = choose_credential(&info, None).await.unwrap();
        assert_eq!(cred, Credential::Null);
    }

    #[tokio::test]
    async fn test_nothing_usable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing_cookie");

        let info = info(&[AuthMethod::SafeCookie, AuthMethod::Cookie], Some(&missing));
        let err = choose_credential(&info, None).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
