//! Raw user text → fetchable URL + derived basename.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::config::EngineConfig;

/// Extensions relayed as-is. Anything else is treated as opaque binary.
pub const RECOGNIZED_EXTENSIONS: [&str; 3] = [".pdf", ".mp4", ".ws"];

/// Closed classification of a download, computed once at resolve time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Video,
    Generic,
}

impl FileKind {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            Self::Pdf
        } else if lower.ends_with(".mp4") {
            Self::Video
        } else {
            Self::Generic
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no valid link found")]
    NoValidUrl,

    #[error("locked/private resource: {url}")]
    LockedResource { url: String, host: String },
}

/// A link that passed extraction, normalization and the locked-origin gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// The substring as the user sent it.
    pub original: String,
    /// Path-normalized URL handed to the HTTP client.
    pub url: String,
    pub host: String,
    /// Unsanitized basename with the `.bin` fallback already applied.
    pub basename: String,
    pub kind: FileKind,
}

#[derive(Clone, Debug)]
pub struct Normalizer {
    locked_hosts: Vec<String>,
    allow_insecure_http: bool,
}

impl Normalizer {
    pub fn new(locked_hosts: Vec<String>, allow_insecure_http: bool) -> Self {
        Self {
            locked_hosts: locked_hosts
                .into_iter()
                .map(|h| h.trim().trim_start_matches('.').to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            allow_insecure_http,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.locked_hosts.clone(), cfg.allow_insecure_http)
    }

    pub fn resolve(&self, text: &str, position: usize) -> Result<ResolvedUrl, ResolveError> {
        let original = extract_first_url(text, self.allow_insecure_http)
            .ok_or(ResolveError::NoValidUrl)?;

        let parts = split_url(original).ok_or(ResolveError::NoValidUrl)?;
        // Per segment, so an encoded `%2F` stays inside its segment.
        let segments: Vec<Vec<u8>> = parts.path.split('/').map(percent_decode).collect();
        let path = segments
            .iter()
            .map(|s| encode_segment(s))
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}://{}{}{}",
            parts.scheme, parts.authority, path, parts.rest
        );

        let parsed = Url::parse(&url).map_err(|_| ResolveError::NoValidUrl)?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ResolveError::NoValidUrl)?
            .to_lowercase();

        if self.is_locked(&host) {
            return Err(ResolveError::LockedResource {
                url: original.to_string(),
                host,
            });
        }

        let last = segments
            .last()
            .map(|s| String::from_utf8_lossy(s))
            .unwrap_or_default();
        let basename = derive_basename(&last, position);
        let kind = FileKind::from_file_name(&basename);

        Ok(ResolvedUrl {
            original: original.to_string(),
            url,
            host,
            basename,
            kind,
        })
    }

    fn is_locked(&self, host: &str) -> bool {
        self.locked_hosts.iter().any(|pat| {
            host == pat
                || host
                    .strip_suffix(pat.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

fn https_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https://[^\s<>"'`]+"#).expect("valid regex"))
}

fn any_http_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'`]+"#).expect("valid regex"))
}

/// First absolute link in `text`, with trailing prose punctuation trimmed.
pub fn extract_first_url(text: &str, allow_insecure_http: bool) -> Option<&str> {
    let re = if allow_insecure_http {
        any_http_re()
    } else {
        https_only_re()
    };
    let m = re.find(text)?.as_str();
    let trimmed = m.trim_end_matches(|c: char| {
        matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '>' | '\'' | '"'
        )
    });
    // "https://" alone (or followed by punctuation only) has no host.
    if trimmed.ends_with("://") {
        return None;
    }
    Some(trimmed)
}

struct UrlParts<'a> {
    scheme: &'a str,
    authority: &'a str,
    path: &'a str,
    /// `?query#fragment`, untouched.
    rest: &'a str,
}

fn split_url(raw: &str) -> Option<UrlParts<'_>> {
    let (scheme, after) = raw.split_once("://")?;
    let auth_end = after.find(['/', '?', '#']).unwrap_or(after.len());
    let (authority, tail) = after.split_at(auth_end);
    if authority.is_empty() {
        return None;
    }
    let path_end = tail.find(['?', '#']).unwrap_or(tail.len());
    let (path, rest) = tail.split_at(path_end);
    Some(UrlParts {
        scheme,
        authority,
        path,
        rest,
    })
}

/// Raw bytes, so escapes that are not UTF-8 survive the round trip.
fn percent_decode(segment: &str) -> Vec<u8> {
    urlencoding::decode_binary(segment.as_bytes()).into_owned()
}

/// Re-encode a decoded segment, keeping RFC 3986 `pchar`s literal.
fn encode_segment(decoded: &[u8]) -> String {
    let mut out = String::with_capacity(decoded.len());
    for &b in decoded {
        let literal = b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'-' | b'.'
                    | b'_'
                    | b'~'
                    | b'!'
                    | b'$'
                    | b'&'
                    | b'\''
                    | b'('
                    | b')'
                    | b'*'
                    | b'+'
                    | b','
                    | b';'
                    | b'='
                    | b':'
                    | b'@'
            );
        if literal {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn derive_basename(last_segment: &str, position: usize) -> String {
    let last = last_segment.trim();
    let mut name = if last.is_empty() {
        format!("file_{position}")
    } else {
        last.to_string()
    };
    let lower = name.to_lowercase();
    if !RECOGNIZED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        name.push_str(".bin");
    }
    name
}
