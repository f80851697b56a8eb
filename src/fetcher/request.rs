use crate::error::FetchError;
use crate::models::{FetchOptions, Method, RequestDescriptor};
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Prefix `https://` unless the URL already starts with `http`.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Merge per-call overrides onto the base headers. Always returns a new map.
pub fn build_headers(
    base: &BTreeMap<String, String>,
    cookie: Option<&str>,
    user_agent: Option<&str>,
) -> BTreeMap<String, String> {
    let mut headers = base.clone();
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        set_header(&mut headers, "Cookie", cookie);
    }
    if let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) {
        set_header(&mut headers, "User-Agent", ua);
    }
    headers
}

/// Insert `name`, replacing any entry that differs from it only in case.
pub fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

/// Undo JSON/JS string escapes (`\uXXXX`, `\xHH`, `\/`, `\\`) in a scraped URL.
/// Unrecognised sequences are kept verbatim.
pub fn decode_escaped_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut chars = url.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('u') | Some('x') => {
                let marker = chars.next().unwrap_or('u');
                let width = if marker == 'u' { 4 } else { 2 };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(marker);
                    }
                }
            }
            Some(next @ ('/' | '\\' | '"' | '\'')) => {
                out.push(next);
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Turns caller options into an immutable [`RequestDescriptor`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_headers: BTreeMap<String, String>,
    timeout: Duration,
    follow_redirects: bool,
    proxy_verify_tls: bool,
}

impl RequestBuilder {
    pub fn new(
        base_headers: BTreeMap<String, String>,
        timeout: Duration,
        follow_redirects: bool,
        proxy_verify_tls: bool,
    ) -> Self {
        Self {
            base_headers,
            timeout,
            follow_redirects,
            proxy_verify_tls,
        }
    }

    pub fn base_headers(&self) -> &BTreeMap<String, String> {
        &self.base_headers
    }

    pub fn descriptor(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<RequestDescriptor, FetchError> {
        if options.method == Method::Head && options.want_content {
            return Err(FetchError::configuration(
                "HEAD requests carry no body; set want_content to false",
            ));
        }

        let headers = build_headers(
            &self.base_headers,
            options.cookie.as_deref(),
            options.user_agent.as_deref(),
        );
        validate_headers(&headers)?;

        let url = normalize_url(url);
        if let Err(e) = Url::parse(&url) {
            return Err(FetchError::InvalidUrl {
                url,
                reason: e.to_string(),
            });
        }

        let proxy = options.proxy.clone().filter(|p| !p.is_empty());
        // Proxied dispatch always follows redirects and uses the configured TLS policy.
        let (follow_redirects, verify_tls) = match proxy {
            Some(_) => (true, self.proxy_verify_tls),
            None => (self.follow_redirects, true),
        };

        Ok(RequestDescriptor {
            method: options.method,
            url,
            headers,
            cookie: options.cookie.clone(),
            proxy,
            query: options.transport.query.clone(),
            timeout: options.transport.timeout.unwrap_or(self.timeout),
            follow_redirects,
            verify_tls,
        })
    }
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), FetchError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::configuration(format!("invalid header name {:?}", name)))?;
        HeaderValue::from_str(value).map_err(|_| {
            FetchError::configuration(format!("invalid value for header {:?}", name))
        })?;
    }
    Ok(())
}
