//! Shared Key request signing for the Blob service.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use super::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Builds the string-to-sign for a bodiless request (HEAD/GET).
///
/// `ms_headers` are the `x-ms-*` headers sent with the request.
pub fn string_to_sign(method: &str, url: &Url, account: &str, ms_headers: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(method);
    out.push('\n');
    // Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    for _ in 0..11 {
        out.push('\n');
    }

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .collect();
    headers.sort();
    for (name, value) in headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }

    out.push('/');
    out.push_str(account);
    out.push_str(url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }

    out
}

/// `SharedKey <account>:<signature>` for the given string-to-sign.
pub fn authorization(account: &str, key_base64: &str, string_to_sign: &str) -> Result<String, StorageError> {
    let key = STANDARD
        .decode(key_base64)
        .map_err(|e| StorageError::InvalidConnectionString(format!("AccountKey: {}", e)))?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| StorageError::InvalidConnectionString(format!("AccountKey: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKey {}:{}", account, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_sign_head() {
        let url = Url::parse("https://acct.blob.core.windows.net/jobs/nightly/cfg.json").unwrap();
        let sts = string_to_sign(
            "HEAD",
            &url,
            "acct",
            &[
                ("x-ms-version", "2021-08-06"),
                ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ],
        );
        assert_eq!(
            sts,
            "HEAD\n\n\n\n\n\n\n\n\n\n\n\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /acct/jobs/nightly/cfg.json"
        );
    }

    #[test]
    fn test_string_to_sign_path_style_with_query() {
        let url = Url::parse("http://127.0.0.1:10000/devstoreaccount1/jobs/a.txt?comp=metadata&Timeout=30")
            .unwrap();
        let sts = string_to_sign("GET", &url, "devstoreaccount1", &[("x-ms-version", "2021-08-06")]);
        assert!(sts.ends_with(
            "/devstoreaccount1/devstoreaccount1/jobs/a.txt\ncomp:metadata\ntimeout:30"
        ));
    }

    #[test]
    fn test_string_to_sign_ignores_other_headers() {
        let url = Url::parse("https://acct.blob.core.windows.net/c/p").unwrap();
        let sts = string_to_sign("GET", &url, "acct", &[("content-type", "text/plain")]);
        assert!(!sts.contains("text/plain"));
    }

    #[test]
    fn test_authorization_is_deterministic() {
        let first = authorization("acct", "a2V5", "GET\n").unwrap();
        let second = authorization("acct", "a2V5", "GET\n").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("SharedKey acct:"));

        let other = authorization("acct", "a2V5", "HEAD\n").unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_authorization_rejects_bad_key() {
        let err = authorization("acct", "not base64!", "GET\n").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConnectionString(_)));
    }
}
