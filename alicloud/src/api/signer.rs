//! RPC request signing (signature version 1.0, HMAC-SHA1)

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto::hmac::Hmac;
use crypto::mac::Mac;
use crypto::sha1::Sha1;
use std::collections::BTreeMap;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const SIGNATURE_VERSION: &str = "1.0";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// RFC 3986 encoding: only `A-Z a-z 0-9 - _ . ~` pass through
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sorted `key=value` pairs joined with `&`, both sides percent encoded
pub fn canonicalize(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn string_to_sign(method: &str, canonical: &str) -> String {
    format!("{}&{}&{}", method, percent_encode("/"), percent_encode(canonical))
}

pub fn sign(secret: &str, string_to_sign: &str) -> String {
    let key = format!("{}&", secret);
    let mut mac = Hmac::new(Sha1::new(), key.as_bytes());
    mac.input(string_to_sign.as_bytes());
    STANDARD.encode(mac.result().code())
}

pub struct Signer<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub security_token: Option<&'a str>,
}

impl Signer<'_> {
    /// Adds the common parameters and the `Signature` to `params`, returning
    /// the encoded request body
    pub fn sign_request(
        &self,
        method: &str,
        action: &str,
        version: &str,
        params: &mut BTreeMap<String, String>,
    ) -> String {
        let nonce = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
        self.sign_with(method, action, version, &nonce, &timestamp, params)
    }

    fn sign_with(
        &self,
        method: &str,
        action: &str,
        version: &str,
        nonce: &str,
        timestamp: &str,
        params: &mut BTreeMap<String, String>,
    ) -> String {
        params.insert("Action".into(), action.into());
        params.insert("Version".into(), version.into());
        params.insert("Format".into(), "JSON".into());
        params.insert("AccessKeyId".into(), self.access_key.into());
        params.insert("SignatureMethod".into(), SIGNATURE_METHOD.into());
        params.insert("SignatureVersion".into(), SIGNATURE_VERSION.into());
        params.insert("SignatureNonce".into(), nonce.into());
        params.insert("Timestamp".into(), timestamp.into());
        if let Some(token) = self.security_token {
            params.insert("SecurityToken".into(), token.into());
        }

        let canonical = canonicalize(params);
        let signature = sign(self.secret_key, &string_to_sign(method, &canonical));
        format!("Signature={}&{}", percent_encode(&signature), canonical)
    }
}
