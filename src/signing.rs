//! The business.ru `app_psw` scheme.
//!
//! Requests are signed as `md5(secret_material + query)` and responses as
//! `md5(secret_material + canonical_json)`, where the secret material is
//! `token + secret` for ordinary calls and only `secret` for the `repair`
//! bootstrap. Everything here is pure; the client owns the token.

use std::io;

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::params::Params;

/// Name of the signature field in both directions.
pub const SIGNATURE_FIELD: &str = "app_psw";

/// Name of the fresh-token field in every signed response.
pub const TOKEN_FIELD: &str = "token";

/// Name of the application id injected into every signed query.
pub const APP_ID_FIELD: &str = "app_id";

/// Which key material a signature is computed with.
#[derive(Debug, Clone, Copy)]
pub enum SecretMaterial<'a> {
    /// `token + secret`: every call except `repair`.
    WithToken { token: &'a str, secret: &'a str },
    /// `secret` alone: the `repair` bootstrap.
    Tokenless { secret: &'a str },
}

impl SecretMaterial<'_> {
    /// Hex MD5 of this material followed by `data`.
    pub fn sign(&self, data: &str) -> String {
        let mut hasher = Md5::new();
        match self {
            SecretMaterial::WithToken { token, secret } => {
                hasher.update(token.as_bytes());
                hasher.update(secret.as_bytes());
            }
            SecretMaterial::Tokenless { secret } => hasher.update(secret.as_bytes()),
        }
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Form-encodes sorted pairs the way the server re-encodes them: `+` for
/// space and `A-Z a-z 0-9 _ . - ~` left as is.
pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(input: &str) -> String {
    // byte_serialize keeps `*` and escapes `~`; the server does the opposite.
    form_urlencoded::byte_serialize(input.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// Builds `base_url?Q&app_psw=S` with `app_id` injected into the parameters.
pub fn build_signed_url(
    base_url: &str,
    params: &Params,
    app_id: &str,
    material: SecretMaterial<'_>,
) -> String {
    let params = params.clone().with(APP_ID_FIELD, app_id);
    let query = encode_query(&params.to_sorted_pairs());
    let signature = material.sign(&query);
    format!("{}?{}&{}={}", base_url, query, SIGNATURE_FIELD, signature)
}

/// Compact JSON with non-ASCII characters escaped as `\uXXXX`.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Serializes a response object exactly as the server hashed it.
pub fn canonical_json(object: &Map<String, Value>) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    object.serialize(&mut serializer)?;
    // The formatter only emits ASCII.
    Ok(String::from_utf8_lossy(&out).replace('/', "\\/"))
}

/// Outcome of checking a response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Signature matched; carries the fresh token and the business payload.
    Valid {
        token: String,
        payload: Map<String, Value>,
    },
    /// `app_psw` was absent.
    MissingSignature,
    /// `app_psw` did not match the recomputed signature.
    SignatureMismatch { expected: String, received: String },
    /// Signature matched but no string `token` was present.
    MissingToken,
}

/// Strips and checks `app_psw`, then strips `token`.
///
/// Key order of the remaining payload is the order received.
pub fn validate_response(
    mut envelope: Map<String, Value>,
    material: SecretMaterial<'_>,
) -> serde_json::Result<Validation> {
    let received = match envelope.shift_remove(SIGNATURE_FIELD) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Ok(Validation::MissingSignature),
    };

    let expected = material.sign(&canonical_json(&envelope)?);
    if received != expected {
        return Ok(Validation::SignatureMismatch { expected, received });
    }

    Ok(match envelope.shift_remove(TOKEN_FIELD) {
        Some(Value::String(token)) => Validation::Valid {
            token,
            payload: envelope,
        },
        _ => Validation::MissingToken,
    })
}
