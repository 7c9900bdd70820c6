//! Universal Agent Identifier (UAID)
//!
//! Format: `uaid:did:z{base58};uid={uid};proto=hcs-10;nativeId=hedera:{network}:{account}`
//!
//! The base58 body is the UTF-8 encoding of `{network}:{account}`, so the
//! identifier is reproducible byte-for-byte from the same inputs and can be
//! reversed to the native account without a lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::PROTOCOL_TAG;
use crate::error::{LinkError, LinkResult};
use crate::types::AccountId;

const UAID_PREFIX: &str = "uaid:did:z";
const NATIVE_NAMESPACE: &str = "hedera";

/// Portable actor identifier derived from `(network, account)` and an alias
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uaid(String);

impl Uaid {
    /// Derive the identifier for an account
    ///
    /// The `uid` segment is the normalized alias, or the account id with
    /// `.` separators replaced by `-` when no usable alias is given.
    pub fn derive(network: &str, account_id: &AccountId, alias: Option<&str>) -> Self {
        let native = format!("{}:{}", network, account_id);
        let body = bs58::encode(native.as_bytes()).into_string();

        let uid = alias
            .map(normalize_alias)
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| account_id.as_str().replace('.', "-"));

        Uaid(format!(
            "{}{};uid={};proto={};nativeId={}:{}",
            UAID_PREFIX, body, uid, PROTOCOL_TAG, NATIVE_NAMESPACE, native
        ))
    }

    /// Get the UAID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `did:z...` segment
    pub fn did(&self) -> &str {
        // Skip "uaid:" (5 characters)
        self.segments().0.get(5..).unwrap_or_default()
    }

    /// The `uid` parameter
    pub fn uid(&self) -> &str {
        self.param("uid").unwrap_or_default()
    }

    /// The `nativeId` parameter (`hedera:{network}:{account}`)
    pub fn native_id(&self) -> &str {
        self.param("nativeId").unwrap_or_default()
    }

    /// Recover `(network, account)` from the base58 body
    pub fn native_parts(&self) -> LinkResult<(String, AccountId)> {
        let body = self.segments().0.get(UAID_PREFIX.len()..).unwrap_or_default();
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|_| LinkError::Identity("Invalid base58 encoding in UAID".to_string()))?;
        let native = String::from_utf8(bytes)
            .map_err(|_| LinkError::Identity("UAID body is not UTF-8".to_string()))?;
        let (network, account) = native
            .split_once(':')
            .ok_or_else(|| LinkError::Identity("UAID body missing network".to_string()))?;
        Ok((network.to_string(), AccountId::new(account)))
    }

    fn segments(&self) -> (&str, &str) {
        self.0.split_once(';').unwrap_or((&self.0, ""))
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.segments()
            .1
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Validate the format of a UAID string without parsing
    fn validate_format(value: &str) -> LinkResult<()> {
        let mut parts = value.split(';');
        let head = parts.next().unwrap_or_default();

        if !head.starts_with(UAID_PREFIX) {
            return Err(LinkError::Identity(format!(
                "UAID must start with '{}'",
                UAID_PREFIX
            )));
        }

        let body = &head[UAID_PREFIX.len()..];
        if body.is_empty() {
            return Err(LinkError::Identity("UAID identifier cannot be empty".to_string()));
        }
        bs58::decode(body)
            .into_vec()
            .map_err(|_| LinkError::Identity("Invalid base58 encoding in UAID".to_string()))?;

        let keys: Vec<&str> = parts
            .map(|pair| pair.split_once('=').map(|(k, _)| k).unwrap_or(pair))
            .collect();
        if keys != ["uid", "proto", "nativeId"] {
            return Err(LinkError::Identity(
                "UAID parameters must be uid, proto, nativeId".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse a UAID from a string
    pub fn parse(value: &str) -> LinkResult<Self> {
        Self::validate_format(value)?;
        Ok(Uaid(value.to_string()))
    }
}

/// Normalize an alias into a `uid` segment
///
/// Lower-cases, collapses every run of characters outside `[a-z0-9_-]`
/// into a single `-`, and trims leading/trailing `-`.
pub fn normalize_alias(alias: &str) -> String {
    let mut out = String::with_capacity(alias.len());
    let mut pending_dash = false;

    for c in alias.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}

impl fmt::Display for Uaid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uaid {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Uaid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
