//! Presigned download query strings.
//!
//! Signing itself belongs to the content store; this module only reads the
//! signed fields back out of a request, checks that the URL is still within
//! its lifetime and rebuilds the exact query the store signed.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::AppError;

pub const ALGORITHM: &str = "X-Amz-Algorithm";
pub const CREDENTIAL: &str = "X-Amz-Credential";
pub const DATE: &str = "X-Amz-Date";
pub const EXPIRES: &str = "X-Amz-Expires";
pub const SIGNATURE: &str = "X-Amz-Signature";
pub const SIGNED_HEADERS: &str = "X-Amz-SignedHeaders";
pub const CHECKSUM_MODE: &str = "X-Amz-Checksum-Mode";
pub const X_ID: &str = "x-id";
pub const SECURITY_TOKEN: &str = "X-Amz-Security-Token";

/// Format of `X-Amz-Date`.
pub const DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// The signed fields of a presigned URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresignedQuery {
    pub algorithm: String,
    pub credential: String,
    pub date: String,
    pub expires: String,
    pub signature: String,
    pub signed_headers: String,
    pub checksum_mode: Option<String>,
    pub x_id: Option<String>,
    pub security_token: Option<String>,
}

impl PresignedQuery {
    /// Pull the signed fields out of a raw query string, ignoring anything
    /// else on the request (image options, unrelated parameters).
    pub fn parse(query: &str) -> Result<Self, AppError> {
        let mut parsed = PresignedQuery::default();
        for pair in query.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " "))
                .map_err(|e| AppError::InvalidInput(format!("invalid query value: {}", e)))?
                .into_owned();
            parsed.set(key, value);
        }
        parsed.require_fields()?;
        Ok(parsed)
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            ALGORITHM => self.algorithm = value,
            CREDENTIAL => self.credential = value,
            DATE => self.date = value,
            EXPIRES => self.expires = value,
            SIGNATURE => self.signature = value,
            SIGNED_HEADERS => self.signed_headers = value,
            CHECKSUM_MODE => self.checksum_mode = Some(value),
            X_ID => self.x_id = Some(value),
            SECURITY_TOKEN => self.security_token = Some(value),
            _ => {}
        }
    }

    fn require_fields(&self) -> Result<(), AppError> {
        let required = [
            (ALGORITHM, &self.algorithm),
            (CREDENTIAL, &self.credential),
            (DATE, &self.date),
            (EXPIRES, &self.expires),
            (SIGNATURE, &self.signature),
            (SIGNED_HEADERS, &self.signed_headers),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "missing presigned parameter {}",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Fields that precede the signature, in canonical order. Used by stores
    /// that sign the query themselves.
    pub fn unsigned_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            (ALGORITHM, self.algorithm.as_str()),
            (CREDENTIAL, self.credential.as_str()),
            (DATE, self.date.as_str()),
            (EXPIRES, self.expires.as_str()),
            (SIGNED_HEADERS, self.signed_headers.as_str()),
        ];
        if let Some(ref v) = self.checksum_mode {
            pairs.push((CHECKSUM_MODE, v.as_str()));
        }
        if let Some(ref v) = self.x_id {
            pairs.push((X_ID, v.as_str()));
        }
        if let Some(ref v) = self.security_token {
            pairs.push((SECURITY_TOKEN, v.as_str()));
        }
        pairs
    }

    /// Rebuild the query string in the fixed key order the signature was
    /// computed over. The security token, when present, always goes last.
    pub fn to_query_string(&self) -> String {
        let mut pairs = vec![
            (ALGORITHM, self.algorithm.as_str()),
            (CREDENTIAL, self.credential.as_str()),
            (DATE, self.date.as_str()),
            (EXPIRES, self.expires.as_str()),
            (SIGNATURE, self.signature.as_str()),
            (SIGNED_HEADERS, self.signed_headers.as_str()),
        ];
        if let Some(ref v) = self.checksum_mode {
            pairs.push((CHECKSUM_MODE, v.as_str()));
        }
        if let Some(ref v) = self.x_id {
            pairs.push((X_ID, v.as_str()));
        }

        let mut query = encode_pairs(&pairs);
        if let Some(ref token) = self.security_token {
            query.push_str(&format!("&{}={}", SECURITY_TOKEN, urlencoding::encode(token)));
        }
        query
    }

    pub fn issued_at(&self) -> Result<DateTime<Utc>, AppError> {
        NaiveDateTime::parse_from_str(&self.date, DATE_FORMAT)
            .map(|dt| dt.and_utc())
            .map_err(|e| {
                AppError::InvalidInput(format!("problem parsing {} '{}': {}", DATE, self.date, e))
            })
    }

    pub fn expires_secs(&self) -> Result<i64, AppError> {
        self.expires.parse::<i64>().map_err(|e| {
            AppError::InvalidInput(format!(
                "problem parsing {} '{}': {}",
                EXPIRES, self.expires, e
            ))
        })
    }

    /// Seconds of validity left at `now`; errors once the URL has expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Result<i64, AppError> {
        let expires = self.expires_secs()?;
        let issued = self.issued_at()?;
        let elapsed = (now - issued).num_seconds();
        match expires.checked_sub(elapsed) {
            Some(remaining) if remaining > 0 => Ok(remaining),
            _ => Err(AppError::SignatureExpired),
        }
    }
}

/// Parse `query` and return the remaining validity at `now`.
pub fn validate(query: &str, now: DateTime<Utc>) -> Result<i64, AppError> {
    PresignedQuery::parse(query)?.remaining_secs(now)
}

/// Format a signing time for `X-Amz-Date`.
pub fn format_date(value: DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn encode_pairs(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical encoding of the unsigned fields, used as signing input.
pub fn canonical_unsigned(query: &PresignedQuery) -> String {
    encode_pairs(&query.unsigned_pairs())
}
