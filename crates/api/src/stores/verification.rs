//! Email verification codes.
//!
//! One live code per email address, shared by registration and password
//! reset. A code is consumed by the first successful validation; an expired
//! code is discarded the first time anyone tries it; a wrong guess leaves the
//! stored code in place for the rest of its TTL.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use thiserror::Error;

use crate::{clock::Clock, config::Config};

/// Codes are drawn from 100000..=999999 so they never start with a zero.
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Why a submitted code was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeError {
    /// Never requested and already consumed look the same on purpose.
    #[error("Verification code not found or already used")]
    NotFound,
    #[error("Verification code has expired, please request a new one")]
    Expired,
    #[error("Incorrect verification code")]
    Mismatch,
}

impl CodeError {
    /// User-safe message for the response body.
    pub fn message(&self) -> &'static str {
        match self {
            CodeError::NotFound => "Verification code not found or already used",
            CodeError::Expired => "Verification code has expired, please request a new one",
            CodeError::Mismatch => "Incorrect verification code",
        }
    }
}

/// Flow a code was issued for. Only used for logging; both flows share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Register,
    ResetPassword,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
            CodePurpose::ResetPassword => "reset_password",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredCode {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Generate a random six digit code in `100000..=999999`.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Email with the local part reduced to its first character, for log fields.
fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

/// In-memory verification code store keyed by email.
pub struct CodeStore {
    codes: DashMap<String, StoredCode>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl CodeStore {
    pub fn new(ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.code_ttl(), clock)
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Store `code` for `email` with the default TTL, replacing any earlier code.
    pub fn save_code(&self, email: &str, code: &str) {
        self.save_code_with_ttl(email, code, self.ttl);
    }

    /// Store `code` for `email` expiring `ttl` from now, replacing any earlier code.
    pub fn save_code_with_ttl(&self, email: &str, code: &str, ttl: TimeDelta) {
        // A TTL past the end of representable time never expires.
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.codes.insert(
            email.to_owned(),
            StoredCode {
                code: code.to_owned(),
                expires_at,
            },
        );
    }

    /// Generate and store a fresh code for `email`, returning it for delivery.
    pub fn issue(&self, email: &str, purpose: CodePurpose) -> String {
        let code = generate_code();
        self.save_code(email, &code);

        tracing::info!(
            email = %mask_email(email),
            purpose = purpose.as_str(),
            "verification code issued"
        );

        code
    }

    /// Check `submitted` against the code stored for `email`.
    ///
    /// Success and expiry both remove the stored code. The decision and the
    /// removal happen under one shard lock, so concurrent callers holding the
    /// same correct code get exactly one `Ok`.
    pub fn validate_code(&self, email: &str, submitted: &str) -> Result<(), CodeError> {
        let now = self.clock.now();

        let result = match self.codes.entry(email.to_owned()) {
            Entry::Vacant(_) => Err(CodeError::NotFound),
            Entry::Occupied(entry) => {
                let expired = now > entry.get().expires_at;
                let matches = entry.get().code == submitted;

                if expired {
                    entry.remove();
                    Err(CodeError::Expired)
                } else if !matches {
                    Err(CodeError::Mismatch)
                } else {
                    entry.remove();
                    Ok(())
                }
            }
        };

        let masked = mask_email(email);
        match &result {
            Ok(()) => tracing::info!(email = %masked, "verification code consumed"),
            Err(CodeError::NotFound) => {
                tracing::warn!(email = %masked, "verification failed: no code on record")
            }
            Err(CodeError::Expired) => {
                tracing::warn!(email = %masked, "verification failed: code expired")
            }
            Err(CodeError::Mismatch) => {
                tracing::warn!(email = %masked, "verification failed: wrong code")
            }
        }

        result
    }

    /// Drops every code that expired before `now`. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.codes.retain(|_, stored| {
            let keep = now <= stored.expires_at;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
