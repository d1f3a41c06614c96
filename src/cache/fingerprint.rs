//! Deterministic key derivation from a canonical request.

use sha2::{Digest, Sha256};

use crate::types::CanonicalRequest;

/// The exact-match key plus a short content hash for a canonical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub exact_key: String,
    pub short_hash: String,
}

/// Stateless, like [`super::normalizer::Normalizer`] — all state lives in
/// the `CanonicalRequest` and tenant passed in.
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn fingerprint(req: &CanonicalRequest, tenant: &str) -> Fingerprint {
        Fingerprint {
            exact_key: Self::key(req, tenant),
            short_hash: Self::hash(req),
        }
    }

    /// `exact_key` folds the tenant into the hash so two tenants asking the
    /// identical canonical request never collide.
    pub fn key(req: &CanonicalRequest, tenant: &str) -> String {
        match req.to_stable_bytes() {
            Ok(bytes) => {
                let mut hasher = Sha256::new();
                hasher.update(b"tenant:");
                hasher.update(tenant.as_bytes());
                hasher.update(b"\x00");
                hasher.update(&bytes);
                format!("{:x}", hasher.finalize())
            }
            Err(_) => Self::hash_str(&Self::composite_fallback(req, tenant)),
        }
    }

    /// `short_hash` intentionally excludes the tenant: it identifies the
    /// *content*, which is what the semantic/token strategies want to
    /// display or dedupe on, independent of who asked.
    pub fn hash(req: &CanonicalRequest) -> String {
        match req.to_stable_bytes() {
            Ok(bytes) => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                let digest = format!("{:x}", hasher.finalize());
                digest[..16].to_string()
            }
            Err(_) => {
                let digest = Self::hash_str(&Self::composite_fallback(req, ""));
                digest[..16.min(digest.len())].to_string()
            }
        }
    }

    /// Exists only so key generation is total: `serde_json` serialisation
    /// of `CanonicalRequest` cannot actually fail for any value this crate
    /// constructs, but the fallback keeps that an implementation detail
    /// rather than a panic-worthy invariant.
    fn composite_fallback(req: &CanonicalRequest, tenant: &str) -> String {
        let first_user = req.first_user_text(50);
        if first_user.is_empty() {
            format!(
                "{}:{}:{}",
                req.model,
                tenant,
                chrono::Utc::now().timestamp()
            )
        } else {
            format!("{}:{}:{}", req.model, tenant, first_user)
        }
    }

    fn hash_str(s: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(s.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
