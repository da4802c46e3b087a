//! Deterministic cache key fingerprints.

use std::fmt::Write as _;
use std::fmt::{Display, Formatter};

use sha2::{Digest, Sha256};

/// Fingerprint identifying one adapter call.
///
/// Derived from the source identifier, the query subject, and the sorted
/// parameter set, so parameter ordering or incidental formatting never
/// produces a spurious miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a fingerprint for `(source, subject, params)`.
    ///
    /// Parameter pairs are sorted by name, then value, before hashing;
    /// names and values are trimmed.
    pub fn derive(source: &str, subject: &str, params: &[(&str, &str)]) -> Self {
        let mut sorted = params
            .iter()
            .map(|(name, value)| (name.trim(), value.trim()))
            .collect::<Vec<_>>();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(source.trim().as_bytes());
        hasher.update([0x1f]);
        hasher.update(subject.trim().as_bytes());
        for (name, value) in sorted {
            hasher.update([0x1f]);
            hasher.update(name.as_bytes());
            hasher.update([0x1e]);
            hasher.update(value.as_bytes());
        }

        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest.iter() {
            let _ = write!(&mut out, "{byte:02x}");
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_parameter_order_independent() {
        let forward = CacheKey::derive(
            "gdelt",
            "Ukraine",
            &[("window_start", "2026-01-01"), ("kind", "topic")],
        );
        let permuted = CacheKey::derive(
            "gdelt",
            "Ukraine",
            &[("kind", "topic"), ("window_start", "2026-01-01")],
        );

        assert_eq!(forward, permuted);
    }

    #[test]
    fn key_ignores_incidental_whitespace() {
        let plain = CacheKey::derive("gdelt", "Ukraine", &[("kind", "topic")]);
        let padded = CacheKey::derive(" gdelt ", " Ukraine ", &[("kind ", " topic")]);

        assert_eq!(plain, padded);
    }

    #[test]
    fn different_sources_never_collide_on_same_subject() {
        let a = CacheKey::derive("gdelt", "Ukraine", &[]);
        let b = CacheKey::derive("acled", "Ukraine", &[]);

        assert_ne!(a, b);
    }

    #[test]
    fn key_is_stable_hex() {
        let key = CacheKey::derive("gdelt", "Ukraine", &[]);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
