//! Request signing for authenticated Kalshi endpoints.
//!
//! Each authenticated request carries three headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `KALSHI-ACCESS-KEY` | API key id |
//! | `KALSHI-ACCESS-TIMESTAMP` | Unix time in milliseconds |
//! | `KALSHI-ACCESS-SIGNATURE` | base64 RSA-PSS signature |
//!
//! The signed message is `timestamp + METHOD + signing_path`, where the signing
//! path is the request path without its query string, prefixed by the path
//! component of the configured base URL.
//!
//! # Security Note
//!
//! The private key is read from disk on first use and kept in memory for the
//! lifetime of the signer. Neither the key id nor the key appears in `Debug`
//! output or error messages.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::rand_core::OsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use crate::error::ApiError;

/// Header carrying the API key id.
pub const ACCESS_KEY_HEADER: &str = "KALSHI-ACCESS-KEY";
/// Header carrying the base64 signature.
pub const ACCESS_SIGNATURE_HEADER: &str = "KALSHI-ACCESS-SIGNATURE";
/// Header carrying the millisecond timestamp.
pub const ACCESS_TIMESTAMP_HEADER: &str = "KALSHI-ACCESS-TIMESTAMP";

/// The three authentication headers for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    /// API key id.
    pub key_id: String,
    /// Base64-encoded signature.
    pub signature: String,
    /// Millisecond timestamp that was signed.
    pub timestamp: String,
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("key_id", &"***")
            .field("signature", &"***")
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl AuthHeaders {
    /// Returns the headers as name/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> [(String, String); 3] {
        [
            (ACCESS_KEY_HEADER.to_string(), self.key_id),
            (ACCESS_SIGNATURE_HEADER.to_string(), self.signature),
            (ACCESS_TIMESTAMP_HEADER.to_string(), self.timestamp),
        ]
    }
}

/// Computes authentication headers for Kalshi requests.
pub struct RequestSigner {
    key_id: Option<String>,
    key_path: Option<PathBuf>,
    base_path: String,
    key: OnceLock<BlindedSigningKey<Sha256>>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id.as_ref().map(|_| "***"))
            .field("key_path", &self.key_path)
            .field("base_path", &self.base_path)
            .field("key_loaded", &self.key.get().is_some())
            .finish()
    }
}

impl RequestSigner {
    /// Creates a signer for requests sent below `base_url`.
    ///
    /// Blank key ids are treated as absent.
    #[must_use]
    pub fn new(base_url: &str, key_id: Option<String>, key_path: Option<PathBuf>) -> Self {
        Self {
            key_id: key_id.filter(|id| !id.trim().is_empty()),
            key_path: key_path.filter(|p| !p.as_os_str().is_empty()),
            base_path: base_path_of(base_url),
            key: OnceLock::new(),
        }
    }

    /// Returns `true` if both the key id and key path are configured.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.key_id.is_some() && self.key_path.is_some()
    }

    /// Returns the canonical path that is signed for `path`.
    #[must_use]
    pub fn signing_path(&self, path: &str) -> String {
        signing_path(&self.base_path, path)
    }

    /// Signs `method path` with the current time.
    ///
    /// # Errors
    ///
    /// Fails without touching the network if credentials are missing, the key
    /// cannot be loaded, or signing fails.
    pub fn sign(&self, method: &str, path: &str) -> Result<AuthHeaders, ApiError> {
        self.sign_at(method, path, chrono::Utc::now().timestamp_millis())
    }

    /// Signs `method path` with an explicit millisecond timestamp.
    ///
    /// # Errors
    ///
    /// See [`sign`](Self::sign).
    pub fn sign_at(
        &self,
        method: &str,
        path: &str,
        timestamp_ms: i64,
    ) -> Result<AuthHeaders, ApiError> {
        let (Some(key_id), Some(key_path)) = (&self.key_id, &self.key_path) else {
            return Err(ApiError::MissingCredentials);
        };

        let timestamp = timestamp_ms.to_string();
        let message = signing_message(&timestamp, method, &self.signing_path(path));
        let key = self.signing_key(key_path)?;
        let signature = key
            .try_sign_with_rng(&mut OsRng, message.as_bytes())
            .map_err(|_| ApiError::Signing)?;

        Ok(AuthHeaders {
            key_id: key_id.clone(),
            signature: BASE64_STANDARD.encode(signature.to_bytes()),
            timestamp,
        })
    }

    fn signing_key(&self, key_path: &Path) -> Result<&BlindedSigningKey<Sha256>, ApiError> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }
        let loaded = BlindedSigningKey::<Sha256>::new(load_private_key(key_path)?);
        tracing::debug!(path = %key_path.display(), "Loaded Kalshi API signing key");
        // A concurrent first use may have won the race; either key is equivalent.
        let _ = self.key.set(loaded);
        self.key.get().ok_or(ApiError::Signing)
    }
}

/// Builds the exact string that is signed.
#[must_use]
pub fn signing_message(timestamp: &str, method: &str, signing_path: &str) -> String {
    format!("{timestamp}{}{signing_path}", method.to_ascii_uppercase())
}

/// Returns the path component of `base_url` without a trailing slash.
///
/// Unparseable URLs yield an empty base path.
#[must_use]
pub fn base_path_of(base_url: &str) -> String {
    url::Url::parse(base_url)
        .map(|u| u.path().trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Canonicalises `path` for signing beneath `base_path`.
///
/// A leading slash is added if missing and any query string is dropped.
#[must_use]
pub fn signing_path(base_path: &str, path: &str) -> String {
    let without_query = path.split_once('?').map_or(path, |(p, _)| p);
    let base = base_path.trim_end_matches('/');
    if without_query.starts_with('/') {
        format!("{base}{without_query}")
    } else {
        format!("{base}/{without_query}")
    }
}

fn load_private_key(path: &Path) -> Result<RsaPrivateKey, ApiError> {
    let pem = std::fs::read_to_string(path).map_err(|source| ApiError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;

    RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|_| ApiError::KeyParse {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::pss::{Signature, VerifyingKey};
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;

    use super::*;

    fn write_key(dir: &Path) -> (PathBuf, RsaPublicKey) {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let path = dir.join("kalshi.pem");
        std::fs::write(&path, pem.as_bytes()).unwrap();
        (path, public_key)
    }

    #[test]
    fn signing_path_across_base_url_shapes() {
        let cases = [
            ("https://host/trade-api/v2", "/portfolio/balance", "/trade-api/v2/portfolio/balance"),
            ("https://host/trade-api/v2/", "/portfolio/balance", "/trade-api/v2/portfolio/balance"),
            ("https://host", "/portfolio/balance", "/portfolio/balance"),
            ("https://host/", "/portfolio/balance", "/portfolio/balance"),
            ("https://host/trade-api/v2", "portfolio/orders", "/trade-api/v2/portfolio/orders"),
            (
                "https://host/trade-api/v2",
                "/portfolio/orders?limit=5&status=resting",
                "/trade-api/v2/portfolio/orders",
            ),
        ];

        for (base_url, path, expected) in cases {
            let signer = RequestSigner::new(base_url, None, None);
            assert_eq!(signer.signing_path(path), expected, "base_url={base_url} path={path}");
        }
    }

    #[test]
    fn signing_message_layout() {
        let path = signing_path(&base_path_of("https://host/trade-api/v2"), "/portfolio/balance");
        assert_eq!(
            signing_message("1700000000000", "get", &path),
            "1700000000000GET/trade-api/v2/portfolio/balance"
        );
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let signer = RequestSigner::new("https://host/trade-api/v2", None, None);
        assert!(matches!(
            signer.sign("GET", "/portfolio/balance"),
            Err(ApiError::MissingCredentials)
        ));

        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("   ".to_string()),
            Some(PathBuf::from("/nonexistent.pem")),
        );
        assert!(matches!(
            signer.sign("GET", "/portfolio/balance"),
            Err(ApiError::MissingCredentials)
        ));
    }

    #[test]
    fn has_credentials_needs_key_id_and_path() {
        let base_url = "https://host/trade-api/v2";
        let key_path = || Some(PathBuf::from("/keys/kalshi.pem"));

        assert!(!RequestSigner::new(base_url, None, None).has_credentials());
        assert!(!RequestSigner::new(base_url, None, key_path()).has_credentials());
        assert!(!RequestSigner::new(base_url, Some(" ".to_string()), key_path()).has_credentials());
        assert!(!RequestSigner::new(base_url, Some("key".to_string()), None).has_credentials());
        assert!(RequestSigner::new(base_url, Some("key".to_string()), key_path()).has_credentials());
    }

    #[test]
    fn unreadable_and_unparseable_keys_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();

        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("key-id".to_string()),
            Some(dir.path().join("missing.pem")),
        );
        let err = signer.sign("GET", "/portfolio/balance").unwrap_err();
        assert!(matches!(err, ApiError::KeyRead { .. }));
        assert!(err.is_configuration());

        let garbage = dir.path().join("garbage.pem");
        std::fs::write(&garbage, "not a key").unwrap();
        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("key-id".to_string()),
            Some(garbage),
        );
        assert!(matches!(
            signer.sign("GET", "/portfolio/balance"),
            Err(ApiError::KeyParse { .. })
        ));
    }

    #[test]
    fn signature_verifies_against_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let (path, public_key) = write_key(dir.path());
        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("key-id".to_string()),
            Some(path),
        );

        let headers = signer
            .sign_at("GET", "/portfolio/balance?x=1", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers.key_id, "key-id");
        assert_eq!(headers.timestamp, "1700000000000");

        let raw = BASE64_STANDARD.decode(&headers.signature).unwrap();
        let signature = Signature::try_from(raw.as_slice()).unwrap();
        let verifier = VerifyingKey::<Sha256>::new(public_key);
        verifier
            .verify(
                b"1700000000000GET/trade-api/v2/portfolio/balance",
                &signature,
            )
            .unwrap();
    }

    #[test]
    fn key_is_cached_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = write_key(dir.path());
        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("key-id".to_string()),
            Some(path.clone()),
        );

        signer.sign("GET", "/portfolio/balance").unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(signer.sign("POST", "/portfolio/orders").is_ok());
    }

    #[test]
    fn debug_output_masks_key_id() {
        let signer = RequestSigner::new(
            "https://host/trade-api/v2",
            Some("super-secret-id".to_string()),
            None,
        );
        let debug = format!("{signer:?}");
        assert!(!debug.contains("super-secret-id"));
        assert!(debug.contains("***"));
    }
}
