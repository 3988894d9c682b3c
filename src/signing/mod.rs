//! Request signing for the Kalshi trade API.
//!
//! Every authenticated request carries three headers:
//! - `KALSHI-ACCESS-KEY`: the API key id
//! - `KALSHI-ACCESS-TIMESTAMP`: milliseconds since the Unix epoch
//! - `KALSHI-ACCESS-SIGNATURE`: base64 RSA-PSS/SHA-256 signature over
//!   `timestamp + METHOD + path`, where `path` excludes the query string

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::TradingError;
use crate::metrics;

/// API key header.
pub const HEADER_KEY: &str = "KALSHI-ACCESS-KEY";
/// Timestamp header.
pub const HEADER_TIMESTAMP: &str = "KALSHI-ACCESS-TIMESTAMP";
/// Signature header.
pub const HEADER_SIGNATURE: &str = "KALSHI-ACCESS-SIGNATURE";

/// Signs requests with an RSA private key.
#[derive(Clone)]
pub struct KalshiSigner {
    key_id: String,
    signing_key: Arc<BlindedSigningKey<Sha256>>,
}

impl fmt::Debug for KalshiSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KalshiSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl KalshiSigner {
    /// Create a signer from a parsed private key.
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: Arc::new(BlindedSigningKey::<Sha256>::new(private_key)),
        }
    }

    /// Create a signer from a PKCS#8 or PKCS#1 PEM.
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self, TradingError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| TradingError::SigningError(format!("Invalid RSA private key: {}", e)))?;
        Ok(Self::new(key_id, private_key))
    }

    /// The API key id.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign `timestamp + method + path`, returning base64.
    pub fn sign(&self, timestamp_ms: &str, method: &str, path: &str) -> String {
        let start = Instant::now();
        let message = format!("{}{}{}", timestamp_ms, method, signing_path(path));
        let signature = self
            .signing_key
            .sign_with_rng(&mut rand::thread_rng(), message.as_bytes());
        metrics::record_signing_latency(start);
        STANDARD.encode(signature.to_bytes())
    }

    /// Build the authentication headers for a request.
    pub fn auth_headers(&self, method: &str, path: &str) -> Vec<(&'static str, String)> {
        let timestamp = timestamp_ms();
        let signature = self.sign(&timestamp, method, path);
        debug!(method, path, "Signed request");
        vec![
            (HEADER_KEY, self.key_id.clone()),
            (HEADER_TIMESTAMP, timestamp),
            (HEADER_SIGNATURE, signature),
        ]
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn timestamp_ms() -> String {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).to_string()
}

/// Path portion that is signed (query string removed).
pub fn signing_path(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::pss::{Signature, VerifyingKey};
    use rsa::signature::Verifier;

    fn test_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("key generation")
    }

    #[test]
    fn signing_path_strips_query() {
        assert_eq!(
            signing_path("/trade-api/v2/portfolio/orders?ticker=X&status=resting"),
            "/trade-api/v2/portfolio/orders"
        );
        assert_eq!(signing_path("/trade-api/v2/markets"), "/trade-api/v2/markets");
    }

    #[test]
    fn signature_verifies_with_public_key() {
        let key = test_key();
        let verifying_key = VerifyingKey::<Sha256>::new(key.to_public_key());
        let signer = KalshiSigner::new("key-id", key);

        let encoded = signer.sign("1700000000000", "GET", "/trade-api/v2/portfolio/balance?x=1");
        let bytes = STANDARD.decode(encoded).unwrap();
        let signature = Signature::try_from(bytes.as_slice()).unwrap();

        let message = b"1700000000000GET/trade-api/v2/portfolio/balance";
        assert!(verifying_key.verify(message, &signature).is_ok());
    }

    #[test]
    fn from_pem_accepts_pkcs8() {
        let pem = test_key().to_pkcs8_pem(LineEnding::LF).unwrap();
        let signer = KalshiSigner::from_pem("key-id", &pem).unwrap();
        assert_eq!(signer.key_id(), "key-id");
    }

    #[test]
    fn from_pem_rejects_garbage() {
        assert!(KalshiSigner::from_pem("key-id", "not a pem").is_err());
    }

    #[test]
    fn auth_headers_are_complete() {
        let signer = KalshiSigner::new("key-id", test_key());
        let headers = signer.auth_headers("POST", "/trade-api/v2/portfolio/orders");

        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![HEADER_KEY, HEADER_TIMESTAMP, HEADER_SIGNATURE]);
        assert_eq!(headers[0].1, "key-id");
        assert!(headers[1].1.parse::<i64>().is_ok());
    }

    #[test]
    fn debug_hides_key_material() {
        let signer = KalshiSigner::new("key-id", test_key());
        let rendered = format!("{:?}", signer);
        assert!(rendered.contains("key-id"));
        assert!(!rendered.contains("signing_key"));
    }
}
