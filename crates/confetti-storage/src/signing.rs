use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signed URL has expired")]
    Expired,
    #[error("signature does not match")]
    Invalid,
}

#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks time-limited media URLs of the form
/// `{base}/media/{path}?expires={unix}&signature={b64url(hmac)}`.
#[derive(Clone)]
pub struct UrlSigner {
    keyed: HmacSha256,
    base_url: String,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(secret: &[u8], base_url: impl Into<String>, ttl_secs: i64) -> anyhow::Result<Self> {
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
        Ok(Self {
            keyed,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl: Duration::seconds(ttl_secs),
        })
    }

    pub fn sign(&self, path: &str) -> SignedUrl {
        self.sign_at(path, Utc::now())
    }

    pub fn sign_at(&self, path: &str, now: DateTime<Utc>) -> SignedUrl {
        let expires_at = now + self.ttl;
        let expires = expires_at.timestamp();
        let signature = URL_SAFE_NO_PAD.encode(self.mac(path, expires).finalize().into_bytes());
        SignedUrl {
            url: format!(
                "{}/media/{}?expires={}&signature={}",
                self.base_url, path, expires, signature
            ),
            expires_at,
        }
    }

    pub fn verify(&self, path: &str, expires: i64, signature: &str) -> Result<(), SignatureError> {
        self.verify_at(path, expires, signature, Utc::now())
    }

    pub fn verify_at(
        &self,
        path: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Invalid)?;
        self.mac(path, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Invalid)?;
        if now.timestamp() > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(b"media\n");
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}
