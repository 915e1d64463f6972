// CSRF tokens bound to the portal session token

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derives and checks `hex(HMAC-SHA256(secret, session_token))`
#[derive(Clone)]
pub struct CsrfKeys {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CsrfKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfKeys").finish_non_exhaustive()
    }
}

impl CsrfKeys {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Per-process secret for deployments that do not configure one
    pub fn generate() -> Self {
        let secret: [u8; 32] = rand::rng().random();
        Self::new(secret)
    }

    fn mac(&self, session_token: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(session_token.as_bytes());
        Some(mac)
    }

    pub fn token_for(&self, session_token: &str) -> String {
        self.mac(session_token)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time comparison of a submitted token
    pub fn verify(&self, session_token: &str, submitted: &str) -> bool {
        let Ok(raw) = hex::decode(submitted.trim()) else {
            return false;
        };
        match self.mac(session_token) {
            Some(mac) => mac.verify_slice(&raw).is_ok(),
            None => false,
        }
    }
}
