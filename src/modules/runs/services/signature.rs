use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of a step callback body
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Signs and verifies step callbacks with the shared automation secret
#[derive(Clone)]
pub struct CallbackSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CallbackSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSigner").finish_non_exhaustive()
    }
}

impl CallbackSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    /// Hex encoded signature of `body`
    pub fn sign(&self, body: &[u8]) -> String {
        match self.mac() {
            Some(mut mac) => {
                mac.update(body);
                hex::encode(mac.finalize().into_bytes())
            }
            None => String::new(),
        }
    }

    /// Constant-time check of a hex signature against `body`
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Some(mut mac) = self.mac() else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}
