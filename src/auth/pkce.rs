use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;

/// PKCE verifier/challenge pair for the OAuth redirect flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(BASE64URL.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = BASE64URL.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }

    pub fn method(&self) -> &'static str {
        "s256"
    }
}
