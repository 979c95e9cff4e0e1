// crates/form-engine-core/src/runtime/signer.rs
// ============================================================================
// Module: Ed25519 State Signer
// Description: Detached-signature integrity for state snapshots.
// Purpose: Sign outbound snapshots and reject tampered inbound ones.
// Dependencies: crate::interfaces, base64, ed25519-dalek
// ============================================================================

//! ## Overview
//! The signed blob is `base64url(payload) "." base64url(signature)` without
//! padding, so it fits in a hidden form field. Verification uses
//! `verify_strict` and fails closed on any decoding problem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;

use crate::interfaces::SignedState;
use crate::interfaces::SigningError;
use crate::interfaces::StateSigner;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between payload and signature.
const BLOB_SEPARATOR: char = '.';

/// Length of an ed25519 seed in bytes.
pub const SEED_LENGTH: usize = 32;

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Ed25519 signer over snapshot bytes.
#[derive(Clone)]
pub struct Ed25519StateSigner {
    /// Private key used for signing.
    signing_key: SigningKey,
    /// Public key used for verification.
    verifying_key: VerifyingKey,
}

impl Ed25519StateSigner {
    /// Creates a signer from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Creates a signer from raw seed bytes or their base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Key`] unless the input yields exactly 32 bytes.
    pub fn from_key_material(material: &[u8]) -> Result<Self, SigningError> {
        if let Ok(seed) = <[u8; SEED_LENGTH]>::try_from(material) {
            return Ok(Self::from_seed(&seed));
        }
        let text = std::str::from_utf8(material)
            .map_err(|_| SigningError::Key("key material is neither raw nor base64".to_string()))?;
        let decoded = BASE64
            .decode(text.trim().as_bytes())
            .map_err(|_| SigningError::Key("key material is not valid base64".to_string()))?;
        let seed = <[u8; SEED_LENGTH]>::try_from(decoded.as_slice())
            .map_err(|_| SigningError::Key(format!("key seed must be {SEED_LENGTH} bytes")))?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public verification key.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}

impl fmt::Debug for Ed25519StateSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519StateSigner")
            .field("verifying_key", &URL_SAFE_NO_PAD.encode(self.verifying_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

impl StateSigner for Ed25519StateSigner {
    fn sign(&self, payload: &[u8]) -> Result<SignedState, SigningError> {
        let signature = self.signing_key.sign(payload);
        let blob = format!(
            "{}{BLOB_SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        );
        Ok(SignedState::new(blob))
    }

    fn verify(&self, signed: &SignedState) -> Result<Vec<u8>, SigningError> {
        let (payload, signature) = signed
            .as_str()
            .split_once(BLOB_SEPARATOR)
            .ok_or_else(|| SigningError::Encoding("missing signature separator".to_string()))?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|err| SigningError::Encoding(format!("payload: {err}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|err| SigningError::Encoding(format!("signature: {err}")))?;
        let signature = Signature::try_from(signature.as_slice())
            .map_err(|_| SigningError::Encoding("invalid signature bytes".to_string()))?;
        self.verifying_key
            .verify_strict(&payload, &signature)
            .map_err(|_| SigningError::InvalidSignature)?;
        Ok(payload)
    }
}
