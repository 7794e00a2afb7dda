use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed key material")]
    Malformed,
}

/// A long-lived Ed25519 keypair. `public_key_b64` is the stable identity
/// used on the wire and in storage throughout Glyph.
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Loads an identity from `path` if it exists, otherwise generates one
    /// and persists it with owner-only permissions. The file holds a single
    /// line: base64 of the 32-byte secret scalar.
    pub fn load_or_create(path: &Path) -> Result<Self, CryptoError> {
        if path.exists() {
            let line = fs::read_to_string(path)?;
            return Self::from_secret_b64(line.trim());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let identity = Self::generate();
        fs::write(path, format!("{}\n", identity.secret_key_b64()))?;
        set_owner_only(path)?;
        Ok(identity)
    }

    pub fn from_secret_b64(sk_b64: &str) -> Result<Self, CryptoError> {
        let bytes = B64.decode(sk_b64)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::Malformed)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&arr),
        })
    }

    pub fn secret_key_b64(&self) -> String {
        B64.encode(self.signing_key.to_bytes())
    }

    pub fn public_key_b64(&self) -> String {
        B64.encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> String {
        let sig: Signature = self.signing_key.sign(message);
        B64.encode(sig.to_bytes())
    }
}

/// Derives the base64 public key from a base64-encoded secret key, without
/// retaining the identity.
pub fn public_from_secret(sk_b64: &str) -> Result<String, CryptoError> {
    Ok(Identity::from_secret_b64(sk_b64)?.public_key_b64())
}

pub fn verify(pk_b64: &str, message: &[u8], sig_b64: &str) -> bool {
    let Ok(pk_bytes) = B64.decode(pk_b64) else {
        return false;
    };
    let Ok(pk_arr): Result<[u8; 32], _> = pk_bytes.try_into() else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(&pk_arr) else {
        return false;
    };
    let Ok(sig_bytes) = B64.decode(sig_b64) else {
        return false;
    };
    let Ok(sig_arr): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_arr);
    vk.verify(message, &sig).is_ok()
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), CryptoError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), CryptoError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let id = Identity::generate();
        let msg = b"hello glyph";
        let sig = id.sign(msg);
        assert!(verify(&id.public_key_b64(), msg, &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let id = Identity::generate();
        let sig = id.sign(b"original");
        assert!(!verify(&id.public_key_b64(), b"tampered", &sig));
    }

    #[test]
    fn load_or_create_persists_and_reloads_same_identity() {
        let dir = std::env::temp_dir().join(format!("glyph-crypto-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("identity.key");
        let first = Identity::load_or_create(&path).unwrap();
        let second = Identity::load_or_create(&path).unwrap();
        assert_eq!(first.public_key_b64(), second.public_key_b64());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn public_from_secret_matches_identity() {
        let id = Identity::generate();
        let derived = public_from_secret(&id.secret_key_b64()).unwrap();
        assert_eq!(derived, id.public_key_b64());
    }
}
