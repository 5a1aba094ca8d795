use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public half of an identity as it travels on the wire: the membership
/// provider it belongs to and its certificate bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedIdentity {
    pub msp_id: String,
    pub certificate: Vec<u8>,
}

impl SerializedIdentity {
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <&[u8; 32]>::try_from(self.certificate.as_slice()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <&[u8; 64]>::try_from(signature) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(sig_bytes)).is_ok()
    }
}

/// Signing material backing an identity.
#[derive(Clone)]
pub struct Credential {
    certificate: Vec<u8>,
    signing_key: SigningKey,
}

impl Credential {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let certificate = signing_key.verifying_key().to_bytes().to_vec();
        Self {
            certificate,
            signing_key,
        }
    }

    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("certificate", &hex::encode(&self.certificate))
            .finish_non_exhaustive()
    }
}

/// A named participant able to sign requests for one organization.
#[derive(Debug, Clone)]
pub struct Identity {
    label: String,
    msp_id: String,
    credential: Credential,
}

impl Identity {
    pub fn new(label: impl Into<String>, msp_id: impl Into<String>, credential: Credential) -> Self {
        Self {
            label: label.into(),
            msp_id: msp_id.into(),
            credential,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn certificate(&self) -> &[u8] {
        self.credential.certificate()
    }

    pub fn serialized(&self) -> SerializedIdentity {
        SerializedIdentity {
            msp_id: self.msp_id.clone(),
            certificate: self.credential.certificate().to_vec(),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.credential.sign(message)
    }
}
