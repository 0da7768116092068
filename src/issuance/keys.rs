use openssl::{
    pkey::{PKey, Private},
    rsa::Rsa,
};

use super::error::IssuanceError;

const ALLOWED_RSA_BITS: [u32; 3] = [2048, 3072, 4096];

fn generate_rsa(bits: u32) -> Result<PKey<Private>, IssuanceError> {
    if !ALLOWED_RSA_BITS.contains(&bits) {
        return Err(IssuanceError::InvalidArgument(format!(
            "Unsupported RSA key size {bits}. Allowed: 2048, 3072, 4096"
        )));
    }
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

fn load_pem(pem: &str) -> Result<PKey<Private>, IssuanceError> {
    PKey::private_key_from_pem(pem.as_bytes())
        .map_err(|e| IssuanceError::Key(format!("failed to parse private key PEM: {e}")))
}

fn serialize_pem(key: &PKey<Private>) -> Result<String, IssuanceError> {
    let pem = key
        .private_key_to_pem_pkcs8()
        .map_err(|e| IssuanceError::Key(format!("failed to serialize private key: {e}")))?;
    String::from_utf8(pem).map_err(|_| IssuanceError::Key("key PEM contained invalid UTF-8".into()))
}

/// RSA key pair that authenticates every request made for one CA account.
#[derive(Clone)]
pub struct AccountKeyPair {
    key: PKey<Private>,
}

impl AccountKeyPair {
    pub fn generate(bits: u32) -> Result<Self, IssuanceError> {
        Ok(Self {
            key: generate_rsa(bits)?,
        })
    }

    /// Loads an RSA private key. The account key must be RSA since request
    /// signing and the JWK thumbprint are both RS256/RSA-specific.
    pub fn from_pem(pem: &str) -> Result<Self, IssuanceError> {
        Self::from_pkey(load_pem(pem)?)
    }

    pub fn from_pkey(key: PKey<Private>) -> Result<Self, IssuanceError> {
        if key.rsa().is_err() {
            return Err(IssuanceError::Key(
                "account key must be an RSA key".to_string(),
            ));
        }
        Ok(Self { key })
    }

    pub fn to_pem(&self) -> Result<String, IssuanceError> {
        serialize_pem(&self.key)
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.key
    }

    /// Big-endian public modulus `n`.
    pub fn modulus(&self) -> Result<Vec<u8>, IssuanceError> {
        Ok(self.key.rsa()?.n().to_vec())
    }

    /// Big-endian public exponent `e`.
    pub fn public_exponent(&self) -> Result<Vec<u8>, IssuanceError> {
        Ok(self.key.rsa()?.e().to_vec())
    }
}

impl std::fmt::Debug for AccountKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeyPair")
            .field("bits", &self.key.bits())
            .finish_non_exhaustive()
    }
}

/// Key pair generated for one domain; only used for its CSR and certificate.
#[derive(Clone)]
pub struct DomainKeyPair {
    key: PKey<Private>,
}

impl DomainKeyPair {
    pub fn generate(bits: u32) -> Result<Self, IssuanceError> {
        Ok(Self {
            key: generate_rsa(bits)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, IssuanceError> {
        Ok(Self {
            key: load_pem(pem)?,
        })
    }

    pub fn from_pkey(key: PKey<Private>) -> Self {
        Self { key }
    }

    pub fn to_pem(&self) -> Result<String, IssuanceError> {
        serialize_pem(&self.key)
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.key
    }
}

impl std::fmt::Debug for DomainKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainKeyPair")
            .field("bits", &self.key.bits())
            .finish_non_exhaustive()
    }
}
