//! Daraja request credentials.
//!
//! Two secrets travel in request bodies:
//!
//! - the STK push `Password`, `base64(short_code + passkey + timestamp)`, where the
//!   timestamp is East Africa Time formatted `YYYYMMDDHHMMSS`;
//! - the initiator `SecurityCredential`, the initiator password encrypted with
//!   RSA PKCS#1 v1.5 under the environment's public certificate, base64-encoded.

use chrono::{DateTime, TimeDelta, Utc};
use pesa_types::util::b64;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid X.509 certificate: {0}")]
    Certificate(String),
    #[error("invalid RSA public key: {0}")]
    PublicKey(String),
    #[error("failed to encrypt initiator password: {0}")]
    Encrypt(#[from] rsa::Error),
}

/// Encrypts initiator passwords for one Daraja environment.
#[derive(Debug, Clone)]
pub struct CredentialEncryptor {
    key: RsaPublicKey,
}

impl CredentialEncryptor {
    /// Accepts a PEM X.509 certificate, a PEM SubjectPublicKeyInfo, or a PEM
    /// PKCS#1 RSA public key.
    pub fn from_pem(pem: &str) -> Result<Self, CredentialError> {
        let key = if pem.contains("BEGIN CERTIFICATE") {
            let certificate = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| CredentialError::Certificate(e.to_string()))?;
            let spki = certificate
                .tbs_certificate
                .subject_public_key_info
                .to_der()
                .map_err(|e| CredentialError::Certificate(e.to_string()))?;
            RsaPublicKey::from_public_key_der(&spki)
                .map_err(|e| CredentialError::PublicKey(e.to_string()))?
        } else if pem.contains("BEGIN RSA PUBLIC KEY") {
            RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| CredentialError::PublicKey(e.to_string()))?
        } else {
            RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| CredentialError::PublicKey(e.to_string()))?
        };
        Ok(Self { key })
    }

    pub fn encrypt(&self, initiator_password: &str) -> Result<String, CredentialError> {
        let mut rng = rsa::rand_core::OsRng;
        let encrypted = self
            .key
            .encrypt(&mut rng, Pkcs1v15Encrypt, initiator_password.as_bytes())?;
        Ok(b64::encode(encrypted))
    }
}

/// `YYYYMMDDHHMMSS` in East Africa Time (UTC+3, no DST).
pub fn timestamp(now: DateTime<Utc>) -> String {
    (now + TimeDelta::hours(3)).format("%Y%m%d%H%M%S").to_string()
}

/// The STK push `Password`: base64 of short code, passkey and timestamp concatenated.
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    b64::encode(format!("{short_code}{passkey}{timestamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};

    #[test]
    fn timestamp_is_east_africa_time() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 22, 15, 9).unwrap();
        assert_eq!(timestamp(now), "20250101011509");
    }

    #[test]
    fn stk_password_concatenates_and_encodes() {
        let password = stk_password("174379", "passkey", "20250101011509");
        let decoded = b64::decode(&password).unwrap();
        assert_eq!(decoded, b"174379passkey20250101011509");
    }

    #[test]
    fn security_credential_decrypts_to_initiator_password() {
        let mut rng = rsa::rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let encryptor = CredentialEncryptor::from_pem(&pem).unwrap();
        let credential = encryptor.encrypt("Safaricom999!*!").unwrap();

        let ciphertext = b64::decode(&credential).unwrap();
        let plain = private.decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap();
        assert_eq!(plain, b"Safaricom999!*!");
    }

    #[test]
    fn rejects_garbage_pem() {
        assert!(matches!(
            CredentialEncryptor::from_pem("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"),
            Err(CredentialError::Certificate(_))
        ));
        assert!(CredentialEncryptor::from_pem("not a key").is_err());
    }
}
