//! Envelope construction, HMAC signing, and verification. The envelope is
//! the `.meta` sidecar persisted next to every block/version object; it is
//! what lets [`crate::transform::TransformPipeline`] be reconfigured over
//! time without breaking older objects.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use strata_proto::{Envelope, TransformRecord};

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// Builds and verifies envelopes, optionally keyed with an HMAC secret.
/// Storages configured without a key produce envelopes with `hmac: None`
/// and skip verification on read.
pub struct EnvelopeSigner {
    key: Option<Vec<u8>>,
}

impl EnvelopeSigner {
    pub fn new(key: Option<Vec<u8>>) -> Self {
        Self { key }
    }

    pub fn unkeyed() -> Self {
        Self { key: None }
    }

    pub fn build(
        &self,
        size: u64,
        object_size: u64,
        checksum: Option<String>,
        transforms: Vec<TransformRecord>,
    ) -> Result<Envelope, Error> {
        let mut envelope = Envelope::new(size, object_size, checksum).with_transforms(transforms);
        if let Some(key) = &self.key {
            envelope.hmac = Some(self.sign(&envelope, key)?);
        }
        Ok(envelope)
    }

    fn sign(&self, envelope: &Envelope, key: &[u8]) -> Result<String, Error> {
        let canonical = envelope.canonical_bytes_without_hmac()?;
        let mut mac =
            HmacSha256::new_from_slice(key).map_err(|e| Error::Transform(e.to_string()))?;
        mac.update(&canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify `envelope.hmac` against the configured key. A storage with no
    /// key configured treats every envelope as trusted, matching the
    /// upstream behavior of HMAC being opt-in per storage.
    pub fn verify(&self, envelope: &Envelope) -> Result<(), Error> {
        let Some(key) = &self.key else {
            return Ok(());
        };
        let expected = envelope
            .hmac
            .as_ref()
            .ok_or(Error::MissingEnvelopeField("hmac"))?;
        let computed = self.sign(envelope, key)?;
        if &computed != expected {
            return Err(Error::HmacMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unkeyed_signer_produces_no_hmac() {
        let signer = EnvelopeSigner::unkeyed();
        let env = signer.build(10, 10, None, vec![]).unwrap();
        assert!(env.hmac.is_none());
        assert!(signer.verify(&env).is_ok());
    }

    #[test]
    fn keyed_signer_round_trips() {
        let signer = EnvelopeSigner::new(Some(b"secret-key-material".to_vec()));
        let env = signer.build(10, 10, Some("sha256:abcd".into()), vec![]).unwrap();
        assert!(env.hmac.is_some());
        assert!(signer.verify(&env).is_ok());
    }

    #[test]
    fn tampered_envelope_fails_verification() {
        let signer = EnvelopeSigner::new(Some(b"secret-key-material".to_vec()));
        let mut env = signer.build(10, 10, None, vec![]).unwrap();
        env.size = 20;
        assert!(matches!(signer.verify(&env), Err(Error::HmacMismatch)));
    }

    #[test]
    fn missing_hmac_on_keyed_storage_is_an_error() {
        let signer = EnvelopeSigner::new(Some(b"secret-key-material".to_vec()));
        let env = Envelope::new(10, 10, None);
        assert!(matches!(
            signer.verify(&env),
            Err(Error::MissingEnvelopeField("hmac"))
        ));
    }
}
