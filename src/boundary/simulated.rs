// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Software stand-in for the trusted boundary.
//!
//! Implements the same contract as the enclave build: the master secret and
//! secret nonces leave only as AES-256-GCM ciphertext under an instance
//! sealing key, per-statechain keys are derived from the master secret, and
//! the partial signature is the Schnorr response `s = k + e * x` with
//! `e = H(R || P || m)`.
//!
//! A sealed blob opens only under the sealing key that produced it, which
//! mirrors enclave sealing: restart with the same key to reopen a stored
//! master secret.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::group::GroupEncoding;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, ProjectivePoint, Scalar, U256};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{
    BoundaryError, BoundaryHandle, BoundaryResult, PartialSignature, PublicKey, PublicNonce,
    SealedBlob, SealedNonce, SealedShare, TrustedBoundary,
};

const MASTER_SECRET_LEN: usize = 32;
const GCM_NONCE_LEN: usize = 12;

const MASTER_AAD: &[u8] = b"statechain/master-secret/v1";
const NONCE_AAD: &[u8] = b"statechain/secret-nonce/v1";
const SHARE_AAD: &[u8] = b"statechain/recovery-share/v1";
const KEY_LABEL: &[u8] = b"statechain/derive-key/v1";
const CHALLENGE_LABEL: &[u8] = b"statechain/challenge/v1";

/// In-process boundary with enclave-equivalent sealing semantics.
pub struct SimulatedBoundary {
    cipher: Aes256Gcm,
    live: Mutex<Option<BoundaryHandle>>,
    next_handle: AtomicU64,
}

impl SimulatedBoundary {
    /// Create a boundary sealing under `sealing_key`.
    pub fn new(sealing_key: [u8; 32]) -> Self {
        let sealing_key = Zeroizing::new(sealing_key);
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&sealing_key[..])),
            live: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Create a boundary with a fresh random sealing key.
    ///
    /// Secrets sealed by it cannot be reopened after the process exits.
    pub fn ephemeral() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut key[..]);
        Self::new(*key)
    }

    fn check_handle(&self, handle: BoundaryHandle) -> BoundaryResult<()> {
        let live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        match *live {
            Some(current) if current == handle => Ok(()),
            Some(_) => Err(BoundaryError::InvalidHandle(handle)),
            None => Err(BoundaryError::NotInitialized),
        }
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> BoundaryResult<Vec<u8>> {
        let mut iv = [0u8; GCM_NONCE_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad })
            .map_err(|e| BoundaryError::CallFailed {
                operation: "seal",
                reason: e.to_string(),
            })?;

        let mut sealed = Vec::with_capacity(GCM_NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&iv);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn unseal(&self, sealed: &[u8], aad: &[u8]) -> BoundaryResult<Zeroizing<Vec<u8>>> {
        if sealed.len() <= GCM_NONCE_LEN {
            return Err(BoundaryError::Unseal("sealed blob too short".to_string()));
        }
        let (iv, ciphertext) = sealed.split_at(GCM_NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(iv), Payload { msg: ciphertext, aad })
            .map(Zeroizing::new)
            .map_err(|_| BoundaryError::Unseal("authentication failed".to_string()))
    }

    fn open_master(&self, master: &SealedBlob) -> BoundaryResult<Zeroizing<Vec<u8>>> {
        let secret = self.unseal(master.as_bytes(), MASTER_AAD)?;
        if secret.len() != MASTER_SECRET_LEN {
            return Err(BoundaryError::Unseal(format!(
                "master secret has {} bytes, expected {MASTER_SECRET_LEN}",
                secret.len()
            )));
        }
        Ok(secret)
    }
}

/// Associated data binding a sealed share to its index.
fn share_aad(index: u8) -> Vec<u8> {
    let mut aad = SHARE_AAD.to_vec();
    aad.push(index);
    aad
}

/// Parse a canonical, non-zero scalar.
fn share_scalar(bytes: &[u8]) -> BoundaryResult<Scalar> {
    if bytes.len() != 32 {
        return Err(BoundaryError::InvalidInput(format!(
            "share has {} bytes, expected 32",
            bytes.len()
        )));
    }
    let scalar: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(bytes)).into();
    match scalar {
        Some(scalar) if !bool::from(scalar.is_zero()) => Ok(scalar),
        _ => Err(BoundaryError::InvalidInput(
            "share is not a valid non-zero scalar".to_string(),
        )),
    }
}

/// Lagrange interpolation of the shares' polynomial at x = 0.
fn interpolate_at_zero(points: &[(u8, Scalar)]) -> BoundaryResult<Scalar> {
    let mut secret = Scalar::ZERO;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let xi = Scalar::from(u64::from(xi));
        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let xj = Scalar::from(u64::from(xj));
            numerator *= xj;
            denominator *= xj - xi;
        }
        let inverse: Option<Scalar> = denominator.invert().into();
        let inverse = inverse.ok_or_else(|| {
            BoundaryError::InvalidInput("share indices must be distinct".to_string())
        })?;
        secret += yi * numerator * inverse;
    }
    Ok(secret)
}

/// Associated data binding a sealed nonce to its statechain and key context.
fn nonce_aad(statechain_id: &str, context: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(NONCE_AAD.len() + 8 + statechain_id.len() + context.len());
    aad.extend_from_slice(NONCE_AAD);
    aad.extend_from_slice(&(statechain_id.len() as u64).to_be_bytes());
    aad.extend_from_slice(statechain_id.as_bytes());
    aad.extend_from_slice(context);
    aad
}

fn derive_scalar(master: &[u8], statechain_id: &str, context: &[u8]) -> BoundaryResult<Scalar> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(master).map_err(|e| {
        BoundaryError::CallFailed {
            operation: "derive_key",
            reason: e.to_string(),
        }
    })?;
    mac.update(KEY_LABEL);
    mac.update(&(statechain_id.len() as u64).to_be_bytes());
    mac.update(statechain_id.as_bytes());
    mac.update(context);
    let digest = mac.finalize().into_bytes();

    let scalar = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&digest));
    if scalar == Scalar::ZERO {
        return Err(BoundaryError::CallFailed {
            operation: "derive_key",
            reason: "derived scalar is zero".to_string(),
        });
    }
    Ok(scalar)
}

/// Schnorr challenge `e = H(label || R || P || m)` reduced mod n.
pub(crate) fn challenge(public_nonce: &[u8], public_key: &[u8], message: &[u8]) -> Scalar {
    let digest = Sha256::new()
        .chain_update(CHALLENGE_LABEL)
        .chain_update(public_nonce)
        .chain_update(public_key)
        .chain_update(message)
        .finalize();
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&digest))
}

fn compressed(point: ProjectivePoint) -> Vec<u8> {
    point.to_bytes().to_vec()
}

impl TrustedBoundary for SimulatedBoundary {
    fn create_instance(&self) -> BoundaryResult<BoundaryHandle> {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if live.is_some() {
            return Err(BoundaryError::InitFailed(
                "an instance is already running".to_string(),
            ));
        }
        let handle = BoundaryHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        *live = Some(handle);
        Ok(handle)
    }

    fn destroy_instance(&self, handle: BoundaryHandle) -> BoundaryResult<()> {
        self.check_handle(handle)?;
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        *live = None;
        Ok(())
    }

    fn generate_master_secret(&self, handle: BoundaryHandle) -> BoundaryResult<SealedBlob> {
        self.check_handle(handle)?;
        let mut secret = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
        OsRng.fill_bytes(&mut secret[..]);
        self.seal(&secret[..], MASTER_AAD).map(SealedBlob::new)
    }

    fn derive_key(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<PublicKey> {
        self.check_handle(handle)?;
        let secret = self.open_master(master)?;
        let x = derive_scalar(&secret, statechain_id, context)?;
        Ok(PublicKey::from_bytes(compressed(ProjectivePoint::GENERATOR * x)))
    }

    fn generate_nonce(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
    ) -> BoundaryResult<(PublicNonce, SealedNonce)> {
        self.check_handle(handle)?;
        // The key must be derivable before a nonce is committed to it.
        let secret = self.open_master(master)?;
        derive_scalar(&secret, statechain_id, context)?;

        let k = NonZeroScalar::random(&mut OsRng);
        let k: Scalar = *k;
        let public_nonce = compressed(ProjectivePoint::GENERATOR * k);
        let secret_nonce = Zeroizing::new(k.to_bytes().to_vec());
        let sealed = self.seal(&secret_nonce, &nonce_aad(statechain_id, context))?;

        Ok((
            PublicNonce::from_bytes(public_nonce),
            SealedNonce::new(sealed),
        ))
    }

    fn seal_share(
        &self,
        handle: BoundaryHandle,
        index: u8,
        share: &[u8],
    ) -> BoundaryResult<SealedShare> {
        self.check_handle(handle)?;
        if index == 0 {
            return Err(BoundaryError::InvalidInput(
                "share index must be non-zero".to_string(),
            ));
        }
        share_scalar(share)?;
        let sealed = self.seal(share, &share_aad(index))?;
        Ok(SealedShare::new(index, sealed))
    }

    fn recover_master_secret(
        &self,
        handle: BoundaryHandle,
        shares: &[SealedShare],
    ) -> BoundaryResult<SealedBlob> {
        self.check_handle(handle)?;
        if shares.is_empty() {
            return Err(BoundaryError::InvalidInput("no shares".to_string()));
        }

        let mut points = Vec::with_capacity(shares.len());
        for share in shares {
            let value = self.unseal(share.as_bytes(), &share_aad(share.index()))?;
            points.push((share.index(), share_scalar(&value)?));
        }

        let secret = interpolate_at_zero(&points)?;
        if bool::from(secret.is_zero()) {
            return Err(BoundaryError::CallFailed {
                operation: "recover_master_secret",
                reason: "recovered secret is zero".to_string(),
            });
        }
        let secret = Zeroizing::new(secret.to_bytes().to_vec());
        self.seal(&secret, MASTER_AAD).map(SealedBlob::new)
    }

    fn partial_sign(
        &self,
        handle: BoundaryHandle,
        master: &SealedBlob,
        statechain_id: &str,
        context: &[u8],
        message: &[u8],
        nonce: &SealedNonce,
    ) -> BoundaryResult<PartialSignature> {
        self.check_handle(handle)?;
        let secret = self.open_master(master)?;
        let x = derive_scalar(&secret, statechain_id, context)?;

        let k_bytes = self.unseal(nonce.as_bytes(), &nonce_aad(statechain_id, context))?;
        if k_bytes.len() != 32 {
            return Err(BoundaryError::InvalidInput(
                "sealed nonce has wrong length".to_string(),
            ));
        }
        let k = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(&k_bytes));

        let public_nonce = compressed(ProjectivePoint::GENERATOR * k);
        let public_key = compressed(ProjectivePoint::GENERATOR * x);
        let e = challenge(&public_nonce, &public_key, message);
        let s = k + e * x;

        Ok(PartialSignature::from_bytes(s.to_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary_with_master() -> (SimulatedBoundary, BoundaryHandle, SealedBlob) {
        let boundary = SimulatedBoundary::new([42u8; 32]);
        let handle = boundary.create_instance().unwrap();
        let master = boundary.generate_master_secret(handle).unwrap();
        (boundary, handle, master)
    }

    fn point(bytes: &[u8]) -> ProjectivePoint {
        k256::PublicKey::from_sec1_bytes(bytes)
            .unwrap()
            .to_projective()
    }

    #[test]
    fn derive_key_is_deterministic_per_statechain_and_context() {
        let (boundary, handle, master) = boundary_with_master();

        let a1 = boundary.derive_key(handle, &master, "abc", b"").unwrap();
        let a2 = boundary.derive_key(handle, &master, "abc", b"").unwrap();
        let b = boundary.derive_key(handle, &master, "def", b"").unwrap();
        let rotated = boundary.derive_key(handle, &master, "abc", b"new-owner").unwrap();

        assert_eq!(a1, a2);
        assert_eq!(a1.as_bytes().len(), 33);
        assert_ne!(a1, b);
        assert_ne!(a1, rotated);
    }

    #[test]
    fn partial_signature_satisfies_schnorr_equation() {
        let (boundary, handle, master) = boundary_with_master();
        let message = b"sighash of the backup transaction";

        let key = boundary.derive_key(handle, &master, "abc", b"").unwrap();
        let (public_nonce, sealed_nonce) =
            boundary.generate_nonce(handle, &master, "abc", b"").unwrap();
        let sig = boundary
            .partial_sign(handle, &master, "abc", b"", message, &sealed_nonce)
            .unwrap();

        let s = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(
            sig.as_bytes(),
        ));
        let e = challenge(public_nonce.as_bytes(), key.as_bytes(), message);
        let lhs = ProjectivePoint::GENERATOR * s;
        let rhs = point(public_nonce.as_bytes()) + point(key.as_bytes()) * e;
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn sealed_nonce_is_bound_to_statechain_and_context() {
        let (boundary, handle, master) = boundary_with_master();
        boundary.derive_key(handle, &master, "other", b"").unwrap();
        let (_, sealed_nonce) = boundary.generate_nonce(handle, &master, "abc", b"").unwrap();

        let wrong_chain = boundary.partial_sign(handle, &master, "other", b"", b"m", &sealed_nonce);
        assert!(matches!(wrong_chain, Err(BoundaryError::Unseal(_))));

        let wrong_context =
            boundary.partial_sign(handle, &master, "abc", b"rotated", b"m", &sealed_nonce);
        assert!(matches!(wrong_context, Err(BoundaryError::Unseal(_))));
    }

    #[test]
    fn master_secret_only_opens_under_its_sealing_key() {
        let (_, _, master) = boundary_with_master();

        let same_key = SimulatedBoundary::new([42u8; 32]);
        let h = same_key.create_instance().unwrap();
        assert!(same_key.derive_key(h, &master, "abc", b"").is_ok());

        let other = SimulatedBoundary::new([9u8; 32]);
        let h = other.create_instance().unwrap();
        let result = other.derive_key(h, &master, "abc", b"");
        assert!(matches!(result, Err(BoundaryError::Unseal(_))));
    }

    #[test]
    fn stale_handle_is_rejected() {
        let boundary = SimulatedBoundary::ephemeral();
        let first = boundary.create_instance().unwrap();
        assert!(matches!(
            boundary.create_instance(),
            Err(BoundaryError::InitFailed(_))
        ));

        boundary.destroy_instance(first).unwrap();
        assert!(matches!(
            boundary.generate_master_secret(first),
            Err(BoundaryError::NotInitialized)
        ));

        let second = boundary.create_instance().unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            boundary.generate_master_secret(first),
            Err(BoundaryError::InvalidHandle(_))
        ));
    }

    fn shares_of(secret: Scalar, slope: Scalar, indices: &[u8]) -> Vec<(u8, Vec<u8>)> {
        indices
            .iter()
            .map(|&i| {
                let y = secret + slope * Scalar::from(u64::from(i));
                (i, y.to_bytes().to_vec())
            })
            .collect()
    }

    #[test]
    fn any_threshold_subset_recovers_the_master_secret() {
        let boundary = SimulatedBoundary::new([7u8; 32]);
        let handle = boundary.create_instance().unwrap();

        let secret: Scalar = *NonZeroScalar::random(&mut OsRng);
        let slope: Scalar = *NonZeroScalar::random(&mut OsRng);
        let shares = shares_of(secret, slope, &[1, 2, 3]);

        for subset in [[0usize, 1], [1, 2], [0, 2]] {
            let sealed: Vec<SealedShare> = subset
                .iter()
                .map(|&k| {
                    let (index, value) = &shares[k];
                    boundary.seal_share(handle, *index, value).unwrap()
                })
                .collect();

            let master = boundary.recover_master_secret(handle, &sealed).unwrap();
            let opened = boundary.open_master(&master).unwrap();
            assert_eq!(opened.as_slice(), secret.to_bytes().as_slice());
        }
    }

    #[test]
    fn share_sealing_rejects_bad_input() {
        let boundary = SimulatedBoundary::new([7u8; 32]);
        let handle = boundary.create_instance().unwrap();

        assert!(matches!(
            boundary.seal_share(handle, 0, &[1u8; 32]),
            Err(BoundaryError::InvalidInput(_))
        ));
        assert!(matches!(
            boundary.seal_share(handle, 1, &[1u8; 16]),
            Err(BoundaryError::InvalidInput(_))
        ));
        // Above the group order.
        assert!(matches!(
            boundary.seal_share(handle, 1, &[0xffu8; 32]),
            Err(BoundaryError::InvalidInput(_))
        ));
    }

    #[test]
    fn sealed_share_is_bound_to_its_index() {
        let boundary = SimulatedBoundary::new([7u8; 32]);
        let handle = boundary.create_instance().unwrap();
        let sealed = boundary.seal_share(handle, 1, &[1u8; 32]).unwrap();

        let relabeled = SealedShare::new(2, sealed.as_bytes().to_vec());
        assert!(matches!(
            boundary.recover_master_secret(handle, &[relabeled]),
            Err(BoundaryError::Unseal(_))
        ));
    }
}
