//! 系统库后端（libcrypto，通过 `openssl` crate）

use super::provider::{Capabilities, CryptoProvider, CRYPTO_HASH_SIZE};
use crate::error::{Error, ErrorKind, Result};
use openssl::{hash::MessageDigest, pkey::PKey, sign::Signer};

/// 委托给系统 libcrypto 的实现
///
/// libcrypto 只提供 64 字节输出的 BLAKE2b，无法设置 32 字节的输出长度参数，
/// 所以 BLAKE2b 不在能力集中，由内置后端补齐。
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslProvider;

fn openssl_error(e: openssl::error::ErrorStack) -> Error {
    log::error!("[CRYPTO] libcrypto failure: {}", e);
    Error::new(ErrorKind::Resource, "libcrypto operation failed")
}

impl CryptoProvider for OpenSslProvider {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SHA256 | Capabilities::HMAC_SHA256
    }

    fn sha256(&self, buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        Ok(openssl::sha::sha256(buf))
    }

    fn blake2b_256(&self, _buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "BLAKE2b-256 is not provided by libcrypto",
        ))
    }

    fn hmac_sha256(&self, key: &[u8], buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        let pkey = PKey::hmac(key).map_err(openssl_error)?;
        let mut signer = Signer::new(MessageDigest::sha256(), &pkey).map_err(openssl_error)?;
        signer.update(buf).map_err(openssl_error)?;
        let mac = signer.sign_to_vec().map_err(openssl_error)?;

        let mut out = [0u8; CRYPTO_HASH_SIZE];
        if mac.len() != CRYPTO_HASH_SIZE {
            return Err(Error::new(ErrorKind::Resource, "unexpected HMAC length from libcrypto"));
        }
        out.copy_from_slice(&mac);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{BuiltinProvider, ChecksumAlgorithm, Checksummer};
    use alloc::vec::Vec;

    fn inputs() -> Vec<Vec<u8>> {
        let mut v = Vec::new();
        v.push(Vec::new());
        v.push(b"abc".to_vec());
        v.push((0..4096u32).map(|i| (i * 7 % 256) as u8).collect());
        v.push(alloc::vec![0xffu8; 1000]);
        v
    }

    #[test]
    fn test_sha256_matches_builtin() {
        for input in inputs() {
            assert_eq!(
                OpenSslProvider.sha256(&input).unwrap(),
                BuiltinProvider.sha256(&input).unwrap()
            );
        }
    }

    #[test]
    fn test_hmac_matches_builtin() {
        for key in [&b"k"[..], b"filesystem-auth-key", &[0x5au8; 100][..]] {
            for input in inputs() {
                assert_eq!(
                    OpenSslProvider.hmac_sha256(key, &input).unwrap(),
                    BuiltinProvider.hmac_sha256(key, &input).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_blake2b_has_no_libcrypto_implementation() {
        assert!(!OpenSslProvider.capabilities().contains(Capabilities::BLAKE2B));
        assert_eq!(
            OpenSslProvider.blake2b_256(b"abc").unwrap_err().kind(),
            ErrorKind::Unsupported
        );

        // Checksummer 把 BLAKE2b 交给内置后端
        let summer = Checksummer::with_provider(ChecksumAlgorithm::Blake2b, OpenSslProvider, None).unwrap();
        for input in inputs() {
            assert_eq!(summer.compute(&input).unwrap(), BuiltinProvider.blake2b_256(&input).unwrap());
        }
    }
}
