//! 内置后端（纯 Rust，RustCrypto）

use super::provider::{Capabilities, CryptoProvider, CRYPTO_HASH_SIZE};
use crate::error::{Error, ErrorKind, Result};
use blake2::{digest::consts::U32, Blake2b};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type Blake2b256 = Blake2b<U32>;
type HmacSha256 = Hmac<Sha256>;

/// 自包含的内置实现，不依赖系统库
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl CryptoProvider for BuiltinProvider {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn sha256(&self, buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        Ok(Sha256::digest(buf).into())
    }

    fn blake2b_256(&self, buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        Ok(Blake2b256::digest(buf).into())
    }

    fn hmac_sha256(&self, key: &[u8], buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| Error::new(ErrorKind::InvalidKey, "invalid HMAC key length"))?;
        mac.update(buf);
        Ok(mac.finalize().into_bytes().into())
    }
}
