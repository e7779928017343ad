//! 校验和算法提供者
//!
//! 为文件系统可能使用的所有数据校验和算法提供统一的计算接口：
//!
//! | 算法 | 摘要长度 | 实现 |
//! |------|---------|------|
//! | CRC32C | 4（小端） | 内置 |
//! | XXHASH64 | 8（小端，种子 0） | 内置 |
//! | SHA-256 | 32 | 后端 |
//! | BLAKE2b | 32（输出长度参数 32） | 后端 |
//! | HMAC-SHA256 | 32（需要认证密钥） | 后端 |
//!
//! 后端在构建时选择：默认是纯 Rust 的 [`BuiltinProvider`]，
//! 启用 `openssl` feature 后 [`DefaultProvider`] 变为 [`OpenSslProvider`]。
//! 选中后端缺失的能力由内置后端补齐，因此运行期不存在后端分支。

mod builtin;
pub mod crc;
#[cfg(feature = "openssl")]
mod libcrypto;
mod provider;

pub use builtin::BuiltinProvider;
#[cfg(feature = "openssl")]
pub use libcrypto::OpenSslProvider;
pub use provider::{Capabilities, CryptoProvider, CRYPTO_HASH_SIZE};

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use alloc::{vec, vec::Vec};
use core::fmt;

/// 构建时选定的后端
#[cfg(not(feature = "openssl"))]
pub type DefaultProvider = BuiltinProvider;

/// 构建时选定的后端
#[cfg(feature = "openssl")]
pub type DefaultProvider = OpenSslProvider;

/// 校验和算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    /// CRC32C
    Crc32c,
    /// XXH64
    XxHash64,
    /// SHA-256
    Sha256,
    /// BLAKE2b-256
    Blake2b,
    /// HMAC-SHA256
    HmacSha256,
}

impl ChecksumAlgorithm {
    /// 从 superblock 的 csum_type 解析
    pub fn from_disk(csum_type: u16) -> Result<Self> {
        match csum_type {
            BTRFS_CSUM_TYPE_CRC32 => Ok(Self::Crc32c),
            BTRFS_CSUM_TYPE_XXHASH => Ok(Self::XxHash64),
            BTRFS_CSUM_TYPE_SHA256 => Ok(Self::Sha256),
            BTRFS_CSUM_TYPE_BLAKE2 => Ok(Self::Blake2b),
            BTRFS_CSUM_TYPE_HMAC_SHA256 => Ok(Self::HmacSha256),
            other => {
                log::error!("[CRYPTO] unknown csum_type {}", other);
                Err(Error::new(ErrorKind::Unsupported, "unknown checksum type"))
            }
        }
    }

    /// superblock 中的 csum_type 编码
    pub const fn to_disk(self) -> u16 {
        match self {
            Self::Crc32c => BTRFS_CSUM_TYPE_CRC32,
            Self::XxHash64 => BTRFS_CSUM_TYPE_XXHASH,
            Self::Sha256 => BTRFS_CSUM_TYPE_SHA256,
            Self::Blake2b => BTRFS_CSUM_TYPE_BLAKE2,
            Self::HmacSha256 => BTRFS_CSUM_TYPE_HMAC_SHA256,
        }
    }

    /// 摘要长度（字节）
    pub const fn digest_size(self) -> usize {
        match self {
            Self::Crc32c => 4,
            Self::XxHash64 => 8,
            Self::Sha256 | Self::Blake2b | Self::HmacSha256 => CRYPTO_HASH_SIZE,
        }
    }

    /// 算法名
    pub const fn name(self) -> &'static str {
        match self {
            Self::Crc32c => "crc32c",
            Self::XxHash64 => "xxhash64",
            Self::Sha256 => "sha256",
            Self::Blake2b => "blake2b",
            Self::HmacSha256 => "hmac(sha256)",
        }
    }

    /// 是否需要认证密钥
    pub const fn is_keyed(self) -> bool {
        matches!(self, Self::HmacSha256)
    }

    /// 由后端提供时所需的能力；内置算法返回 `None`
    pub const fn capability(self) -> Option<Capabilities> {
        match self {
            Self::Crc32c | Self::XxHash64 => None,
            Self::Sha256 => Some(Capabilities::SHA256),
            Self::Blake2b => Some(Capabilities::BLAKE2B),
            Self::HmacSha256 => Some(Capabilities::HMAC_SHA256),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 绑定了算法、后端和（可选）认证密钥的摘要计算器
///
/// 每次运行根据 superblock 创建一次，之后只读。
#[derive(Clone)]
pub struct Checksummer<P: CryptoProvider = DefaultProvider> {
    algorithm: ChecksumAlgorithm,
    provider: P,
    fallback: BuiltinProvider,
    auth_key: Vec<u8>,
}

impl Checksummer<DefaultProvider> {
    /// 使用构建时选定的后端创建
    pub fn new(algorithm: ChecksumAlgorithm, auth_key: Option<&[u8]>) -> Result<Self> {
        Self::with_provider(algorithm, DefaultProvider::default(), auth_key)
    }
}

impl<P: CryptoProvider> Checksummer<P> {
    /// 使用指定后端创建
    ///
    /// HMAC 算法在这里检查密钥，空密钥或缺失密钥返回 `InvalidKey`，
    /// 保证在任何哈希计算之前报告。
    pub fn with_provider(
        algorithm: ChecksumAlgorithm,
        provider: P,
        auth_key: Option<&[u8]>,
    ) -> Result<Self> {
        let auth_key = match (algorithm.is_keyed(), auth_key) {
            (true, Some(key)) if !key.is_empty() => key.to_vec(),
            (true, _) => {
                return Err(Error::new(
                    ErrorKind::InvalidKey,
                    "HMAC checksum requires a non-empty authentication key",
                ))
            }
            (false, _) => Vec::new(),
        };

        log::debug!(
            "[CRYPTO] checksum {} via {} backend",
            algorithm,
            match algorithm.capability() {
                Some(cap) if provider.capabilities().contains(cap) => provider.name(),
                Some(_) => "builtin (fallback)",
                None => "builtin",
            }
        );

        Ok(Self {
            algorithm,
            provider,
            fallback: BuiltinProvider,
            auth_key,
        })
    }

    /// 算法
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// 摘要长度
    pub fn digest_size(&self) -> usize {
        self.algorithm.digest_size()
    }

    fn backend(&self, cap: Capabilities) -> &dyn CryptoProvider {
        if self.provider.capabilities().contains(cap) {
            &self.provider
        } else {
            &self.fallback
        }
    }

    /// 计算摘要写入 `out`（长度必须等于 digest_size）
    pub fn compute_into(&self, buf: &[u8], out: &mut [u8]) -> Result<()> {
        if out.len() != self.digest_size() {
            return Err(Error::new(ErrorKind::InvalidInput, "digest buffer has wrong length"));
        }

        match self.algorithm {
            ChecksumAlgorithm::Crc32c => out.copy_from_slice(&crc::crc32c(buf).to_le_bytes()),
            ChecksumAlgorithm::XxHash64 => out.copy_from_slice(&crc::xxhash64(buf).to_le_bytes()),
            ChecksumAlgorithm::Sha256 => {
                out.copy_from_slice(&self.backend(Capabilities::SHA256).sha256(buf)?)
            }
            ChecksumAlgorithm::Blake2b => {
                out.copy_from_slice(&self.backend(Capabilities::BLAKE2B).blake2b_256(buf)?)
            }
            ChecksumAlgorithm::HmacSha256 => out.copy_from_slice(
                &self
                    .backend(Capabilities::HMAC_SHA256)
                    .hmac_sha256(&self.auth_key, buf)?,
            ),
        }
        Ok(())
    }

    /// 计算摘要
    pub fn compute(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.digest_size()];
        self.compute_into(buf, &mut out)?;
        Ok(out)
    }

    /// 判断 `buf` 的摘要是否等于 `expected`
    pub fn matches(&self, buf: &[u8], expected: &[u8]) -> Result<bool> {
        Ok(self.compute(buf)? == expected)
    }
}

/// 一次性计算：`compute(algorithm, buffer, key) -> digest`
pub fn compute(algorithm: ChecksumAlgorithm, buf: &[u8], auth_key: Option<&[u8]>) -> Result<Vec<u8>> {
    Checksummer::new(algorithm, auth_key)?.compute(buf)
}
