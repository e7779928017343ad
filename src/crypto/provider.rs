//! 密码学后端接口

use crate::error::Result;
use bitflags::bitflags;

/// SHA-256 / BLAKE2b-256 / HMAC-SHA256 的摘要长度
pub const CRYPTO_HASH_SIZE: usize = 32;

bitflags! {
    /// 后端能力集
    ///
    /// 选中的后端不具备某项能力时，由内置后端补齐。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// SHA-256
        const SHA256      = 0x01;
        /// BLAKE2b，32 字节输出
        const BLAKE2B     = 0x02;
        /// HMAC-SHA256
        const HMAC_SHA256 = 0x04;
    }
}

/// 密码学摘要后端
///
/// 同一算法、同一输入下，所有后端的输出必须逐位一致。
pub trait CryptoProvider {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 后端实现的算法
    fn capabilities(&self) -> Capabilities;

    /// SHA-256
    fn sha256(&self, buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]>;

    /// BLAKE2b，输出长度参数为 32（不是截断的 64 字节摘要）
    fn blake2b_256(&self, buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]>;

    /// HMAC-SHA256，调用方保证 key 非空
    fn hmac_sha256(&self, key: &[u8], buf: &[u8]) -> Result<[u8; CRYPTO_HASH_SIZE]>;
}
