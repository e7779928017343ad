//! 错误类型定义
//!
//! 提供校验和恢复流程中所有操作的错误类型。
//! 动态上下文（偏移、key、名字）在出错位置通过 `log` 输出，
//! 错误值本身只携带类别和静态消息。

use core::fmt;

/// 校验和恢复错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 输入错误（路径无效、文件过小、superblock 魔数错误）
    InvalidInput,
    /// 找不到（inode 无 extent、没有覆盖该偏移的校验和条目）
    NotFound,
    /// 子卷根无法读取
    SubvolumeUnreadable,
    /// 索引数据无效（记录类型异常、结构损坏、元数据校验和不符）
    InvalidData,
    /// 校验和索引在凑齐所需摘要前耗尽
    Incomplete,
    /// 资源错误（分配失败、句柄打开失败）
    Resource,
    /// I/O 错误
    Io,
    /// HMAC 认证密钥缺失或为空
    InvalidKey,
    /// 不支持的操作
    Unsupported,
}

impl ErrorKind {
    /// 该错误类别对应的进程退出码（总是非零）
    pub const fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidInput => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::SubvolumeUnreadable => 4,
            ErrorKind::InvalidData => 5,
            ErrorKind::Incomplete => 6,
            ErrorKind::Resource | ErrorKind::Io => 7,
            ErrorKind::InvalidKey => 8,
            ErrorKind::Unsupported => 9,
        }
    }
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 保留消息，改写类别
    ///
    /// 用于把底层错误归入调用方语义下的类别（例如子卷根读取失败）。
    pub const fn recategorize(self, kind: ErrorKind) -> Self {
        Self { kind, message: self.message }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
