//! 块设备抽象
//!
//! 提供块设备接口和字节级只读 I/O。
//! block/device.rs 定义设备 trait 和包装器，包装器负责设备的打开与关闭
//! block/io.rs 提供任意偏移的字节读取（处理扇区对齐）
//! block/mem.rs 内存设备；block/file.rs 镜像文件/设备节点（需要 `std`）

mod device;
mod io;
mod mem;
#[cfg(feature = "std")]
mod file;

pub use device::{BlockDevice, BlockDev};
pub use mem::MemDevice;
#[cfg(feature = "std")]
pub use file::FileDevice;
