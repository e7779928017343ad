//! 文件/块设备节点后端（需要 `std`）

use super::BlockDevice;
use crate::{
    consts::BTRFS_DEFAULT_DEVICE_SECTOR,
    error::{Error, ErrorKind, Result},
};
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// 以镜像文件或块设备节点为后端的只读设备
pub struct FileDevice {
    path: PathBuf,
    /// `new` 取得的句柄留给第一次 `open`；`close` 后释放
    file: Option<File>,
    opened: bool,
    size: u64,
}

impl FileDevice {
    /// 打开路径并取得大小
    ///
    /// 句柄保留下来，[`BlockDevice::open`] 直接使用它；
    /// [`BlockDevice::close`] 之后再次 `open` 会重新打开路径。
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| {
            log::error!("[BLOCK] cannot open {}: {}", path.display(), e);
            Error::new(ErrorKind::Resource, "unable to open device")
        })?;

        // 块设备节点的 metadata().len() 为 0，用 seek 取得真实大小
        let size = file.seek(SeekFrom::End(0)).map_err(|e| {
            log::error!("[BLOCK] cannot size {}: {}", path.display(), e);
            Error::new(ErrorKind::Io, "unable to determine device size")
        })?;

        Ok(Self {
            path,
            file: Some(file),
            opened: false,
            size,
        })
    }

    /// 设备路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 是否处于打开状态
    pub fn is_open(&self) -> bool {
        self.opened
    }
}

impl BlockDevice for FileDevice {
    fn sector_size(&self) -> u32 {
        BTRFS_DEFAULT_DEVICE_SECTOR
    }

    fn total_sectors(&self) -> u64 {
        self.size / BTRFS_DEFAULT_DEVICE_SECTOR as u64
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let sector = BTRFS_DEFAULT_DEVICE_SECTOR as usize;
        let len = count as usize * sector;
        if buf.len() < len {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer too small for sectors"));
        }

        if !self.opened {
            return Err(Error::new(ErrorKind::Resource, "device is not open"));
        }
        let file = self
            .file
            .as_mut()
            .ok_or(Error::new(ErrorKind::Resource, "device is not open"))?;

        file.seek(SeekFrom::Start(lba * sector as u64))
            .and_then(|_| file.read_exact(&mut buf[..len]))
            .map_err(|e| {
                log::error!("[BLOCK] read lba={} count={} failed: {}", lba, count, e);
                Error::new(ErrorKind::Io, "device read failed")
            })?;

        Ok(len)
    }

    fn open(&mut self) -> Result<()> {
        if self.file.is_none() {
            let file = File::open(&self.path).map_err(|e| {
                log::error!("[BLOCK] cannot open {}: {}", self.path.display(), e);
                Error::new(ErrorKind::Resource, "unable to open device")
            })?;
            self.file = Some(file);
        }
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        self.opened = false;
        Ok(())
    }
}
