//! 面向用户态的文件系统调用
//!
//! 调用号见 [`uapi::syscall`]。这里的入口以描述符而不是内核流 id 为参数，
//! 先检查描述符自身的模式与用户缓冲区，再转交给 [`Vfs`]。
//! 任何失败都折叠为 [`INVALID_STREAM`] 或 0，不向用户态返回错误码。

use uapi::vfs::{FileInfo, INVALID_STREAM, OpenMode};

use crate::user_stream::{UserStreamTable, UserspaceStream};
use crate::{UserAccessGuard, Vfs, vfs_ops};

/// 打开文件，返回新的描述符
pub fn sys_open(vfs: &Vfs, table: &UserStreamTable, path: &str, mode: u32) -> u64 {
    let Some(mode) = OpenMode::from_bits(mode) else {
        return INVALID_STREAM;
    };
    match vfs.open(path, mode) {
        Ok(stream) => table.alloc(UserspaceStream { stream, mode }) as u64,
        Err(err) => {
            log::debug!("sys_open({}): {:?}", path, err);
            INVALID_STREAM
        }
    }
}

/// 关闭描述符
pub fn sys_close(vfs: &Vfs, table: &UserStreamTable, fd: u64) {
    let _ = table.close(vfs, fd as usize);
}

/// 从描述符读取到用户缓冲区，返回读取的字节数
pub fn sys_read(vfs: &Vfs, table: &UserStreamTable, fd: u64, offset: u64, buf: &mut [u8]) -> usize {
    let Ok(entry) = table.get(fd as usize) else {
        return 0;
    };
    if !vfs_ops().user_range_valid(buf.as_ptr() as usize, buf.len()) || !entry.mode.can_read() {
        return 0;
    }
    let _guard = UserAccessGuard::new();
    vfs.read(entry.stream, offset, buf).unwrap_or(0)
}

/// 把用户缓冲区写入描述符，返回写入的字节数
pub fn sys_write(vfs: &Vfs, table: &UserStreamTable, fd: u64, offset: u64, buf: &[u8]) -> usize {
    let Ok(entry) = table.get(fd as usize) else {
        return 0;
    };
    if !vfs_ops().user_range_valid(buf.as_ptr() as usize, buf.len()) || !entry.mode.can_write() {
        return 0;
    }
    let _guard = UserAccessGuard::new();
    vfs.write(entry.stream, offset, buf).unwrap_or(0)
}

/// 查询描述符对应文件的元数据，`info` 为 [`FileInfo`] 的原始值
pub fn sys_file_info(vfs: &Vfs, table: &UserStreamTable, fd: u64, info: u32) -> u64 {
    let (Ok(entry), Some(info)) = (table.get(fd as usize), FileInfo::from_raw(info)) else {
        return 0;
    };
    vfs.file_info(entry.stream, info).unwrap_or(0)
}
