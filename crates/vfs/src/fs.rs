//! 文件系统驱动接口
//!
//! 挂载到命名空间中的文件系统由驱动实现 [`FileSystem`]；文件系统内部的每个文件/目录
//! 由驱动实现为一个 [`FsResource`]。VFS 通过资源缓存决定何时 `load`/`unload`
//! 资源，驱动只负责介质格式与数据本身。

use alloc::sync::Arc;
use alloc::vec::Vec;
use uapi::vfs::FileInfo;

bitflags::bitflags! {
    /// 资源能力标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResourceFlags: u32 {
        /// 可读
        const READ   = 0x1;
        /// 可写
        const WRITE  = 0x2;
        /// 可枚举子项（目录）
        const BROWSE = 0x4;
    }
}

/// 资源元数据键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    /// 大小（字节）
    Size,
    /// 已占用块数
    UsedBlocks,
    /// 块大小
    BlockSize,
    /// 创建时间
    CreateTime,
    /// 访问时间
    AccessTime,
    /// 修改时间
    ChangeTime,
}

impl From<FileInfo> for MetaKey {
    fn from(info: FileInfo) -> Self {
        match info {
            FileInfo::FileSize => MetaKey::Size,
            FileInfo::UsedBlocks => MetaKey::UsedBlocks,
            FileInfo::BlockSize => MetaKey::BlockSize,
            FileInfo::CreateTime => MetaKey::CreateTime,
            FileInfo::AccessTime => MetaKey::AccessTime,
            FileInfo::ChangeTime => MetaKey::ChangeTime,
        }
    }
}

/// 文件系统内的一个文件或目录（类似 inode）
///
/// `children()` 只在资源处于已加载状态时有意义；祖先被 `unload` 后，
/// 之前枚举出的子资源全部视为失效。
pub trait FsResource: Send + Sync {
    /// 资源名（在父目录中唯一）
    fn name(&self) -> &str;

    /// 能力标志
    fn flags(&self) -> ResourceFlags;

    /// 加载资源
    /// # 返回值：
    /// 如果加载成功则返回 true，否则返回 false
    fn load(&self) -> bool;

    /// 卸载资源，同时使所有子孙资源失效
    /// # 返回值：
    /// 如果卸载成功则返回 true，否则返回 false
    fn unload(&self) -> bool;

    /// 枚举子资源，顺序不保证
    fn children(&self) -> Vec<Arc<dyn FsResource>>;

    /// 读取元数据
    fn meta_read(&self, key: MetaKey) -> u64;

    /// 从指定位置读取文件内容，返回读取的字节数
    fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> usize {
        0
    }

    /// 向指定位置写入文件内容，返回写入的字节数
    fn write_at(&self, _offset: u64, _buf: &[u8]) -> usize {
        0
    }

    /// 截断文件到指定大小
    fn truncate(&self, _size: u64) -> bool {
        false
    }
}

/// 文件系统 trait
///
/// 由分区设备通过 [`crate::DeviceKey::Data`] 提供
pub trait FileSystem: Send + Sync {
    /// 文件系统类型名称
    fn fs_type(&self) -> &'static str;

    /// 是否只读
    fn read_only(&self) -> bool;

    /// 初始化（挂载时调用一次）
    fn init(&self) -> bool;

    /// 销毁（卸载时调用），之后所有资源失效
    fn destroy(&self);

    /// 根目录资源，`init` 成功后有效
    fn root(&self) -> Arc<dyn FsResource>;
}
