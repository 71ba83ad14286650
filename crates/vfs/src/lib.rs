//! 内核虚拟文件系统层
//!
//! 此 crate 把设备、挂载的文件系统实例、合成文件与链接统一到一棵命名空间树下，
//! 并管理打开文件（流）的生命周期：
//!
//! - [`NamespaceTree`] - 命名空间树与路径解析
//! - [`ResourceCache`] - 有界的驱动资源缓存，负责加载、钉住与驱逐
//! - [`StreamTable`] / [`UserStreamTable`] - 内核流表与进程级描述符表
//! - [`Vfs::mount`] / [`Vfs::unmount`] - 挂载管理
//! - [`Device`] / [`FileSystem`] / [`FsResource`] - 驱动需要实现的接口
//!
//! 所有操作都是 [`Vfs`] 的方法；内核使用全局实例 [`VFS`]，测试可以自行创建独立实例。

#![no_std]
#![allow(clippy::module_inception)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod error;
pub mod ops;
pub mod path;
pub mod syscall;

mod arena;
mod context;
mod device;
mod fs;
mod mount;
mod node;
mod resource;
mod stream;
mod user_stream;

// Re-export ops
pub use ops::{UserAccessGuard, VfsOps, register_vfs_ops, vfs_ops};

// Re-export error
pub use error::FsError;

// Re-export path
pub use path::{DevicePath, join_path, parse_path, split_device_path};

// Re-export config
pub use config::VfsConfig;

// Re-export driver interfaces
pub use device::{Device, DeviceKey, DeviceType, DeviceValue};
pub use fs::{FileSystem, FsResource, MetaKey, ResourceFlags};

// Re-export namespace
pub use node::{MountPoint, NamespaceTree, Node, NodeId, NodeKind, NodeType, SyntheticFile};

// Re-export resource cache
pub use resource::{Resource, ResourceCache, ResourceId};

// Re-export streams
pub use stream::{Stream, StreamId, StreamTable};
pub use user_stream::{StdioPaths, UserStreamTable, UserspaceStream};

// Re-export context
pub use context::Vfs;

// Re-export uapi types for convenience
pub use uapi::vfs::{FileInfo, INVALID_STREAM, OpenMode};

lazy_static::lazy_static! {
    /// 内核全局 VFS 实例
    pub static ref VFS: Vfs = Vfs::new();
}

#[cfg(test)]
mod tests;
