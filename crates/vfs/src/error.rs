//! VFS 错误类型
//!
//! 内核侧接口统一返回 `Result<_, FsError>`；面向用户态的系统调用层再把错误折叠为
//! 无效句柄或 0 字节。[`FsError::to_errno()`] 给出 POSIX 风格的错误码，
//! [`FsError::mount_code()`] 给出挂载接口沿用的小整数错误码。

/// VFS 错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    // 查找相关
    /// 路径不存在 (-ENOENT)
    NotFound,
    /// 设备不存在 (-ENODEV)
    NoDevice,
    /// 挂载点不存在 (-ENOENT)
    MountpointNotFound,
    /// 节点已存在 (-EEXIST)
    AlreadyExists,

    // 节点类型相关
    /// 是目录 (-EISDIR)
    IsDirectory,
    /// 不是目录 (-ENOTDIR)
    NotDirectory,
    /// 目标不是设备节点 (-ENOTBLK)
    NotDevice,
    /// 设备不具备分区能力 (-ENOTBLK)
    NotPartition,
    /// 符号链接层级过多 (-ELOOP)
    TooManyLinks,

    // 权限/模式相关
    /// 打开模式未授予该方向，或资源不允许该操作 (-EACCES)
    PermissionDenied,
    /// 只读文件系统 (-EROFS)
    ReadOnlyFs,

    // 容量相关
    /// 资源缓存已满且没有可淘汰项 (-ENOMEM)
    CacheExhausted,

    // 驱动相关
    /// 驱动未提供文件系统句柄 (-ENODEV)
    NoFilesystem,
    /// 文件系统初始化失败 (-EIO)
    InitFailed,
    /// 驱动 load/unload/truncate 失败 (-EIO)
    DriverFailure,

    // 其他
    /// 仍有流或资源引用 (-EBUSY)
    Busy,
    /// 无效的流句柄或描述符 (-EBADF)
    BadStream,
    /// 无效参数 (-EINVAL)
    InvalidArgument,
    /// 操作不支持 (-ENOTSUP)
    NotSupported,
}

impl FsError {
    /// 转换为系统调用错误码（负数）
    pub fn to_errno(&self) -> isize {
        match self {
            FsError::NotFound | FsError::MountpointNotFound => -2,
            FsError::InitFailed | FsError::DriverFailure => -5,
            FsError::BadStream => -9,
            FsError::CacheExhausted => -12,
            FsError::PermissionDenied => -13,
            FsError::NotDevice | FsError::NotPartition => -15,
            FsError::Busy => -16,
            FsError::AlreadyExists => -17,
            FsError::NoDevice | FsError::NoFilesystem => -19,
            FsError::NotDirectory => -20,
            FsError::IsDirectory => -21,
            FsError::InvalidArgument => -22,
            FsError::ReadOnlyFs => -30,
            FsError::TooManyLinks => -40,
            FsError::NotSupported => -95,
        }
    }

    /// 挂载/卸载接口使用的状态码，0 表示成功
    pub fn mount_code(&self) -> i32 {
        match self {
            FsError::NoDevice => 1,
            FsError::MountpointNotFound => 2,
            FsError::NotDevice => 3,
            FsError::InitFailed => 4,
            FsError::NoFilesystem => 5,
            FsError::Busy => 6,
            FsError::NotPartition => 7,
            _ => -1,
        }
    }
}
