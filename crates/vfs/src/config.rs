//! VFS 配置常量

/// 资源缓存容量：最多同时加载的资源数。缓冲区满时淘汰未被引用的资源
pub const MAX_RES_BUFFER: usize = 100;

/// 设备文件目录
pub const DEV_DIR: &str = "dev";
/// 系统信息目录
pub const SYSINF_DIR: &str = "sysinf";
/// 挂载点目录
pub const MOUNT_DIR: &str = "mount";

/// 根文件系统的挂载路径
pub const ROOT_MOUNT_PATH: &str = "/mount";
/// 根文件系统上必须存在的标记文件
pub const ROOT_MARKER: &str = "kernel";

/// 打开时跟随链接的最大层数
pub const MAX_LINK_DEPTH: usize = 8;

/// VFS 实例配置
#[derive(Debug, Clone)]
pub struct VfsConfig {
    /// 资源缓存容量
    pub max_res_buffer: usize,
    /// 根文件系统挂载路径
    pub root_mount_path: &'static str,
    /// 根文件系统标记文件名
    pub root_marker: &'static str,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            max_res_buffer: MAX_RES_BUFFER,
            root_mount_path: ROOT_MOUNT_PATH,
            root_marker: ROOT_MARKER,
        }
    }
}
