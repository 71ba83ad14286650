//! VFS 用户态接口定义
//!
//! 流句柄是 64 位无符号数，全 1（即 `-1`）是通用的无效句柄。

/// 无效流句柄
pub const INVALID_STREAM: u64 = u64::MAX;

bitflags::bitflags! {
    /// 打开模式
    ///
    /// `READ` 与 `WRITE` 至少要有一个，否则打开请求会被拒绝。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenMode: u32 {
        /// 读
        const READ     = 0x1;
        /// 写
        const WRITE    = 0x2;
        /// 追加
        const APPEND   = 0x4;
        /// 打开时截断为 0
        const TRUNCATE = 0x8;
    }
}

impl OpenMode {
    /// 只对文件语义有意义的标志（设备会忽略它们）
    pub const FILE_SEMANTICS: OpenMode = OpenMode::APPEND.union(OpenMode::TRUNCATE);

    /// 是否至少请求了读或写
    pub fn is_valid(&self) -> bool {
        self.intersects(OpenMode::READ | OpenMode::WRITE)
    }

    /// 是否可读
    pub fn can_read(&self) -> bool {
        self.contains(OpenMode::READ)
    }

    /// 是否可写
    pub fn can_write(&self) -> bool {
        self.contains(OpenMode::WRITE)
    }
}

/// 文件元信息查询键
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileInfo {
    /// 文件大小（字节）
    FileSize = 0,
    /// 已占用块数
    UsedBlocks = 1,
    /// 块大小
    BlockSize = 2,
    /// 创建时间
    CreateTime = 3,
    /// 访问时间
    AccessTime = 4,
    /// 修改时间
    ChangeTime = 5,
}

impl FileInfo {
    /// 从系统调用参数解码
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileInfo::FileSize),
            1 => Some(FileInfo::UsedBlocks),
            2 => Some(FileInfo::BlockSize),
            3 => Some(FileInfo::CreateTime),
            4 => Some(FileInfo::AccessTime),
            5 => Some(FileInfo::ChangeTime),
            _ => None,
        }
    }
}
