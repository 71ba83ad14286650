//! 设备驱动接口
//!
//! 设备注册后以设备节点的形式出现在 `/dev` 下。VFS 只通过 `get_value` 查询名称、类型
//! 与驱动数据，通过 `read`/`write` 转发 I/O；驱动未提供的回调视为 0 字节。

use alloc::string::String;
use alloc::sync::Arc;

use crate::FileSystem;

/// `get_value` 查询键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKey {
    /// 设备名
    Name,
    /// 设备类型
    Type,
    /// 驱动数据（分区设备返回文件系统句柄）
    Data,
}

/// 设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// 分区，可挂载
    Partition,
    /// 整盘
    Disk,
    /// 字符设备
    Char,
    /// 其他
    Other,
}

/// `get_value` 返回值
pub enum DeviceValue {
    /// 设备名
    Name(String),
    /// 设备类型
    Type(DeviceType),
    /// 文件系统句柄
    Filesystem(Arc<dyn FileSystem>),
}

/// 设备驱动程序接口
pub trait Device: Send + Sync {
    /// 查询设备属性，不支持的键返回 `None`
    fn get_value(&self, key: DeviceKey) -> Option<DeviceValue>;

    /// 从设备读取数据，返回读取的字节数
    fn read(&self, _offset: u64, _buf: &mut [u8]) -> usize {
        0
    }

    /// 向设备写入数据，返回写入的字节数
    fn write(&self, _offset: u64, _buf: &[u8]) -> usize {
        0
    }
}

impl dyn Device {
    /// 设备名
    pub fn name(&self) -> Option<String> {
        match self.get_value(DeviceKey::Name)? {
            DeviceValue::Name(name) => Some(name),
            _ => None,
        }
    }

    /// 设备类型
    pub fn device_type(&self) -> Option<DeviceType> {
        match self.get_value(DeviceKey::Type)? {
            DeviceValue::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// 是否具备分区能力
    pub fn is_partition(&self) -> bool {
        self.device_type() == Some(DeviceType::Partition)
    }

    /// 驱动提供的文件系统句柄
    pub fn filesystem(&self) -> Option<Arc<dyn FileSystem>> {
        match self.get_value(DeviceKey::Data)? {
            DeviceValue::Filesystem(fs) => Some(fs),
            _ => None,
        }
    }
}
