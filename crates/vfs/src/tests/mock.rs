//! 测试用驱动：内存文件系统、块设备、字符设备与合成文件处理函数
//!
//! 每个对象都统计驱动回调的调用次数，测试据此断言 VFS 有没有、调用了几次驱动。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{
    Device, DeviceKey, DeviceType, DeviceValue, FileSystem, FsResource, MetaKey, ResourceFlags,
    SyntheticFile,
};

/// 内存中的文件或目录
pub struct MemResource {
    name: String,
    flags: ResourceFlags,
    children: Vec<Arc<MemResource>>,
    data: Mutex<Vec<u8>>,
    pub loaded: AtomicBool,
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub truncates: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_load: AtomicBool,
    pub fail_unload: AtomicBool,
    pub fail_truncate: AtomicBool,
    /// 置位时 `load` 阻塞，模拟等待磁盘中断的驱动
    pub hold_load: AtomicBool,
    pub load_started: AtomicBool,
}

impl MemResource {
    fn new(name: &str, flags: ResourceFlags, children: Vec<Arc<MemResource>>, data: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            name: String::from(name),
            flags,
            children,
            data: Mutex::new(data.to_vec()),
            loaded: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            truncates: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_load: AtomicBool::new(false),
            fail_unload: AtomicBool::new(false),
            fail_truncate: AtomicBool::new(false),
            hold_load: AtomicBool::new(false),
            load_started: AtomicBool::new(false),
        })
    }

    /// 可读写文件
    pub fn file(name: &str, data: &[u8]) -> Arc<Self> {
        Self::new(name, ResourceFlags::READ | ResourceFlags::WRITE, Vec::new(), data)
    }

    /// 只读文件
    pub fn read_only_file(name: &str, data: &[u8]) -> Arc<Self> {
        Self::new(name, ResourceFlags::READ, Vec::new(), data)
    }

    /// 目录
    pub fn dir(name: &str, children: Vec<Arc<MemResource>>) -> Arc<Self> {
        Self::new(
            name,
            ResourceFlags::READ | ResourceFlags::BROWSE,
            children,
            &[],
        )
    }

    /// 按名字查找子项
    pub fn child(&self, name: &str) -> Arc<MemResource> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .cloned()
            .unwrap()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unload_count(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// 文件系统销毁后所有资源回到未加载状态
    fn reset(&self) {
        self.loaded.store(false, Ordering::SeqCst);
        for child in &self.children {
            child.reset();
        }
    }
}

impl FsResource for MemResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn flags(&self) -> ResourceFlags {
        self.flags
    }

    fn load(&self) -> bool {
        self.load_started.store(true, Ordering::SeqCst);
        while self.hold_load.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        if self.fail_load.load(Ordering::SeqCst) {
            return false;
        }
        assert!(
            !self.loaded.swap(true, Ordering::SeqCst),
            "resource '{}' loaded twice",
            self.name
        );
        self.loads.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn unload(&self) -> bool {
        if self.fail_unload.load(Ordering::SeqCst) {
            return false;
        }
        self.reset();
        self.unloads.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn children(&self) -> Vec<Arc<dyn FsResource>> {
        self.children
            .iter()
            .map(|child| child.clone() as Arc<dyn FsResource>)
            .collect()
    }

    fn meta_read(&self, key: MetaKey) -> u64 {
        match key {
            MetaKey::Size => self.data.lock().unwrap().len() as u64,
            MetaKey::BlockSize => 512,
            MetaKey::UsedBlocks => self.data.lock().unwrap().len().div_ceil(512) as u64,
            _ => 0,
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        n
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> usize {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock().unwrap();
        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        buf.len()
    }

    fn truncate(&self, size: u64) -> bool {
        if self.fail_truncate.load(Ordering::SeqCst) {
            return false;
        }
        self.truncates.fetch_add(1, Ordering::SeqCst);
        self.data.lock().unwrap().truncate(size as usize);
        true
    }
}

/// 内存文件系统
pub struct MemFs {
    root: Arc<MemResource>,
    read_only: bool,
    pub fail_init: AtomicBool,
    pub inits: AtomicUsize,
    pub destroys: AtomicUsize,
}

impl MemFs {
    pub fn new(root: Arc<MemResource>, read_only: bool) -> Arc<Self> {
        Arc::new(Self {
            root,
            read_only,
            fail_init: AtomicBool::new(false),
            inits: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
        })
    }

    pub fn root_resource(&self) -> Arc<MemResource> {
        self.root.clone()
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

impl FileSystem for MemFs {
    fn fs_type(&self) -> &'static str {
        "memfs"
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn init(&self) -> bool {
        self.inits.fetch_add(1, Ordering::SeqCst);
        !self.fail_init.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.root.reset();
    }

    fn root(&self) -> Arc<dyn FsResource> {
        self.root.clone()
    }
}

/// 测试设备：分区（可带文件系统）或字符设备，读写都落在一块内存上
pub struct MockDevice {
    name: String,
    ty: DeviceType,
    fs: Option<Arc<MemFs>>,
    data: Mutex<Vec<u8>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MockDevice {
    pub fn partition(name: &str, fs: Option<Arc<MemFs>>) -> Arc<Self> {
        Self::new(name, DeviceType::Partition, fs)
    }

    pub fn char_device(name: &str) -> Arc<Self> {
        Self::new(name, DeviceType::Char, None)
    }

    fn new(name: &str, ty: DeviceType, fs: Option<Arc<MemFs>>) -> Arc<Self> {
        Arc::new(Self {
            name: String::from(name),
            ty,
            fs,
            data: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Device for MockDevice {
    fn get_value(&self, key: DeviceKey) -> Option<DeviceValue> {
        match key {
            DeviceKey::Name => Some(DeviceValue::Name(self.name.clone())),
            DeviceKey::Type => Some(DeviceValue::Type(self.ty)),
            DeviceKey::Data => self
                .fs
                .clone()
                .map(|fs| DeviceValue::Filesystem(fs as Arc<dyn FileSystem>)),
        }
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> usize {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        n
    }

    fn write(&self, offset: u64, buf: &[u8]) -> usize {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock().unwrap();
        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        buf.len()
    }
}

/// 记录写入的合成文件处理函数，读取时返回固定内容
pub struct RecordingFile {
    pub content: &'static [u8],
    pub writes: Mutex<Vec<(String, u64, Vec<u8>)>>,
}

impl RecordingFile {
    pub fn new(content: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            content,
            writes: Mutex::new(Vec::new()),
        })
    }
}

impl SyntheticFile for RecordingFile {
    fn write(&self, name: &str, offset: u64, buf: &[u8]) -> usize {
        self.writes
            .lock()
            .unwrap()
            .push((String::from(name), offset, buf.to_vec()));
        buf.len()
    }

    fn read(&self, _name: &str, offset: u64, buf: &mut [u8]) -> usize {
        let start = (offset as usize).min(self.content.len());
        let n = buf.len().min(self.content.len() - start);
        buf[..n].copy_from_slice(&self.content[start..start + n]);
        n
    }
}

/// 只实现写入的合成文件处理函数
pub struct WriteOnlyFile;

impl SyntheticFile for WriteOnlyFile {
    fn write(&self, _name: &str, _offset: u64, buf: &[u8]) -> usize {
        buf.len()
    }
}
