//! VFS 上下文
//!
//! [`Vfs`] 持有命名空间树、资源缓存与内核流表，所有公开操作都是它的方法。
//!
//! 加锁顺序固定为：命名空间树（读写锁）→ 资源缓存（自旋锁）→ 流表（自旋锁）。
//! 节点的引用计数是原子量，持有树的读锁即可钉住节点。
//! 设备与文件的读写回调在释放所有锁之后调用；资源的加载与枚举只持有树的读锁，
//! 缓存锁在驱动回调期间是释放的。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::AtomicU32;
use sync::{RwLock, SpinLock};
use uapi::vfs::{FileInfo, OpenMode};

use crate::config::{DEV_DIR, MAX_LINK_DEPTH, VfsConfig};
use crate::fs::{MetaKey, ResourceFlags};
use crate::node::{NamespaceTree, NodeId, NodeKind, SyntheticFile};
use crate::resource::{ResourceCache, ResourceId};
use crate::stream::{Stream, StreamId, StreamTable};
use crate::{Device, FileSystem, FsError, FsResource};

/// 虚拟文件系统实例
pub struct Vfs {
    pub(crate) config: VfsConfig,
    pub(crate) tree: RwLock<NamespaceTree>,
    pub(crate) cache: SpinLock<ResourceCache>,
    pub(crate) streams: StreamTable,
    /// 下一个挂载节点的名字
    pub(crate) next_mount_id: AtomicU32,
    /// 根文件系统所在的挂载路径
    pub(crate) root_mount: SpinLock<Option<String>>,
}

/// 读写请求的目标，在锁内取出后在锁外使用
enum IoTarget {
    Device(Arc<dyn Device>),
    Resource {
        fs: Arc<dyn FileSystem>,
        handle: Arc<dyn FsResource>,
    },
    File {
        name: String,
        handler: Arc<dyn SyntheticFile>,
    },
}

impl Vfs {
    /// 使用默认配置创建
    pub fn new() -> Self {
        Self::with_config(VfsConfig::default())
    }

    /// 使用指定配置创建
    pub fn with_config(config: VfsConfig) -> Self {
        Self {
            tree: RwLock::new(NamespaceTree::new()),
            cache: SpinLock::new(ResourceCache::new(config.max_res_buffer)),
            streams: StreamTable::new(),
            next_mount_id: AtomicU32::new(0),
            root_mount: SpinLock::new(None),
            config,
        }
    }

    /// 当前配置
    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    // ========== 命名空间 ==========

    /// 在目录 `parent_path` 下创建节点
    ///
    /// 挂载节点只能由 [`Vfs::mount`] 创建。
    pub fn create_node(&self, parent_path: &str, name: &str, kind: NodeKind) -> Result<NodeId, FsError> {
        if matches!(kind, NodeKind::Mount(_)) {
            return Err(FsError::InvalidArgument);
        }
        let mut tree = self.tree.write();
        let parent = tree.resolve_exact(parent_path)?;
        let id = tree.insert(parent, name, kind)?;
        log::debug!("vfs: created node {}", tree.path_of(id));
        Ok(id)
    }

    /// 在 `/dev` 下注册设备，节点名取自设备的 NAME 值
    pub fn register_device(&self, dev: Arc<dyn Device>) -> Result<NodeId, FsError> {
        let name = dev.name().ok_or(FsError::InvalidArgument)?;
        let dev_dir = String::from("/") + DEV_DIR;
        self.create_node(&dev_dir, &name, NodeKind::Device(dev))
    }

    /// 注册合成文件
    pub fn register_file(
        &self,
        dir: &str,
        name: &str,
        handler: Arc<dyn SyntheticFile>,
    ) -> Result<NodeId, FsError> {
        self.create_node(dir, name, NodeKind::File(handler))
    }

    /// 在 `dir` 下创建指向 `target_path` 的链接
    pub fn create_link(&self, dir: &str, name: &str, target_path: &str) -> Result<NodeId, FsError> {
        let mut tree = self.tree.write();
        let target = tree.resolve_exact(target_path)?;
        let parent = tree.resolve_exact(dir)?;
        tree.insert(parent, name, NodeKind::Link(target))
    }

    /// 删除节点
    ///
    /// 仍被流引用或仍有子节点时返回 [`FsError::Busy`]；挂载节点需用 [`Vfs::unmount`]。
    pub fn remove_node(&self, path: &str) -> Result<(), FsError> {
        let mut tree = self.tree.write();
        let id = tree.resolve_exact(path)?;
        if matches!(tree.get(id).map(|node| node.kind()), Some(NodeKind::Mount(_))) {
            return Err(FsError::InvalidArgument);
        }
        if self.streams.references_node(id) {
            return Err(FsError::Busy);
        }
        tree.unlink(id)?;
        log::debug!("vfs: removed node {}", path);
        Ok(())
    }

    /// 精确解析路径
    pub fn resolve(&self, path: &str) -> Result<NodeId, FsError> {
        self.tree.read().resolve_exact(path)
    }

    /// 部分解析路径，返回最深的匹配节点与剩余路径
    pub fn resolve_partial(&self, path: &str) -> (NodeId, String) {
        self.tree.read().resolve_partial(path)
    }

    /// 节点的绝对路径
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let tree = self.tree.read();
        tree.contains(id).then(|| tree.path_of(id))
    }

    /// 节点的引用计数
    pub fn ref_count(&self, path: &str) -> Result<usize, FsError> {
        let tree = self.tree.read();
        let id = tree.resolve_exact(path)?;
        tree.get(id).map(|node| node.ref_count()).ok_or(FsError::NotFound)
    }

    /// 列出目录下的子节点名，按创建顺序
    pub fn children(&self, path: &str) -> Result<Vec<String>, FsError> {
        let tree = self.tree.read();
        let id = tree.resolve_exact(path)?;
        Ok(tree
            .children(id)
            .filter_map(|child| tree.get(child).map(|node| String::from(node.name())))
            .collect())
    }

    // ========== 流 ==========

    /// 打开路径，返回新的流 id
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<StreamId, FsError> {
        if path.is_empty() || !mode.is_valid() {
            return Err(FsError::InvalidArgument);
        }
        let mut mode = mode;

        let tree = self.tree.read();
        let (mut node, mut rest) = tree.resolve_partial(path);
        let mut hops = 0;
        while let Some(NodeKind::Link(target)) = tree.get(node).map(|n| n.kind()) {
            hops += 1;
            if hops > MAX_LINK_DEPTH {
                return Err(FsError::TooManyLinks);
            }
            if !tree.contains(*target) {
                return Err(FsError::NotFound);
            }
            (node, rest) = tree.resolve_partial_from(*target, &rest);
        }

        let entry = tree.get(node).ok_or(FsError::NotFound)?;
        let mut truncate = None;
        let resource = match entry.kind() {
            NodeKind::Directory if rest.is_empty() => return Err(FsError::IsDirectory),
            NodeKind::Mount(mp) => {
                let rid = ResourceCache::resolve_shared(&self.cache, mp.root, &rest)?;
                if mode.contains(OpenMode::TRUNCATE) {
                    let mut cache = self.cache.lock();
                    let handle = cache.get(rid).map(|res| res.handle().clone());
                    let denied = match &handle {
                        _ if mp.fs.read_only() => Some(FsError::ReadOnlyFs),
                        Some(h) if h.flags().contains(ResourceFlags::WRITE) => None,
                        _ => Some(FsError::PermissionDenied),
                    };
                    if let Some(err) = denied {
                        cache.release(rid);
                        log::debug!("vfs: truncate of {} rejected: {:?}", path, err);
                        return Err(err);
                    }
                    truncate = handle;
                }
                Some(rid)
            }
            _ if !rest.is_empty() => return Err(FsError::NotFound),
            NodeKind::Device(_) | NodeKind::File(_) => {
                mode.remove(OpenMode::FILE_SEMANTICS);
                None
            }
            NodeKind::Directory | NodeKind::Link(_) => return Err(FsError::NotFound),
        };
        entry.pin();
        drop(tree);

        if let Some(handle) = truncate {
            if !handle.truncate(0) {
                log::warn!("vfs: driver failed to truncate {}", path);
                self.unpin(node, resource);
                return Err(FsError::DriverFailure);
            }
        }

        let id = self.streams.insert(mode, node, resource);
        log::trace!("vfs: open {} -> stream {}", path, id);
        Ok(id)
    }

    /// 以新的模式复制已有的流
    ///
    /// 新流共享同一节点与资源，并各自持有一次钉住；复制时不会再次截断。
    pub fn reopen(&self, id: StreamId, mode: OpenMode) -> Result<StreamId, FsError> {
        if !mode.is_valid() {
            return Err(FsError::InvalidArgument);
        }
        let mut mode = mode;
        mode.remove(OpenMode::TRUNCATE);

        let tree = self.tree.read();
        let mut cache = self.cache.lock();
        let stream = self.streams.get(id).ok_or(FsError::BadStream)?;
        let node = tree.get(stream.node).ok_or(FsError::BadStream)?;
        if let NodeKind::Device(_) | NodeKind::File(_) = node.kind() {
            mode.remove(OpenMode::FILE_SEMANTICS);
        }
        if let Some(rid) = stream.resource {
            cache.pin_chain(rid)?;
        }
        node.pin();
        Ok(self.streams.insert(mode, stream.node, stream.resource))
    }

    /// 关闭流，释放其钉住的资源与节点
    ///
    /// 未知 id 不做任何事，返回 false。
    pub fn close(&self, id: StreamId) -> bool {
        let tree = self.tree.read();
        let mut cache = self.cache.lock();
        let Some(stream) = self.streams.remove(id) else {
            return false;
        };
        if let Some(rid) = stream.resource {
            cache.release(rid);
        }
        if let Some(node) = tree.get(stream.node) {
            node.unpin();
        }
        true
    }

    fn unpin(&self, node: NodeId, resource: Option<ResourceId>) {
        let tree = self.tree.read();
        if let Some(rid) = resource {
            self.cache.lock().release(rid);
        }
        if let Some(node) = tree.get(node) {
            node.unpin();
        }
    }

    /// 查询流
    pub fn stream(&self, id: StreamId) -> Option<Stream> {
        self.streams.get(id)
    }

    fn io_target(&self, stream: &Stream) -> Result<IoTarget, FsError> {
        let tree = self.tree.read();
        let node = tree.get(stream.node).ok_or(FsError::BadStream)?;
        match node.kind() {
            NodeKind::Device(dev) => Ok(IoTarget::Device(dev.clone())),
            NodeKind::File(handler) => Ok(IoTarget::File {
                name: String::from(node.name()),
                handler: handler.clone(),
            }),
            NodeKind::Mount(mp) => {
                let rid = stream.resource.ok_or(FsError::BadStream)?;
                let cache = self.cache.lock();
                let handle = cache.get(rid).ok_or(FsError::BadStream)?.handle().clone();
                Ok(IoTarget::Resource {
                    fs: mp.fs.clone(),
                    handle,
                })
            }
            NodeKind::Directory | NodeKind::Link(_) => Err(FsError::BadStream),
        }
    }

    /// 从流的 `offset` 处读取，返回读取的字节数
    pub fn read(&self, id: StreamId, offset: u64, buf: &mut [u8]) -> Result<usize, FsError> {
        let stream = self.streams.get(id).ok_or(FsError::BadStream)?;
        if !stream.mode.can_read() {
            return Err(FsError::PermissionDenied);
        }
        match self.io_target(&stream)? {
            IoTarget::Device(dev) => Ok(dev.read(offset, buf)),
            IoTarget::Resource { handle, .. } => {
                if !handle.flags().contains(ResourceFlags::READ) {
                    return Err(FsError::PermissionDenied);
                }
                Ok(handle.read_at(offset, buf))
            }
            IoTarget::File { name, handler } => Ok(handler.read(&name, offset, buf)),
        }
    }

    /// 向流的 `offset` 处写入，返回写入的字节数
    ///
    /// 以 APPEND 模式打开的流忽略 `offset`，总是写到文件末尾。
    pub fn write(&self, id: StreamId, offset: u64, buf: &[u8]) -> Result<usize, FsError> {
        let stream = self.streams.get(id).ok_or(FsError::BadStream)?;
        if !stream.mode.can_write() {
            return Err(FsError::PermissionDenied);
        }
        match self.io_target(&stream)? {
            IoTarget::Device(dev) => Ok(dev.write(offset, buf)),
            IoTarget::Resource { fs, handle } => {
                if fs.read_only() {
                    return Err(FsError::ReadOnlyFs);
                }
                if !handle.flags().contains(ResourceFlags::WRITE) {
                    return Err(FsError::PermissionDenied);
                }
                let offset = if stream.mode.contains(OpenMode::APPEND) {
                    handle.meta_read(MetaKey::Size)
                } else {
                    offset
                };
                Ok(handle.write_at(offset, buf))
            }
            IoTarget::File { name, handler } => Ok(handler.write(&name, offset, buf)),
        }
    }

    /// 读取流对应文件的元数据
    ///
    /// 只有挂载文件系统中的文件支持；目录资源、设备与合成文件返回 [`FsError::NotSupported`]。
    pub fn file_info(&self, id: StreamId, info: FileInfo) -> Result<u64, FsError> {
        let stream = self.streams.get(id).ok_or(FsError::BadStream)?;
        match self.io_target(&stream)? {
            IoTarget::Resource { handle, .. } if !handle.flags().contains(ResourceFlags::BROWSE) => {
                Ok(handle.meta_read(MetaKey::from(info)))
            }
            _ => Err(FsError::NotSupported),
        }
    }

    // ========== 统计 ==========

    /// 打开的内核流数量
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    /// 缓存中已加载的资源数量
    pub fn cached_resources(&self) -> usize {
        self.cache.lock().cached_len()
    }

    /// 资源缓存累计的 `load` 与驱逐次数
    pub fn cache_stats(&self) -> (u64, u64) {
        let cache = self.cache.lock();
        (cache.loads(), cache.evictions())
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}
