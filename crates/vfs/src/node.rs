//! 命名空间树
//!
//! 内存中的节点图，表示整个路径层次。节点存放在 [`Arena`] 中，父节点、首个子节点、
//! 下一个兄弟节点都用 [`NodeId`] 表示；根节点的父节点指向自己。
//!
//! 路径解析是逐段线性扫描子节点链表，复杂度 O(深度 × 平均扇出)，不建索引。
//! 同一目录下不允许重名，插入时检查。

use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arena::{Arena, ArenaId};
use crate::config::{DEV_DIR, MOUNT_DIR, SYSINF_DIR};
use crate::path::{join_path, parse_path};
use crate::{Device, FileSystem, FsError, ResourceId};

/// 命名空间节点标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(ArenaId);

/// 合成文件的处理函数
///
/// 合成文件（例如 `/sysinf` 下的条目）没有后备存储，I/O 直接交给注册的处理函数，
/// 第一个参数是节点名。
pub trait SyntheticFile: Send + Sync {
    /// 处理写入，返回写入的字节数
    fn write(&self, name: &str, offset: u64, buf: &[u8]) -> usize;

    /// 处理读取，返回读取的字节数；只写的处理函数保持默认实现
    fn read(&self, _name: &str, _offset: u64, _buf: &mut [u8]) -> usize {
        0
    }
}

/// 挂载节点的负载
#[derive(Clone)]
pub struct MountPoint {
    /// 文件系统句柄
    pub fs: Arc<dyn FileSystem>,
    /// 文件系统根目录在资源缓存中的条目
    pub root: ResourceId,
}

/// 节点类型及其负载
#[derive(Clone)]
pub enum NodeKind {
    /// 目录
    Directory,
    /// 设备节点
    Device(Arc<dyn Device>),
    /// 挂载的文件系统实例
    Mount(MountPoint),
    /// 合成文件
    File(Arc<dyn SyntheticFile>),
    /// 链接，指向另一个节点
    Link(NodeId),
}

/// 节点类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// 目录
    Directory,
    /// 设备
    Device,
    /// 挂载点
    Mount,
    /// 合成文件
    File,
    /// 链接
    Link,
}

impl NodeKind {
    /// 类型标签
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Directory => NodeType::Directory,
            NodeKind::Device(_) => NodeType::Device,
            NodeKind::Mount(_) => NodeType::Mount,
            NodeKind::File(_) => NodeType::File,
            NodeKind::Link(_) => NodeType::Link,
        }
    }
}

/// 命名空间节点
pub struct Node {
    name: String,
    parent: NodeId,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    /// 当前附着在此节点上的流数量
    ref_count: AtomicUsize,
    kind: NodeKind,
}

impl Node {
    /// 节点名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 父节点；根节点返回自身
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// 节点负载
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// 节点类型
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// 引用计数
    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    /// 是否有子节点
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    pub(crate) fn pin(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn unpin(&self) {
        let prev = self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        debug_assert!(prev > 0, "vfs: node '{}' unpinned below zero", self.name);
    }
}

/// 命名空间树
pub struct NamespaceTree {
    nodes: Arena<Node>,
    root: NodeId,
}

impl NamespaceTree {
    /// 创建命名空间：根目录以及固定的 `dev`、`sysinf`、`mount` 子目录
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = NodeId(nodes.insert(Node {
            name: String::from("/"),
            parent: NodeId(ArenaId::default()),
            first_child: None,
            next_sibling: None,
            ref_count: AtomicUsize::new(0),
            kind: NodeKind::Directory,
        }));
        if let Some(node) = nodes.get_mut(root.0) {
            node.parent = root;
        }

        let mut tree = Self { nodes, root };
        // 固定目录名互不相同，插入不会失败
        for dir in [DEV_DIR, SYSINF_DIR, MOUNT_DIR] {
            let _ = tree.insert(root, dir, NodeKind::Directory);
        }
        tree
    }

    /// 根节点
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 节点数
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 是否为空（根节点总是存在，因此恒为 false）
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 获取节点
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// 节点是否存在
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// 按兄弟顺序遍历子节点
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|node| node.first_child),
        }
    }

    /// 在子节点中查找名字完全匹配的节点
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .find(|&child| self.get(child).is_some_and(|node| node.name == name))
    }

    /// 精确解析：每一段都必须匹配，否则返回 [`FsError::NotFound`]
    pub fn resolve_exact(&self, path: &str) -> Result<NodeId, FsError> {
        parse_path(path)
            .into_iter()
            .try_fold(self.root, |node, seg| {
                self.find_child(node, seg).ok_or(FsError::NotFound)
            })
    }

    /// 部分解析：尽可能向下匹配，返回最深的匹配节点以及未匹配的剩余路径
    ///
    /// 剩余路径不带前导分隔符；整条路径都匹配时为空串。
    pub fn resolve_partial(&self, path: &str) -> (NodeId, String) {
        self.resolve_partial_from(self.root, path)
    }

    /// 从指定节点开始部分解析
    pub fn resolve_partial_from(&self, start: NodeId, path: &str) -> (NodeId, String) {
        let segments = parse_path(path);
        let mut node = start;
        let mut matched = 0;
        for seg in &segments {
            match self.find_child(node, seg) {
                Some(child) => {
                    node = child;
                    matched += 1;
                }
                None => break,
            }
        }
        (node, join_path(&segments[matched..]))
    }

    /// 节点的绝对路径
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = alloc::vec::Vec::new();
        let mut cur = id;
        while cur != self.root {
            let Some(node) = self.get(cur) else { break };
            segments.push(node.name.as_str());
            cur = node.parent;
        }
        segments.reverse();
        String::from("/") + &join_path(&segments)
    }

    /// 检查能否在 `parent` 下创建名为 `name` 的节点
    pub fn check_insert(&self, parent: NodeId, name: &str) -> Result<(), FsError> {
        if name.is_empty() || name.contains(crate::path::SEPARATOR) {
            return Err(FsError::InvalidArgument);
        }
        let node = self.get(parent).ok_or(FsError::NotFound)?;
        if node.node_type() != NodeType::Directory {
            return Err(FsError::NotDirectory);
        }
        if self.find_child(parent, name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        Ok(())
    }

    /// 在目录 `parent` 下创建子节点，追加到兄弟链表末尾
    pub fn insert(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, FsError> {
        self.check_insert(parent, name)?;
        let last = self.children(parent).last();
        let id = NodeId(self.nodes.insert(Node {
            name: String::from(name),
            parent,
            first_child: None,
            next_sibling: None,
            ref_count: AtomicUsize::new(0),
            kind,
        }));

        self.relink(parent, last, Some(id));
        Ok(id)
    }

    /// 从树中摘除叶子节点并释放
    ///
    /// 根节点、仍有子节点或仍被流引用的节点都会被拒绝。
    pub fn unlink(&mut self, id: NodeId) -> Result<Node, FsError> {
        if id == self.root {
            return Err(FsError::InvalidArgument);
        }
        let node = self.get(id).ok_or(FsError::NotFound)?;
        if node.ref_count() > 0 || node.has_children() {
            return Err(FsError::Busy);
        }
        let parent = node.parent;
        let next = node.next_sibling;

        // 找到指向 id 的那个链接：父节点的 first_child 或前驱的 next_sibling
        let prev = self.children(parent).take_while(|&c| c != id).last();
        self.relink(parent, prev, next);

        self.nodes.remove(id.0).ok_or(FsError::NotFound)
    }

    /// 改写 `prev` 的兄弟指针；`prev` 为空时改写 `parent` 的首子节点指针
    fn relink(&mut self, parent: NodeId, prev: Option<NodeId>, target: Option<NodeId>) {
        match prev {
            Some(prev) => {
                if let Some(node) = self.nodes.get_mut(prev.0) {
                    node.next_sibling = target;
                }
            }
            None => {
                if let Some(node) = self.nodes.get_mut(parent.0) {
                    node.first_child = target;
                }
            }
        }
    }
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

/// 子节点迭代器
pub struct Children<'a> {
    tree: &'a NamespaceTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.get(cur).and_then(|node| node.next_sibling);
        Some(cur)
    }
}
