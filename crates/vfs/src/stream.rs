//! 内核流表
//!
//! 全局的 流 id → [`Stream`] 映射，由一把自旋锁保护读写。
//!
//! id 从上次分配的值向上扫描，跳过保留的 [`INVALID_STREAM`] 以及仍在使用中的 id，
//! 因此在回绕之后依旧唯一。

use core::fmt;
use hashbrown::HashMap;
use sync::SpinLock;
use uapi::vfs::{INVALID_STREAM, OpenMode};

use crate::{NodeId, ResourceId};

/// 流 id
pub type StreamId = u64;

/// 内核级打开文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    /// 流 id
    pub id: StreamId,
    /// 打开时授予的访问模式
    pub mode: OpenMode,
    /// 流钉住的命名空间节点
    pub node: NodeId,
    /// 挂载节点上的流钉住的资源
    pub resource: Option<ResourceId>,
}

struct StreamMap {
    streams: HashMap<StreamId, Stream>,
    last_id: StreamId,
}

/// 内核流表
pub struct StreamTable {
    inner: SpinLock<StreamMap>,
}

impl fmt::Debug for StreamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StreamTable")
            .field("open", &inner.streams.len())
            .field("last_id", &inner.last_id)
            .finish()
    }
}

impl StreamTable {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            inner: SpinLock::new(StreamMap {
                streams: HashMap::new(),
                last_id: INVALID_STREAM,
            }),
        }
    }

    /// 分配新 id 并登记流
    pub fn insert(&self, mode: OpenMode, node: NodeId, resource: Option<ResourceId>) -> StreamId {
        let mut inner = self.inner.lock();
        let mut id = inner.last_id;
        loop {
            id = id.wrapping_add(1);
            if id != INVALID_STREAM && !inner.streams.contains_key(&id) {
                break;
            }
        }
        inner.last_id = id;
        inner.streams.insert(
            id,
            Stream {
                id,
                mode,
                node,
                resource,
            },
        );
        id
    }

    /// 查找流
    pub fn get(&self, id: StreamId) -> Option<Stream> {
        self.inner.lock().streams.get(&id).copied()
    }

    /// 移除流
    pub fn remove(&self, id: StreamId) -> Option<Stream> {
        self.inner.lock().streams.remove(&id)
    }

    /// 打开的流数量
    pub fn len(&self) -> usize {
        self.inner.lock().streams.len()
    }

    /// 表是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否有流附着在指定节点上
    pub fn references_node(&self, node: NodeId) -> bool {
        self.inner
            .lock()
            .streams
            .values()
            .any(|stream| stream.node == node)
    }

    /// 将上次分配的 id 设为指定值，下一次分配从其后继开始
    #[cfg(test)]
    pub(crate) fn set_last_id(&self, id: StreamId) {
        self.inner.lock().last_id = id;
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        Self::new()
    }
}
