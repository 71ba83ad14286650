//! 资源缓存
//!
//! 资源是挂载文件系统内某个文件或目录在内存中的表示（类似 inode），由驱动负责
//! `load`/`unload`。缓存保证：
//!
//! - 同一资源同时最多只有一次有效的 `load`，已加载的资源只增加钉住计数；
//! - 已加载资源的数量不超过容量；
//! - 驱逐时只选择 `stream_cnt == 0` 的资源，且连同其子孙一起从缓存中摘除，
//!   因为祖先被卸载后子孙的驱动内存随之失效。
//!
//! 钉住计数沿父链级联：路径解析每经过一层就钉住一次，释放时从叶子一路减到挂载根。
//!
//! 驱动的 `load`/`unload`/`children` 可能等待设备中断，调用前必须释放缓存锁。
//! 资源在调用期间处于 `Loading`/`Unloading` 状态，其他线程遇到这两种状态时放开锁自旋等待，
//! 因此仍然保证同一资源同时只有一次 `load`。调用者需在整个解析期间持有命名空间树的读锁，
//! 卸载挂载（持写锁）因而不会看到处于中间状态的资源。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::hint;
use hashbrown::HashSet;
use sync::SpinLock;

use crate::arena::{Arena, ArenaId};
use crate::path::parse_path;
use crate::{FsError, FsResource};

/// 资源标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(ArenaId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceState {
    Unloaded,
    /// 驱动 `load` 进行中，已占用一个缓存位置
    Loading,
    Loaded,
    /// 作为驱逐对象，驱动 `unload` 进行中
    Unloading,
}

/// 缓存中的一个资源
pub struct Resource {
    name: String,
    parent: Option<ResourceId>,
    /// 已枚举出的子资源；未加载或尚未枚举时为 `None`
    children: Option<Vec<ResourceId>>,
    state: ResourceState,
    stream_cnt: usize,
    handle: Arc<dyn FsResource>,
}

impl Resource {
    fn new(handle: Arc<dyn FsResource>, parent: Option<ResourceId>) -> Self {
        Self {
            name: String::from(handle.name()),
            parent,
            children: None,
            state: ResourceState::Unloaded,
            stream_cnt: 0,
            handle,
        }
    }

    /// 资源名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 父资源；挂载根返回 `None`
    pub fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    /// 是否已加载
    pub fn is_loaded(&self) -> bool {
        self.state == ResourceState::Loaded
    }

    /// 钉住计数
    pub fn stream_cnt(&self) -> usize {
        self.stream_cnt
    }

    /// 驱动句柄
    pub fn handle(&self) -> &Arc<dyn FsResource> {
        &self.handle
    }
}

/// 有界资源缓存
pub struct ResourceCache {
    capacity: usize,
    resources: Arena<Resource>,
    /// 已加载（或正在加载、正在卸载）的资源，按加载顺序排列
    cached: Vec<ResourceId>,
    loads: u64,
    evictions: u64,
}

/// 加锁一步之后，调用者在锁外要做的事
enum LoadStep {
    /// 已加载，只增加了计数
    Pinned,
    /// 其他线程正在加载或卸载该资源
    Wait,
    Load(Arc<dyn FsResource>),
    /// 先卸载这个驱逐对象腾出位置
    Unload(ResourceId, Arc<dyn FsResource>),
}

enum ChildLookup {
    Found(ResourceId),
    /// 子项尚未枚举
    Enumerate(Arc<dyn FsResource>),
}

/// 访问缓存的方式：独占引用，或经由自旋锁每一步单独加锁
pub(crate) trait CacheAccess {
    fn with<R>(&mut self, f: impl FnOnce(&mut ResourceCache) -> R) -> R;
}

impl CacheAccess for ResourceCache {
    fn with<R>(&mut self, f: impl FnOnce(&mut ResourceCache) -> R) -> R {
        f(self)
    }
}

impl CacheAccess for &SpinLock<ResourceCache> {
    fn with<R>(&mut self, f: impl FnOnce(&mut ResourceCache) -> R) -> R {
        f(&mut *self.lock())
    }
}

impl ResourceCache {
    /// 创建指定容量的缓存
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            resources: Arena::new(),
            cached: Vec::new(),
            loads: 0,
            evictions: 0,
        }
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 占用缓存位置的资源数
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    /// 累计 `load` 调用次数（成功的）
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// 累计驱逐次数
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// 获取资源
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0)
    }

    /// 资源是否仍在缓存中（已加载）
    pub fn is_cached(&self, id: ResourceId) -> bool {
        self.get(id).is_some_and(|res| res.is_loaded())
    }

    /// 为新挂载的文件系统登记根资源（未加载）
    pub fn insert_root(&mut self, handle: Arc<dyn FsResource>) -> ResourceId {
        ResourceId(self.resources.insert(Resource::new(handle, None)))
    }

    /// 确保资源已加载并钉住一次
    ///
    /// 已加载时只增加计数，不调用驱动。缓存已满时先驱逐一个未被钉住的资源，
    /// 没有可驱逐的资源则返回 [`FsError::CacheExhausted`]。
    pub fn ensure_loaded(&mut self, id: ResourceId) -> Result<(), FsError> {
        load_pinned(self, id)
    }

    /// 在已加载的 `parent` 下按名字查找子资源，必要时先向驱动枚举
    pub fn child_named(&mut self, parent: ResourceId, name: &str) -> Result<ResourceId, FsError> {
        find_child(self, parent, name)
    }

    /// 从挂载根出发解析剩余路径，返回目标资源
    ///
    /// 成功时路径上每一层都被钉住一次，调用者之后用 [`ResourceCache::release`] 释放；
    /// 失败时已经钉住的部分全部回退。
    pub fn resolve(&mut self, root: ResourceId, remainder: &str) -> Result<ResourceId, FsError> {
        resolve_path(self, root, remainder)
    }

    /// 同 [`ResourceCache::resolve`]，但只在操作缓存时持锁，驱动回调在锁外进行
    pub fn resolve_shared(
        cache: &SpinLock<Self>,
        root: ResourceId,
        remainder: &str,
    ) -> Result<ResourceId, FsError> {
        let mut access = cache;
        resolve_path(&mut access, root, remainder)
    }

    fn begin_load(&mut self, id: ResourceId, refused: &[ResourceId]) -> Result<LoadStep, FsError> {
        let res = self.resources.get_mut(id.0).ok_or(FsError::NotFound)?;
        match res.state {
            ResourceState::Loaded => {
                res.stream_cnt += 1;
                return Ok(LoadStep::Pinned);
            }
            ResourceState::Loading | ResourceState::Unloading => return Ok(LoadStep::Wait),
            ResourceState::Unloaded => {}
        }

        if self.cached.len() >= self.capacity {
            if let Some(victim) = self.pick_victim(id, refused) {
                let res = self.resources.get_mut(victim.0).ok_or(FsError::NotFound)?;
                res.state = ResourceState::Unloading;
                return Ok(LoadStep::Unload(victim, res.handle.clone()));
            }
            // 另一个线程的驱逐完成后会空出位置
            if self.cached.iter().any(|&rid| {
                self.get(rid)
                    .is_some_and(|res| res.state == ResourceState::Unloading)
            }) {
                return Ok(LoadStep::Wait);
            }
            log::warn!("vfs: resource cache exhausted ({} pinned)", self.cached.len());
            return Err(FsError::CacheExhausted);
        }

        let res = self.resources.get_mut(id.0).ok_or(FsError::NotFound)?;
        res.state = ResourceState::Loading;
        res.stream_cnt = 1;
        let handle = res.handle.clone();
        self.cached.push(id);
        Ok(LoadStep::Load(handle))
    }

    fn finish_load(&mut self, id: ResourceId, loaded: bool) -> Result<(), FsError> {
        let res = self.resources.get_mut(id.0).ok_or(FsError::NotFound)?;
        if loaded {
            res.state = ResourceState::Loaded;
            self.loads += 1;
            return Ok(());
        }
        res.state = ResourceState::Unloaded;
        res.stream_cnt = 0;
        log::warn!("vfs: failed to load resource '{}'", res.name);
        self.cached.retain(|&rid| rid != id);
        Err(FsError::DriverFailure)
    }

    /// 驱逐候选：未被钉住、子树也未被钉住，且不是 `keep` 及其祖先
    fn pick_victim(&self, keep: ResourceId, refused: &[ResourceId]) -> Option<ResourceId> {
        self.cached.iter().copied().find(|&id| {
            !refused.contains(&id)
                && self.get(id).is_some_and(|res| {
                    res.state == ResourceState::Loaded && res.stream_cnt == 0
                })
                && !self.is_ancestor_or_self(id, keep)
                && !self.subtree_pinned(id)
        })
    }

    /// 驱逐对象 `unload` 返回之后：成功则连同子孙一起摘除，失败则恢复为已加载
    fn finish_unload(&mut self, victim: ResourceId, unloaded: bool) {
        let Some(res) = self.resources.get_mut(victim.0) else {
            return;
        };
        if !unloaded {
            res.state = ResourceState::Loaded;
            log::warn!("vfs: driver refused to unload '{}'", res.name);
            return;
        }

        let mut doomed = HashSet::new();
        self.collect_descendants(victim, &mut doomed);
        doomed.insert(victim);
        self.cached.retain(|id| !doomed.contains(id));
        doomed.remove(&victim);
        for id in &doomed {
            self.resources.remove(id.0);
        }
        if let Some(res) = self.resources.get_mut(victim.0) {
            res.state = ResourceState::Unloaded;
            res.children = None;
            log::debug!(
                "vfs: evicted resource '{}' with {} descendants",
                res.name,
                doomed.len()
            );
        }
        self.evictions += 1;
    }

    fn is_ancestor_or_self(&self, ancestor: ResourceId, mut id: ResourceId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.get(id).and_then(|res| res.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn collect_descendants(&self, id: ResourceId, out: &mut HashSet<ResourceId>) {
        let mut stack = Vec::from([id]);
        while let Some(cur) = stack.pop() {
            let Some(children) = self.get(cur).and_then(|res| res.children.as_ref()) else {
                continue;
            };
            for &child in children {
                if out.insert(child) {
                    stack.push(child);
                }
            }
        }
    }

    /// 释放一次钉住：从 `id` 沿父链到挂载根，每层计数减一（不低于 0）
    pub fn release(&mut self, id: ResourceId) {
        let mut cur = Some(id);
        while let Some(rid) = cur {
            let Some(res) = self.resources.get_mut(rid.0) else {
                break;
            };
            res.stream_cnt = res.stream_cnt.saturating_sub(1);
            cur = res.parent;
        }
    }

    /// 沿父链再钉住一次，用于复制已有的流
    ///
    /// 链上的资源必须都已加载。
    pub fn pin_chain(&mut self, id: ResourceId) -> Result<(), FsError> {
        let mut chain = Vec::new();
        let mut cur = Some(id);
        while let Some(rid) = cur {
            let res = self.get(rid).ok_or(FsError::BadStream)?;
            if !res.is_loaded() {
                return Err(FsError::BadStream);
            }
            chain.push(rid);
            cur = res.parent;
        }
        for rid in chain {
            if let Some(res) = self.resources.get_mut(rid.0) {
                res.stream_cnt += 1;
            }
        }
        Ok(())
    }

    fn lookup_child(&self, parent: ResourceId, name: &str) -> Result<ChildLookup, FsError> {
        let res = self.get(parent).ok_or(FsError::NotFound)?;
        if !res.is_loaded() {
            return Err(FsError::NotFound);
        }
        let Some(children) = res.children.as_ref() else {
            return Ok(ChildLookup::Enumerate(res.handle.clone()));
        };
        children
            .iter()
            .copied()
            .find(|&child| self.get(child).is_some_and(|res| res.name == name))
            .map(ChildLookup::Found)
            .ok_or(FsError::NotFound)
    }

    /// 登记枚举结果；其他线程先一步登记过时丢弃本次结果
    fn install_children(&mut self, parent: ResourceId, handles: Vec<Arc<dyn FsResource>>) {
        if !self
            .get(parent)
            .is_some_and(|res| res.is_loaded() && res.children.is_none())
        {
            return;
        }
        let ids = handles
            .into_iter()
            .map(|handle| ResourceId(self.resources.insert(Resource::new(handle, Some(parent)))))
            .collect();
        if let Some(res) = self.resources.get_mut(parent.0) {
            res.children = Some(ids);
        }
    }

    /// 子树中是否有被钉住的资源
    pub fn subtree_pinned(&self, root: ResourceId) -> bool {
        let mut subtree = HashSet::new();
        self.collect_descendants(root, &mut subtree);
        subtree.insert(root);
        subtree
            .iter()
            .any(|&id| self.get(id).is_some_and(|res| res.stream_cnt > 0))
    }

    /// 卸载挂载时清除整棵资源子树，返回清除的数量
    ///
    /// 子树中有资源被钉住时返回 [`FsError::Busy`]，不做任何修改。
    pub fn purge(&mut self, root: ResourceId) -> Result<usize, FsError> {
        if self.subtree_pinned(root) {
            return Err(FsError::Busy);
        }
        let mut doomed = HashSet::new();
        self.collect_descendants(root, &mut doomed);
        doomed.insert(root);
        self.cached.retain(|id| !doomed.contains(id));
        for id in &doomed {
            self.resources.remove(id.0);
        }
        Ok(doomed.len())
    }
}

fn load_pinned<A: CacheAccess>(access: &mut A, id: ResourceId) -> Result<(), FsError> {
    // 拒绝卸载的驱逐对象不再重选
    let mut refused: Vec<ResourceId> = Vec::new();
    loop {
        match access.with(|cache| cache.begin_load(id, &refused))? {
            LoadStep::Pinned => return Ok(()),
            LoadStep::Wait => hint::spin_loop(),
            LoadStep::Load(handle) => {
                let loaded = handle.load();
                return access.with(|cache| cache.finish_load(id, loaded));
            }
            LoadStep::Unload(victim, handle) => {
                let unloaded = handle.unload();
                access.with(|cache| cache.finish_unload(victim, unloaded));
                if !unloaded {
                    refused.push(victim);
                }
            }
        }
    }
}

fn find_child<A: CacheAccess>(access: &mut A, parent: ResourceId, name: &str) -> Result<ResourceId, FsError> {
    let handle = match access.with(|cache| cache.lookup_child(parent, name))? {
        ChildLookup::Found(id) => return Ok(id),
        ChildLookup::Enumerate(handle) => handle,
    };
    let handles = handle.children();
    match access.with(|cache| {
        cache.install_children(parent, handles);
        cache.lookup_child(parent, name)
    })? {
        ChildLookup::Found(id) => Ok(id),
        ChildLookup::Enumerate(_) => Err(FsError::NotFound),
    }
}

fn resolve_path<A: CacheAccess>(access: &mut A, root: ResourceId, remainder: &str) -> Result<ResourceId, FsError> {
    load_pinned(access, root)?;
    let mut walk = PinnedWalk {
        access,
        tip: Some(root),
    };

    let mut cur = root;
    for seg in parse_path(remainder) {
        let child = find_child(&mut *walk.access, cur, seg)?;
        load_pinned(&mut *walk.access, child)?;
        walk.tip = Some(child);
        cur = child;
    }
    walk.tip = None;
    Ok(cur)
}

/// 一次路径解析期间的钉住记录
///
/// 析构时若 `tip` 仍然存在，说明解析中途失败，沿父链释放已钉住的部分。
struct PinnedWalk<'a, A: CacheAccess> {
    access: &'a mut A,
    tip: Option<ResourceId>,
}

impl<A: CacheAccess> Drop for PinnedWalk<'_, A> {
    fn drop(&mut self) {
        if let Some(tip) = self.tip.take() {
            self.access.with(|cache| cache.release(tip));
        }
    }
}
