use super::*;
use crate::{FileSystem, FsError, FsResource, ResourceCache, ResourceId};
use alloc::vec::Vec;

fn loaded_roots(cache: &mut ResourceCache, count: usize) -> Vec<(ResourceId, Arc<MemResource>)> {
    (0..count)
        .map(|i| {
            let res = MemResource::file(&alloc::format!("f{}", i), b"");
            let id = cache.insert_root(res.clone() as Arc<dyn FsResource>);
            cache.ensure_loaded(id).unwrap();
            (id, res)
        })
        .collect()
}

#[test]
fn test_double_load_pins_twice() {
    let mut cache = ResourceCache::new(4);
    let res = MemResource::file("a", b"");
    let id = cache.insert_root(res.clone());

    cache.ensure_loaded(id).unwrap();
    cache.ensure_loaded(id).unwrap();

    assert_eq!(res.load_count(), 1);
    assert_eq!(cache.get(id).unwrap().stream_cnt(), 2);
    assert_eq!(cache.cached_len(), 1);
    assert_eq!(cache.loads(), 1);
}

#[test]
fn test_release_floors_at_zero() {
    let mut cache = ResourceCache::new(4);
    let id = cache.insert_root(MemResource::file("a", b""));
    cache.ensure_loaded(id).unwrap();
    cache.release(id);
    cache.release(id);
    assert_eq!(cache.get(id).unwrap().stream_cnt(), 0);
    // 释放不会卸载
    assert!(cache.is_cached(id));
}

#[test]
fn test_full_cache_evicts_exactly_one() {
    let mut cache = ResourceCache::new(3);
    let roots = loaded_roots(&mut cache, 3);
    for (id, _) in &roots {
        cache.release(*id);
    }
    assert_eq!(cache.cached_len(), 3);

    let extra = MemResource::file("extra", b"");
    let extra_id = cache.insert_root(extra.clone());
    cache.ensure_loaded(extra_id).unwrap();

    assert_eq!(cache.evictions(), 1);
    assert_eq!(cache.cached_len(), 3);
    assert!(cache.is_cached(extra_id));
    // 按加载顺序，最早的那个被驱逐
    assert!(!cache.is_cached(roots[0].0));
    assert_eq!(roots[0].1.unload_count(), 1);
    assert!(cache.is_cached(roots[1].0));
    assert!(cache.is_cached(roots[2].0));
}

#[test]
fn test_eviction_skips_pinned_entries() {
    let mut cache = ResourceCache::new(3);
    let roots = loaded_roots(&mut cache, 3);
    // 只释放第二个
    cache.release(roots[1].0);

    let extra_id = cache.insert_root(MemResource::file("extra", b""));
    cache.ensure_loaded(extra_id).unwrap();

    assert!(cache.is_cached(roots[0].0));
    assert!(!cache.is_cached(roots[1].0));
    assert!(cache.is_cached(roots[2].0));
    assert_eq!(roots[0].1.unload_count(), 0);
}

#[test]
fn test_exhausted_cache_does_not_load() {
    let mut cache = ResourceCache::new(2);
    let _roots = loaded_roots(&mut cache, 2);

    let extra = MemResource::file("extra", b"");
    let extra_id = cache.insert_root(extra.clone());
    assert_eq!(cache.ensure_loaded(extra_id), Err(FsError::CacheExhausted));
    assert_eq!(extra.load_count(), 0);
    assert_eq!(cache.cached_len(), 2);
    assert_eq!(cache.evictions(), 0);
}

#[test]
fn test_refused_unload_keeps_victim() {
    let mut cache = ResourceCache::new(1);
    let roots = loaded_roots(&mut cache, 1);
    cache.release(roots[0].0);
    roots[0]
        .1
        .fail_unload
        .store(true, core::sync::atomic::Ordering::SeqCst);

    let extra_id = cache.insert_root(MemResource::file("extra", b""));
    assert_eq!(cache.ensure_loaded(extra_id), Err(FsError::CacheExhausted));
    assert!(cache.is_cached(roots[0].0));
}

#[test]
fn test_failed_load_leaves_resource_unloaded() {
    let mut cache = ResourceCache::new(2);
    let res = MemResource::file("a", b"");
    res.fail_load.store(true, core::sync::atomic::Ordering::SeqCst);
    let id = cache.insert_root(res.clone());

    assert_eq!(cache.ensure_loaded(id), Err(FsError::DriverFailure));
    assert!(!cache.is_cached(id));
    assert_eq!(cache.get(id).unwrap().stream_cnt(), 0);
    assert_eq!(cache.cached_len(), 0);
}

#[test]
fn test_resolve_pins_every_level() {
    let mut cache = ResourceCache::new(8);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());

    let readme = cache.resolve(root, "docs/readme").unwrap();
    let docs = cache.get(readme).unwrap().parent().unwrap();
    assert_eq!(cache.get(readme).unwrap().name(), "readme");
    assert_eq!(cache.get(readme).unwrap().stream_cnt(), 1);
    assert_eq!(cache.get(docs).unwrap().stream_cnt(), 1);
    assert_eq!(cache.get(root).unwrap().stream_cnt(), 1);

    // 第二次解析只增加计数
    let again = cache.resolve(root, "/docs//readme").unwrap();
    assert_eq!(again, readme);
    assert_eq!(cache.get(root).unwrap().stream_cnt(), 2);
    assert_eq!(fs.root_resource().load_count(), 1);

    // 释放沿父链级联
    cache.release(readme);
    cache.release(readme);
    for id in [readme, docs, root] {
        assert_eq!(cache.get(id).unwrap().stream_cnt(), 0);
    }
}

#[test]
fn test_resolve_failure_releases_partial_pins() {
    let mut cache = ResourceCache::new(8);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());

    assert_eq!(cache.resolve(root, "docs/missing"), Err(FsError::NotFound));
    assert_eq!(cache.get(root).unwrap().stream_cnt(), 0);
    assert!(!cache.subtree_pinned(root));

    // 中途加载失败同样回退
    let docs = fs.root_resource().child("docs");
    docs.child("readme")
        .fail_load
        .store(true, core::sync::atomic::Ordering::SeqCst);
    assert_eq!(
        cache.resolve(root, "docs/readme"),
        Err(FsError::DriverFailure)
    );
    assert!(!cache.subtree_pinned(root));
}

#[test]
fn test_evicting_parent_detaches_descendants() {
    let mut cache = ResourceCache::new(3);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());
    let readme = cache.resolve(root, "docs/readme").unwrap();
    let docs = cache.get(readme).unwrap().parent().unwrap();
    cache.release(readme);
    assert_eq!(cache.cached_len(), 3);

    let other = MemResource::file("other", b"");
    let other_id = cache.insert_root(other.clone());
    cache.ensure_loaded(other_id).unwrap();

    // 挂载根被驱逐，其已缓存的子孙一并摘除
    assert_eq!(cache.evictions(), 1);
    assert_eq!(cache.cached_len(), 1);
    assert!(cache.is_cached(other_id));
    assert!(!cache.is_cached(root));
    assert!(cache.get(root).is_some());
    assert!(cache.get(docs).is_none());
    assert!(cache.get(readme).is_none());

    // 重新解析会重新枚举并加载
    cache.release(other_id);
    let readme2 = cache.resolve(root, "docs/readme").unwrap();
    assert_ne!(readme2, readme);
    assert_eq!(fs.root_resource().load_count(), 2);
    assert!(!cache.is_cached(other_id));
    assert_eq!(other.unload_count(), 1);
}

#[test]
fn test_eviction_never_picks_ancestor_of_target() {
    let mut cache = ResourceCache::new(1);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());
    cache.ensure_loaded(root).unwrap();
    let log = cache.child_named(root, "log").unwrap();
    cache.release(root);

    // 唯一的候选是目标的父资源，不能驱逐
    assert_eq!(cache.ensure_loaded(log), Err(FsError::CacheExhausted));
    assert!(cache.is_cached(root));
}

#[test]
fn test_cache_never_exceeds_capacity() {
    let capacity = 4;
    let mut cache = ResourceCache::new(capacity);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());

    for path in ["kernel", "log", "docs/readme", "ro", "kernel", "docs", "log"] {
        if let Ok(id) = cache.resolve(root, path) {
            cache.release(id);
        }
        assert!(cache.cached_len() <= capacity);
    }
}

#[test]
fn test_purge_refuses_pinned_subtree() {
    let mut cache = ResourceCache::new(8);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());
    let readme = cache.resolve(root, "docs/readme").unwrap();

    assert_eq!(cache.purge(root), Err(FsError::Busy));
    cache.release(readme);
    assert_eq!(cache.purge(root), Ok(6));
    assert_eq!(cache.cached_len(), 0);
    assert!(cache.get(root).is_none());
}

#[test]
fn test_pin_chain_requires_loaded_resources() {
    let mut cache = ResourceCache::new(8);
    let fs = sample_fs(false);
    let root = cache.insert_root(fs.root());
    let readme = cache.resolve(root, "docs/readme").unwrap();

    cache.pin_chain(readme).unwrap();
    assert_eq!(cache.get(root).unwrap().stream_cnt(), 2);

    let unloaded = cache.insert_root(MemResource::file("x", b""));
    assert_eq!(cache.pin_chain(unloaded), Err(FsError::BadStream));
}
