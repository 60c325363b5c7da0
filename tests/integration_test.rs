//! End-to-end scenarios against a real temporary cache directory.

use std::time::Duration;

use bytes::Bytes;
use rangecache::{CacheConfig, ReadRequest, RemotePath};
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig::new(dir)
        .with_max_cached_entries(8)
        .with_cache_ttl(Duration::from_secs(60))
        .with_max_in_memory_cache_size(1024 * 1024)
}

async fn wait_for_quiescence() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// S1: a fresh put followed by a get for the same range is a hit.
#[tokio::test]
async fn s1_fresh_put_then_get_hits() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-a");
    let request = ReadRequest::new(path.clone(), 0, 10).expect("request");
    manager.put(&request, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    let mut buf = vec![0u8; 10];
    assert!(manager.get(&request, &mut buf, 0));
    assert_eq!(&buf, b"0123456789");
    assert_eq!(manager.stats().hits, 1);
}

// S2: a get whose range only partially overlaps a cached entry is a miss.
#[tokio::test]
async fn s2_partial_hit_fails() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-b");
    let put_request = ReadRequest::new(path.clone(), 10, 10).expect("request");
    manager.put(&put_request, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    // Requests [5, 15) and [15, 25) both straddle the cached [10, 20) range.
    let straddle_left = ReadRequest::new(path.clone(), 5, 10).expect("request");
    let straddle_right = ReadRequest::new(path.clone(), 15, 10).expect("request");
    let mut buf = vec![0u8; 10];
    assert!(!manager.get(&straddle_left, &mut buf, 0));
    assert!(!manager.get(&straddle_right, &mut buf, 0));
}

// S3: a put adjacent to an existing range merges into one contiguous entry.
#[tokio::test]
async fn s3_forward_merge() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-c");
    let first = ReadRequest::new(path.clone(), 0, 10).expect("request");
    manager.put(&first, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    let second = ReadRequest::new(path.clone(), 10, 10).expect("request");
    manager.put(&second, Bytes::from_static(b"abcdefghij"));
    wait_for_quiescence().await;

    let union = ReadRequest::new(path, 0, 20).expect("request");
    let mut buf = vec![0u8; 20];
    assert!(manager.get(&union, &mut buf, 0));
    assert_eq!(&buf, b"0123456789abcdefghij");
}

// S4: a put that overlaps an existing range supersedes the overlapped bytes.
#[tokio::test]
async fn s4_overlapping_put_supersedes() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-d");
    let first = ReadRequest::new(path.clone(), 0, 10).expect("request");
    manager.put(&first, Bytes::from_static(b"AAAAAAAAAA"));
    wait_for_quiescence().await;

    let second = ReadRequest::new(path.clone(), 5, 10).expect("request");
    manager.put(&second, Bytes::from_static(b"BBBBBBBBBB"));
    wait_for_quiescence().await;

    let union = ReadRequest::new(path, 0, 15).expect("request");
    let mut buf = vec![0u8; 15];
    assert!(manager.get(&union, &mut buf, 0));
    assert_eq!(&buf, b"AAAAABBBBBBBBBB");
}

// S5: a put fully covered by an existing range is a no-op; the old file is retained.
#[tokio::test]
async fn s5_already_covered_is_noop() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-e");
    let outer = ReadRequest::new(path.clone(), 0, 20).expect("request");
    manager.put(&outer, Bytes::from(vec![b'Z'; 20]));
    wait_for_quiescence().await;

    let inner = ReadRequest::new(path.clone(), 5, 5).expect("request");
    manager.put(&inner, Bytes::from_static(b"xxxxx"));
    wait_for_quiescence().await;

    let mut buf = vec![0u8; 20];
    assert!(manager.get(&outer, &mut buf, 0));
    assert_eq!(buf, vec![b'Z'; 20]);
}

// S6: put rejects a write that would exceed the in-flight memory watermark.
#[tokio::test]
async fn s6_admission_rejection() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(
        config(dir.path()).with_max_in_memory_cache_size(4),
    )
    .expect("manager");

    let path = RemotePath::new("file-f");
    let request = ReadRequest::new(path.clone(), 0, 10).expect("request");
    manager.put(&request, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    let mut buf = vec![0u8; 10];
    assert!(!manager.get(&request, &mut buf, 0));
    assert_eq!(manager.stats().in_memory_retained_bytes, 0);
}

// Explicit invalidation purges the path's cache files immediately.
#[tokio::test]
async fn invalidate_purges_files() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-g");
    let request = ReadRequest::new(path.clone(), 0, 10).expect("request");
    manager.put(&request, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    let files_before: usize = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(files_before, 1);

    manager.invalidate(&path);
    wait_for_quiescence().await;

    let mut buf = vec![0u8; 10];
    assert!(!manager.get(&request, &mut buf, 0));

    let files_after: usize = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(files_after, 0);
}

// S7: capacity-driven eviction (max_cached_entries=1) purges the displaced path's files.
#[tokio::test]
async fn s7_capacity_eviction_purges_files() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(
        config(dir.path()).with_max_cached_entries(1),
    )
    .expect("manager");

    let p1 = RemotePath::new("file-p1");
    let p1_request = ReadRequest::new(p1.clone(), 0, 10).expect("request");
    manager.put(&p1_request, Bytes::from_static(b"0123456789"));
    wait_for_quiescence().await;

    let p2 = RemotePath::new("file-p2");
    let p2_request = ReadRequest::new(p2.clone(), 0, 10).expect("request");
    manager.put(&p2_request, Bytes::from_static(b"9876543210"));
    wait_for_quiescence().await;

    // p1 was evicted by capacity when p2's put touched the entry cache; its file is
    // purged, and only p2's remains. Check this before issuing any further `get`,
    // since `get` itself touches the entry cache and would otherwise evict p2 in turn.
    let files_after_eviction: usize = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(files_after_eviction, 1);

    let mut buf = vec![0u8; 10];
    assert!(manager.get(&p2_request, &mut buf, 0));
    assert_eq!(&buf, b"9876543210");

    // A `get` for the evicted path misses, whether or not this call's own entry-cache
    // touch displaces p2 in turn.
    assert!(!manager.get(&p1_request, &mut buf, 0));
}

// P7: a zero-length get is always a hit and never touches disk.
#[tokio::test]
async fn p7_zero_length_get_is_always_a_hit() {
    let dir = tempdir().expect("tempdir");
    let manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");

    let path = RemotePath::new("file-h");
    let request = ReadRequest::new(path, 0, 0).expect("request");
    let mut buf = Vec::new();
    assert!(manager.get(&request, &mut buf, 0));
    assert_eq!(manager.stats().hits, 0);
    assert_eq!(manager.stats().misses, 0);
}

// Startup purges stray files left in the base directory from a prior run.
#[tokio::test]
async fn startup_purges_stray_files() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("orphan.cache"), b"leftover").expect("write orphan");

    let _manager = rangecache::RangeCacheManager::new(config(dir.path())).expect("manager");
    wait_for_quiescence().await;

    let remaining: usize = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(remaining, 0);
}
