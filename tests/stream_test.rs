//! Integration tests for the stream route.

mod common;

use std::time::Duration;

use common::{sample_data, stream_url, TestHarness, CHUNK, HASH};
use mr_core::ClientId;
use mr_db::queries::catalog::get_file;

const SIZE: usize = 5_000;

async fn wait_for_idle(h: &TestHarness) {
    for _ in 0..100 {
        if h.ctx.streams.pool().workloads().iter().all(|(_, w)| *w == 0) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workloads never returned to zero: {:?}", h.ctx.streams.pool().workloads());
}

#[tokio::test]
async fn full_object_without_range() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let obj = h.insert_object(-100, 1, data.clone(), Some("video/mp4"), Some("clip.mp4"));

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let headers = resp.headers();
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["content-length"], SIZE.to_string().as_str());
    assert_eq!(headers["content-range"], "bytes 0-4999/5000");
    assert_eq!(headers["content-disposition"], "attachment; filename=\"clip.mp4\"");
    assert!(headers.contains_key("x-request-id"));

    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], &data[..]);
    assert_eq!(h.fetch_calls(), SIZE.div_ceil(CHUNK as usize));
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn bounded_range_is_partial() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let obj = h.insert_object(-100, 2, data.clone(), Some("video/mp4"), None);

    let resp = reqwest::Client::new()
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=1000-3000")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 1000-3000/5000");
    assert_eq!(resp.headers()["content-length"], "2001");

    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], &data[1000..=3000]);
    // Chunks 0..=2 of 1 KiB cover bytes 0..3071.
    assert_eq!(h.fetch_calls(), 3);
}

#[tokio::test]
async fn open_and_suffix_ranges() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let obj = h.insert_object(-100, 3, data.clone(), None, Some("song.mp3"));
    let client = reqwest::Client::new();

    let resp = client
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=4000-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 4000-4999/5000");
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[4000..]);

    let resp = client
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=-100")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 4900-4999/5000");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[4900..]);
}

#[tokio::test]
async fn last_byte_only() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let obj = h.insert_object(-100, 4, data.clone(), None, None);

    let resp = reqwest::Client::new()
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=4999-4999")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-length"], "1");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[4999..]);
    assert_eq!(h.fetch_calls(), 1);
}

#[tokio::test]
async fn unsatisfiable_ranges() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 5, sample_data(SIZE), None, None);
    let client = reqwest::Client::new();

    for range in ["bytes=5000-5100", "bytes=10-5000", "bytes=300-200", "bytes=0-1,5-9", "items=0-1", "garbage"] {
        let resp = client
            .get(stream_url(addr, obj, HASH))
            .header("Range", range)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 416, "{range}");
        assert_eq!(resp.headers()["content-range"], "bytes */5000", "{range}");
    }
    assert_eq!(h.fetch_calls(), 0);
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn wrong_hash_is_forbidden_without_fetching() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 6, sample_data(SIZE), None, None);

    for hash in ["AgADBB", "AgADBAADpq9xyz", ""] {
        let resp = reqwest::get(stream_url(addr, obj, hash)).await.unwrap();
        assert_eq!(resp.status(), 403, "{hash:?}");
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["code"], "invalid_token");
    }

    let no_hash = format!("http://{addr}/{}/x?id={}", obj.container_id, obj.object_id);
    assert_eq!(reqwest::get(no_hash).await.unwrap().status(), 403);

    assert_eq!(h.fetch_calls(), 0);
}

#[tokio::test]
async fn missing_object_is_not_found_and_forgotten() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 7, sample_data(SIZE), None, None);
    h.remove_object(obj);
    assert!(get_file(&h.conn(), obj).unwrap().is_some());

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");

    assert!(get_file(&h.conn(), obj).unwrap().is_none());
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn head_sends_headers_only() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 8, sample_data(SIZE), Some("video/mp4"), None);

    let resp = reqwest::Client::new()
        .head(stream_url(addr, obj, HASH))
        .header("Range", "bytes=0-99")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 0-99/5000");
    assert_eq!(resp.headers()["content-length"], "100");
    assert_eq!(h.fetch_calls(), 0);
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn empty_object() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 9, Vec::new(), None, Some("empty.txt"));

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-length"], "0");
    assert!(resp.headers().get("content-range").is_none());
    assert!(resp.bytes().await.unwrap().is_empty());

    let resp = reqwest::Client::new()
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 416);
    assert_eq!(h.fetch_calls(), 0);
}

#[tokio::test]
async fn generated_file_name_uses_mime_subtype() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 10, sample_data(10), Some("video/webm"), None);

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    let name = disposition
        .strip_prefix("attachment; filename=\"")
        .and_then(|s| s.strip_suffix('"'))
        .unwrap();
    let (token, ext) = name.split_once('.').unwrap();
    assert_eq!(token.len(), 4);
    assert_eq!(ext, "webm");
}

#[tokio::test]
async fn bad_ids_are_rejected() {
    let (_h, addr) = TestHarness::with_server().await;

    for path in ["/abc/x?id=1&hash=AgADBA", "/1/x?hash=AgADBA", "/1/x?id=nope&hash=AgADBA"] {
        let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
        assert_eq!(resp.status(), 400, "{path}");
    }
}

#[tokio::test]
async fn adapter_is_built_once_per_client() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let objects: Vec<_> = (20..28)
        .map(|id| h.insert_object(-100, id, data.clone(), None, None))
        .collect();

    let requests = objects.iter().map(|&obj| {
        let url = stream_url(addr, obj, HASH);
        async move { reqwest::get(url).await.unwrap().bytes().await.unwrap() }
    });
    for body in futures::future::join_all(requests).await {
        assert_eq!(&body[..], &data[..]);
    }

    assert_eq!(h.ctx.streams.adapters().constructed(), 1);
    assert_eq!(h.clients[0].metadata_calls(), objects.len());

    // A repeat request is served from the adapter's metadata cache.
    let again = reqwest::get(stream_url(addr, objects[0], HASH)).await.unwrap();
    assert_eq!(&again.bytes().await.unwrap()[..], &data[..]);
    assert_eq!(h.clients[0].metadata_calls(), objects.len());
    assert_eq!(h.ctx.streams.adapters().constructed(), 1);
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn object_removed_after_caching_is_not_found() {
    let (h, addr) = TestHarness::with_server().await;
    let data = sample_data(SIZE);
    let obj = h.insert_object(-100, 13, data.clone(), None, None);

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[..]);

    h.remove_object(obj);

    // Metadata is still cached; the failed first chunk must still become a 404.
    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");
    assert!(get_file(&h.conn(), obj).unwrap().is_none());

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(h.clients[0].metadata_calls(), 2);
    wait_for_idle(&h).await;
}

#[tokio::test]
async fn missing_object_without_token_keeps_catalog_record() {
    let (h, addr) = TestHarness::with_server().await;
    let obj = h.insert_object(-100, 14, sample_data(SIZE), None, None);
    h.remove_object(obj);

    let base = format!("http://{addr}/{}/x?id={}", obj.container_id, obj.object_id);
    for url in [base.clone(), format!("{base}&hash=")] {
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404, "{url}");
        assert!(get_file(&h.conn(), obj).unwrap().is_some(), "{url}");
    }

    let resp = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(get_file(&h.conn(), obj).unwrap().is_none());
}

#[tokio::test]
async fn concurrent_streams_spread_across_clients() {
    let (h, addr) = TestHarness::with_clients(2).serve().await;
    // Large enough that an unread body stalls the producer.
    let data = sample_data(16 * 1024 * 1024);
    let obj = h.insert_object(-100, 12, data, None, None);

    let first = reqwest::get(stream_url(addr, obj, HASH)).await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(h.ctx.streams.pool().workload(ClientId::new(0)), 1);

    let second = reqwest::Client::new()
        .get(stream_url(addr, obj, HASH))
        .header("Range", "bytes=0-9")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 206);
    assert_eq!(second.bytes().await.unwrap().len(), 10);
    assert_eq!(h.clients[1].metadata_calls(), 1);

    // Abandoning the first body releases its slot.
    drop(first);
    wait_for_idle(&h).await;
    assert_eq!(h.ctx.streams.adapters().constructed(), 2);
}
