//! End-to-end tests against a local HTTP responder.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use async_image_loader::domain::{
    CacheError, CacheKey, ImageHandle, ImageSink, ImageSource, LoadedImage, RequestStatus,
};
use async_image_loader::infrastructure::{ImageLoader, LoaderOptions};

struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    async fn start(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    serve(stream, delay).await;
                });
            }
        });

        Self { addr, hits }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, delay: Duration) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    let (status, body) = match path.as_str() {
        "/wide.png" => ("200 OK", png(1000, 500)),
        "/small.png" => ("200 OK", png(40, 30)),
        "/garbage.png" => ("200 OK", b"definitely not an image".to_vec()),
        _ => ("404 Not Found", Vec::new()),
    };

    tokio::time::sleep(delay).await;

    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes()).await;
    let _ = stream.write_all(&body).await;
    let _ = stream.shutdown().await;
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[derive(Debug)]
enum Outcome {
    Success(ImageSource),
    Failure { placeholder: bool },
}

struct ChannelSink {
    tx: mpsc::UnboundedSender<Outcome>,
}

impl ChannelSink {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ImageSink for ChannelSink {
    fn on_success(&self, _key: &CacheKey, image: &LoadedImage) {
        let _ = self.tx.send(Outcome::Success(image.source));
    }

    fn on_failure(&self, _key: &CacheKey, placeholder: Option<&ImageHandle>) {
        let _ = self.tx.send(Outcome::Failure {
            placeholder: placeholder.is_some(),
        });
    }
}

fn both_tiers(dir: &std::path::Path) -> LoaderOptions {
    LoaderOptions::builder()
        .cache_in_memory(true)
        .cache_on_disk(true)
        .disk_cache_dir(dir)
        .read_timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test]
async fn network_then_memory() {
    let server = TestServer::start(Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    let loader = assert_ok!(ImageLoader::new(both_tiers(dir.path())).await);
    let key = CacheKey::new("wide");

    let first = assert_ok!(loader.load(key.clone(), server.url("/wide.png")).await);
    assert_eq!(first.source, ImageSource::Network);
    assert_eq!((first.width(), first.height()), (320, 160));
    assert_eq!(server.hits(), 1);

    assert!(loader.memory_cache().unwrap().peek(&key).is_some());
    assert!(loader.disk_cache().unwrap().contains(&key).await);

    let second = assert_ok!(loader.load(key, server.url("/wide.png")).await);
    assert_eq!(second.source, ImageSource::MemoryCache);
    assert_eq!(server.hits(), 1);

    loader.release(false).await;
}

#[tokio::test]
async fn disk_survives_new_loader() {
    let server = TestServer::start(Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    let key = CacheKey::from_url(&server.url("/small.png"));

    let first = assert_ok!(ImageLoader::new(both_tiers(dir.path())).await);
    assert_ok!(first.load(key.clone(), server.url("/small.png")).await);
    first.release(false).await;

    let second = assert_ok!(ImageLoader::new(both_tiers(dir.path())).await);
    let loaded = assert_ok!(second.load(key, server.url("/small.png")).await);

    assert_eq!(loaded.source, ImageSource::DiskCache);
    assert_eq!((loaded.width(), loaded.height()), (40, 30));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn not_found_delivers_failure_placeholder() {
    let server = TestServer::start(Duration::ZERO).await;
    let options = LoaderOptions::builder()
        .show_image_on_fail(Arc::new(image::DynamicImage::new_rgb8(1, 1)))
        .build();
    let loader = assert_ok!(ImageLoader::new(options).await);
    let (sink, mut rx) = ChannelSink::new();

    let status = loader.request("gone", server.url("/missing"), sink);
    assert_eq!(status, RequestStatus::Dispatched);

    match rx.recv().await {
        Some(Outcome::Failure { placeholder }) => assert!(placeholder),
        other => panic!("expected failure, got {other:?}"),
    }

    let err = assert_err!(loader.load("gone", server.url("/missing")).await);
    assert!(matches!(err, CacheError::LoadFailed(_)));
    assert_eq!(server.hits(), 2);
    assert!(!loader.is_loading(&CacheKey::new("gone")));
}

#[tokio::test]
async fn undecodable_body_fails() {
    let server = TestServer::start(Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    let loader = assert_ok!(ImageLoader::new(both_tiers(dir.path())).await);
    let key = CacheKey::new("garbage");

    assert_err!(loader.load(key.clone(), server.url("/garbage.png")).await);
    assert!(loader.memory_cache().unwrap().peek(&key).is_none());
    assert!(!loader.disk_cache().unwrap().contains(&key).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_one_download() {
    let server = TestServer::start(Duration::from_millis(200)).await;
    let loader = assert_ok!(
        ImageLoader::new(LoaderOptions::builder().cache_in_memory(true).build()).await
    );
    let (sink, mut rx) = ChannelSink::new();

    let statuses: Vec<_> = (0..5)
        .map(|_| loader.request("shared", server.url("/small.png"), sink.clone()))
        .collect();

    assert_eq!(statuses[0], RequestStatus::Dispatched);
    assert!(statuses[1..].iter().all(|s| *s == RequestStatus::Joined));

    for _ in 0..5 {
        match rx.recv().await {
            Some(Outcome::Success(source)) => assert_eq!(source, ImageSource::Network),
            other => panic!("expected success, got {other:?}"),
        }
    }
    assert_eq!(server.hits(), 1);
    assert_eq!(loader.in_flight_count(), 0);
}
