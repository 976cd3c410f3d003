//! Downloading remote entries to disk

use crate::utils::config::DownloadConfig;
use crate::utils::error::DownloadError;
use futures_util::StreamExt;
use log::{debug, info};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Runtime;

/// Writes the bytes behind a URL to a file
pub trait Downloader: Send {
    /// Download `url` into `dest`, returning the number of bytes written
    fn download(&mut self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Destination for a download of the entry at `index`
///
/// The millisecond timestamp keeps repeated downloads of one index apart.
pub fn download_path(dir: &Path, index: usize, now: SystemTime) -> PathBuf {
    let stamp = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    dir.join(format!("video_{}_{}.mp4", index, stamp))
}

/// Streaming HTTP downloader
pub struct HttpDownloader {
    client: reqwest::Client,
    runtime: Arc<Runtime>,
}

impl HttpDownloader {
    pub fn new(config: &DownloadConfig, runtime: Arc<Runtime>) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("randplay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        Ok(Self { client, runtime })
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::BadResponse(format!(
                "HTTP status: {}",
                response.status()
            )));
        }

        let mut file = File::create(dest)?;
        let written = Self::write_body(response, &mut file).await;
        drop(file);

        if written.is_err() {
            let _ = std::fs::remove_file(dest);
        }
        written
    }

    async fn write_body(response: reqwest::Response, file: &mut File) -> Result<u64, DownloadError> {
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Network(e.to_string()))?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
        }

        file.flush()?;
        Ok(written)
    }
}

impl Downloader for HttpDownloader {
    fn download(&mut self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        debug!("Downloading {} to {:?}", url, dest);
        let written = self.runtime.block_on(self.stream_to_file(url, dest))?;
        info!("Downloaded {} bytes to {:?}", written, dest);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    /// Serve one response whose body arrives in `chunks` pieces `gap` apart
    ///
    /// `declared` is the Content-Length sent; a larger value than what is
    /// written makes the body end early.
    fn serve_slowly(chunks: usize, size: usize, gap: Duration, declared: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                declared
            );
            let _ = stream.write_all(head.as_bytes());
            for _ in 0..chunks {
                let _ = stream.write_all(&vec![7u8; size]);
                let _ = stream.flush();
                thread::sleep(gap);
            }
        });

        format!("http://{}/video.mp4", addr)
    }

    fn downloader(timeout_secs: u64) -> HttpDownloader {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let config = DownloadConfig {
            timeout_secs,
            ..DownloadConfig::default()
        };
        HttpDownloader::new(&config, Arc::new(runtime)).unwrap()
    }

    #[test]
    fn test_slow_body_outlasting_timeout_completes() {
        let url = serve_slowly(8, 100, Duration::from_millis(300), 800);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video_0_1.mp4");

        let written = downloader(1).download(&url, &dest).unwrap();

        assert_eq!(written, 800);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 800);
    }

    #[test]
    fn test_truncated_body_leaves_no_file() {
        let url = serve_slowly(1, 100, Duration::from_millis(10), 1_000);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video_0_1.mp4");

        let result = downloader(5).download(&url, &dest);

        assert!(matches!(result, Err(DownloadError::Network(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_download_path_encodes_index_and_time() {
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let path = download_path(Path::new("downloaded_videos"), 3, now);
        assert_eq!(path, PathBuf::from("downloaded_videos/video_3_1700000000123.mp4"));
    }

    #[test]
    fn test_download_paths_differ_over_time() {
        let dir = Path::new("out");
        let first = download_path(dir, 0, UNIX_EPOCH + Duration::from_secs(10));
        let second = download_path(dir, 0, UNIX_EPOCH + Duration::from_secs(11));
        assert_ne!(first, second);
    }
}
