//! Index server and cache test utilities

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use gmaven_index::config::RefreshConfig;
use gmaven_index::index::disk::IndexStore;
use gmaven_index::index::fetcher::IndexFetcher;
use gmaven_index::index::source::HttpIndexSource;

pub const INDEX_PATH: &str = "/index/classes-v0.1.json.gz";

pub fn gzip(data: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Create a fetcher downloading from `server_url` into a fresh temporary cache
pub fn create_test_fetcher(server_url: &str) -> (TempDir, Arc<IndexFetcher>) {
    let temp_dir = TempDir::new().unwrap();
    let source = HttpIndexSource::new(
        &format!("{}{}", server_url, INDEX_PATH),
        Duration::from_secs(5),
    )
    .unwrap();
    let fetcher = IndexFetcher::new(
        IndexStore::new(temp_dir.path()),
        Arc::new(source),
        RefreshConfig {
            max_retries: 0,
            ..Default::default()
        },
    );
    (temp_dir, Arc::new(fetcher))
}
