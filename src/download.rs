//! 添付ファイルのダウンロード
//!
//! - URLが空ならスキップ
//! - 保存先が既に存在する場合は `_duplicate` を付けた名前で保存（上書きしない）
//! - HTTP 429 は `RetryPolicy` に従って線形バックオフで再試行
//! - 本文はチャンク単位で `.part` ファイルに書き、完了後にリネーム

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::error::ScraperError;
use crate::ipex::Outcome;
use crate::traits::{Fetch, FetchResponse};

const USER_AGENT: &str = concat!("ipex-scraper/", env!("CARGO_PKG_VERSION"));
const DUPLICATE_SUFFIX: &str = "_duplicate";

/// reqwest によるストリーミング取得
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScraperError::Download(format!("HTTPクライアント初期化: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::Download(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ScraperError::Download(e.to_string()))
            })
            .boxed();

        Ok(FetchResponse { status, body })
    }
}

/// 1ファイル分のダウンロード対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub source_url: String,
    pub folder: PathBuf,
    pub file_name: String,
}

impl DownloadTarget {
    pub fn new(
        source_url: impl Into<String>,
        folder: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            folder: folder.into(),
            file_name: file_name.into(),
        }
    }
}

/// 保存に成功したファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub attempts: u32,
    pub bytes: u64,
}

pub struct Downloader<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: Fetch> Downloader<F> {
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// ダウンロード実行。失敗はこのファイル単位で完結し、呼び出し側へは伝播しない
    pub async fn download(&self, target: &DownloadTarget) -> Outcome<Downloaded> {
        if target.source_url.trim().is_empty() {
            info!("Skipping empty URL for {}", target.file_name);
            return Outcome::Skipped(format!("empty URL for {}", target.file_name));
        }

        if let Err(e) = tokio::fs::create_dir_all(&target.folder).await {
            warn!("Cannot create folder {:?}: {}", target.folder, e);
            return Outcome::Failed(format!("create folder {:?}: {}", target.folder, e));
        }

        let destination = resolve_destination(&target.folder, &target.file_name);
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            match self.try_once(&target.source_url, &destination).await {
                Ok(bytes) => {
                    info!(
                        "Downloaded {} to {:?} ({} bytes, attempt {})",
                        target.file_name, destination, bytes, attempt
                    );
                    return Outcome::Done(Downloaded {
                        path: destination,
                        attempts: attempt,
                        bytes,
                    });
                }
                Err(e) if e.is_retryable() => {
                    if attempt < self.policy.max_attempts {
                        let backoff = self.policy.delay_for(attempt);
                        warn!(
                            "Attempt {} for {} rate limited, retrying in {:?}",
                            attempt, target.file_name, backoff
                        );
                        sleep(backoff).await;
                    } else {
                        warn!("Attempt {} for {} rate limited", attempt, target.file_name);
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!("Attempt {} for {} failed: {}", attempt, target.file_name, e);
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts allowed".to_string());
        warn!(
            "Failed to download {} after {} attempts: {}",
            target.file_name, self.policy.max_attempts, reason
        );
        Outcome::Failed(format!(
            "{} after {} attempts: {}",
            target.source_url, self.policy.max_attempts, reason
        ))
    }

    async fn try_once(&self, url: &str, destination: &Path) -> Result<u64, ScraperError> {
        let response = self.fetcher.fetch(url).await?;
        if response.status == 429 {
            return Err(ScraperError::RateLimited(url.to_string()));
        }
        if !response.is_success() {
            return Err(ScraperError::HttpStatus(response.status));
        }

        let partial = partial_path(destination);
        match write_stream(response, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, destination).await?;
                Ok(bytes)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                    debug!("Could not remove partial file {:?}: {}", partial, remove_err);
                }
                Err(e)
            }
        }
    }
}

async fn write_stream(mut response: FetchResponse, path: &Path) -> Result<u64, ScraperError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

/// 既存ファイルと衝突しない保存先を決める
pub fn resolve_destination(folder: &Path, file_name: &str) -> PathBuf {
    let path = folder.join(file_name);
    if !path.exists() {
        return path;
    }

    let mut candidate = folder.join(format!("{}{}", file_name, DUPLICATE_SUFFIX));
    let mut n = 2;
    while candidate.exists() {
        candidate = folder.join(format!("{}{}{}", file_name, DUPLICATE_SUFFIX, n));
        n += 1;
    }
    candidate
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
