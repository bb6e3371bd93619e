use {
    super::*,
    anyhow::Context,
    backon::Retryable,
};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Produces the scratchpad to start mining with. A fresh cache is used as is. Otherwise the
/// cache is replaced from `url` when one is configured, and a download that still does not
/// load is deleted and aborts startup. With neither, mining starts empty and the transport
/// fetches the scratchpad from the pool.
pub(crate) async fn scratchpad(
    cache: Option<&Path>,
    url: Option<&Url>,
    retry: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ScratchpadStore> {
    let Some(cache) = cache else {
        return Ok(empty());
    };

    match load(cache).await? {
        Ok(store) => {
            info!(
                "Loaded scratchpad cache {}: height {}, {} words",
                cache.display(),
                store.height().height,
                store.size()
            );
            return Ok(store);
        }
        Err(err) => info!("Not using scratchpad cache: {err}"),
    }

    let Some(url) = url else {
        info!("No scratchpad url configured, the pool will provide the scratchpad");
        return Ok(empty());
    };

    tokio::select! {
        _ = cancel.cancelled() => return Ok(empty()),
        result = download(url, cache, retry) => result?,
    }

    match load(cache).await? {
        Ok(store) => {
            info!(
                "Loaded downloaded scratchpad: height {}, {} words",
                store.height().height,
                store.size()
            );
            Ok(store)
        }
        Err(err) => {
            if let Err(remove) = fs::remove_file(cache) {
                warn!("Failed to remove {}: {remove}", cache.display());
            }
            Err(err).with_context(|| format!("scratchpad downloaded from {url} is unusable"))
        }
    }
}

fn empty() -> ScratchpadStore {
    ScratchpadStore::new(SCRATCHPAD_CAPACITY_WORDS, ADDENDUM_LOG_CAPACITY)
}

async fn load(path: &Path) -> Result<Result<ScratchpadStore, CacheError>> {
    let path = path.to_path_buf();

    task::spawn_blocking(move || {
        let mut store = empty();
        store
            .load_from_disk(&path, CACHE_EXPIRATION)
            .map(|()| store)
    })
    .await
    .context("scratchpad load task failed")
}

async fn download(url: &Url, path: &Path, retry: RetryPolicy) -> Result {
    info!("Downloading scratchpad from {url}");

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let fetch = || async {
        let bytes = client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok::<_, reqwest::Error>(bytes)
    };

    let bytes = fetch
        .retry(retry.backoff())
        .sleep(sleep)
        .when(|err: &reqwest::Error| {
            err.is_timeout()
                || err.is_connect()
                || err.is_request()
                || err.is_body()
                || err.status().is_some_and(|status| status.is_server_error())
        })
        .notify(|err: &reqwest::Error, pause: Duration| {
            warn!(
                "Scratchpad download failed: {err}. Retrying in {}s",
                pause.as_secs()
            );
        })
        .await
        .with_context(|| format!("failed to download scratchpad from {url}"))?;

    info!("Downloaded {} bytes", bytes.len());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("download");

    fs::write(&tmp, &bytes).with_context(|| format!("failed to write {}", tmp.display()))?;

    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move download to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn hi(height: u64) -> HeightInfo {
        HeightInfo {
            height,
            block_id: Hash32::from([height as u8; 32]),
        }
    }

    #[tokio::test]
    async fn uses_fresh_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        let mut store = ScratchpadStore::new(64, 4);
        store.replace(vec![9; 32], hi(3)).unwrap();
        store.save_to_disk(&path).unwrap();

        let loaded = scratchpad(
            Some(&path),
            None,
            RetryPolicy::forever(Duration::ZERO),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(loaded.height_info(), Some(hi(3)));
        assert_eq!(loaded.words(), &[9; 32][..]);
    }

    #[tokio::test]
    async fn missing_cache_without_url_starts_empty() {
        let dir = TempDir::new().unwrap();

        let store = scratchpad(
            Some(&dir.path().join("missing.bin")),
            None,
            RetryPolicy::forever(Duration::ZERO),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(store.is_empty());
        assert_eq!(store.capacity(), SCRATCHPAD_CAPACITY_WORDS);
    }

    #[tokio::test]
    async fn unusable_download_is_deleted() {
        use tokio::{io::AsyncReadExt, net::TcpListener};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!(
            "http://{}/scratchpad.bin",
            listener.local_addr().unwrap()
        ))
        .unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = [0; 4096];
            let _ = stream.read(&mut buffer).await;
            let body = b"garbage";
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(body).await.unwrap();
        });

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("scratchpad.bin");

        let err = scratchpad(
            Some(&path),
            Some(&url),
            RetryPolicy {
                retries: Some(0),
                pause: Duration::ZERO,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("is unusable"), "{err}");
        assert!(!path.exists());
    }
}
