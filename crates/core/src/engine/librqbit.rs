//! librqbit embedded content engine.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
    SessionPersistenceConfig,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{ByteStream, ContentEngine, ContentFile, ContentPointer, EngineError};
use crate::config::LibrqbitConfig;

/// Embedded librqbit session serving byte ranges straight from the swarm.
pub struct LibrqbitEngine {
    session: Arc<Session>,
    /// Torrents added through this engine, by info hash.
    torrents: RwLock<HashMap<String, Arc<ManagedTorrent>>>,
}

impl LibrqbitEngine {
    /// Create a new engine from configuration.
    pub async fn new(config: &LibrqbitConfig) -> Result<Self, EngineError> {
        let download_path = PathBuf::from(&config.download_path);

        if !download_path.exists() {
            std::fs::create_dir_all(&download_path).map_err(|e| {
                EngineError::SessionFailed(format!("Failed to create download directory: {}", e))
            })?;
        }

        let mut opts = SessionOptions::default();

        if !config.enable_dht {
            opts.disable_dht = true;
        }

        // Range, not RangeInclusive
        if let Some(port) = config.listen_port {
            let next = port.checked_add(1).ok_or_else(|| {
                EngineError::SessionFailed(format!("listen_port {} is out of range", port))
            })?;
            opts.listen_port_range = Some(port..next);
        }

        if let Some(ref persistence_path) = config.persistence_path {
            let persistence_dir = PathBuf::from(persistence_path);
            if !persistence_dir.exists() {
                std::fs::create_dir_all(&persistence_dir).map_err(|e| {
                    EngineError::SessionFailed(format!(
                        "Failed to create persistence directory: {}",
                        e
                    ))
                })?;
            }
            opts.persistence = Some(SessionPersistenceConfig::Json {
                folder: Some(persistence_dir),
            });
        }

        info!(
            download_path = %download_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(download_path, opts)
            .await
            .map_err(|e| {
                EngineError::SessionFailed(format!("Failed to initialize librqbit session: {:#}", e))
            })?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        Ok(Self {
            session,
            torrents: RwLock::new(HashMap::new()),
        })
    }

    async fn torrent(&self, pointer: &ContentPointer) -> Result<Arc<ManagedTorrent>, EngineError> {
        self.torrents
            .read()
            .await
            .get(pointer.info_hash())
            .cloned()
            .ok_or_else(|| {
                EngineError::SessionFailed(format!(
                    "No session for {}",
                    pointer.info_hash()
                ))
            })
    }

    fn file_list(torrent: &ManagedTorrent) -> Result<Vec<ContentFile>, EngineError> {
        let metadata = torrent.metadata.load();
        let Some(meta) = &*metadata else {
            return Err(EngineError::SessionFailed(
                "Torrent metadata not available".to_string(),
            ));
        };

        let files = meta
            .info
            .iter_file_details()
            .map_err(|e| EngineError::SessionFailed(format!("Bad file list: {:#}", e)))?
            .enumerate()
            .map(|(idx, f)| {
                let name = f
                    .filename
                    .to_string()
                    .unwrap_or_else(|_| format!("file-{}", idx));
                ContentFile::new(name, f.len)
            })
            .collect();

        Ok(files)
    }
}

#[async_trait]
impl ContentEngine for LibrqbitEngine {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn start_session(&self, pointer: &ContentPointer) -> Result<(), EngineError> {
        let opts = AddTorrentOptions {
            overwrite: true,
            ..Default::default()
        };

        let response = self
            .session
            .add_torrent(AddTorrent::from_url(pointer.uri()), Some(opts))
            .await
            .map_err(|e| EngineError::SessionFailed(format!("Failed to add torrent: {:#}", e)))?;

        let torrent = match response {
            AddTorrentResponse::Added(_, torrent) => torrent,
            AddTorrentResponse::AlreadyManaged(_, torrent) => {
                debug!(info_hash = %pointer.info_hash(), "Torrent already managed");
                torrent
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(EngineError::SessionFailed(
                    "Torrent was added in list-only mode".to_string(),
                ));
            }
        };

        debug!(info_hash = %pointer.info_hash(), name = ?torrent.name(), "Torrent added");

        self.torrents
            .write()
            .await
            .insert(pointer.info_hash().to_string(), torrent);

        Ok(())
    }

    async fn wait_ready(&self, pointer: &ContentPointer) -> Result<Vec<ContentFile>, EngineError> {
        let torrent = self.torrent(pointer).await?;

        torrent
            .wait_until_initialized()
            .await
            .map_err(|e| EngineError::SessionFailed(format!("{:#}", e)))?;

        Self::file_list(&torrent)
    }

    async fn open_range(
        &self,
        pointer: &ContentPointer,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, EngineError> {
        let torrent = self.torrent(pointer).await?;

        let count = Self::file_list(&torrent)?.len();
        if file_index >= count {
            return Err(EngineError::FileOutOfRange {
                index: file_index,
                count,
            });
        }

        let mut file_stream = torrent
            .stream(file_index)
            .map_err(|e| EngineError::Read(format!("{:#}", e)))?;

        file_stream
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|e| EngineError::Read(e.to_string()))?;

        // Pieces are fetched on demand as the body is polled.
        let window = file_stream.take(end - start + 1);
        Ok(ReaderStream::new(window).boxed())
    }
}
