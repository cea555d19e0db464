//! Durable peer registry.
//!
//! Peers are only ever added: unreachable peers are skipped through the
//! dead-peer cache, never deleted.
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::PeerUrl;
use crate::error::Result;
use crate::storage_error;

pub trait PeerRegistry: Send + Sync + std::fmt::Debug {
    /// Every known peer
    fn list_peers(&self) -> Result<BTreeSet<PeerUrl>>;

    /// Insert a peer, returning whether it was new. Idempotent.
    fn insert_peer(&self, peer: &PeerUrl) -> Result<bool>;

    /// Insert a batch in one transaction, returning how many were new.
    /// Readers never observe a partially inserted batch.
    fn insert_peers(&self, peers: &[PeerUrl]) -> Result<usize>;

    fn contains(&self, peer: &PeerUrl) -> Result<bool> {
        Ok(self.list_peers()?.contains(peer))
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS peers (
    url TEXT PRIMARY KEY NOT NULL
);
"#;

/// SQLite-backed registry
#[derive(Clone)]
pub struct SqlitePeerRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqlitePeerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePeerRegistry").finish_non_exhaustive()
    }
}

impl SqlitePeerRegistry {
    /// Open or create the registry file and make sure `seeds` are present.
    pub fn open(path: impl AsRef<Path>, seeds: &[PeerUrl]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| storage_error!("Failed to open {}: {}", path.display(), e))?;
        info!("Opened peer registry at {}", path.display());
        Self::bootstrap(conn, seeds)
    }

    /// In-memory registry, used by tests and throwaway nodes
    pub fn open_in_memory(seeds: &[PeerUrl]) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| storage_error!("Failed to open in-memory registry: {}", e))?;
        Self::bootstrap(conn, seeds)
    }

    fn bootstrap(conn: Connection, seeds: &[PeerUrl]) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| storage_error!("Schema bootstrap failed: {}", e))?;
        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        let seeded = registry.insert_peers(seeds)?;
        debug!("Seeded peer registry with {} new peers", seeded);
        Ok(registry)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| storage_error!("Registry lock poisoned: {}", e))
    }
}

impl PeerRegistry for SqlitePeerRegistry {
    fn list_peers(&self) -> Result<BTreeSet<PeerUrl>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT url FROM peers")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut peers = BTreeSet::new();
        for row in rows {
            let url = row?;
            match PeerUrl::parse(&url) {
                Ok(peer) => {
                    peers.insert(peer);
                }
                Err(e) => debug!("Ignoring unparseable registry entry {}: {}", url, e),
            }
        }
        Ok(peers)
    }

    fn insert_peer(&self, peer: &PeerUrl) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO peers (url) VALUES (?1)",
            params![peer.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn insert_peers(&self, peers: &[PeerUrl]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO peers (url) VALUES (?1)")?;
            for peer in peers {
                inserted += stmt.execute(params![peer.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn contains(&self, peer: &PeerUrl) -> Result<bool> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT 1 FROM peers WHERE url = ?1")?;
        let exists = stmt.exists(params![peer.as_str()])?;
        Ok(exists)
    }
}
