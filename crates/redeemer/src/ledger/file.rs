use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{Ledger, LedgerError, Result};

#[derive(Default)]
struct Entries {
    /// Insertion order, as written to disk
    order: Vec<String>,
    index: HashSet<String>,
}

/// Ledger kept as a pretty-printed JSON array of invoice ids, with a SHA-256
/// sidecar (`<path>.checksum`) to detect edits or torn writes
pub struct JsonFileLedger {
    path: PathBuf,
    entries: RwLock<Entries>,
}

/// `used.json` + `.checksum` -> `used.json.checksum`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| {
        LedgerError::Storage(format!("Failed to create {}: {}", path.display(), e))
    })?;
    file.write_all(bytes)
        .map_err(|e| LedgerError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;
    file.sync_all()
        .map_err(|e| LedgerError::Storage(format!("Failed to sync {}: {}", path.display(), e)))?;
    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)
        .map_err(|e| LedgerError::Storage(format!("Failed to rename {}: {}", to.display(), e)))
}

fn encode(ids: &[String]) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(ids)
        .map_err(|e| LedgerError::Storage(format!("Failed to encode ledger: {}", e)))
}

impl JsonFileLedger {
    fn checksum_path(path: &Path) -> PathBuf {
        sibling(path, ".checksum")
    }

    fn pending_checksum_path(path: &Path) -> PathBuf {
        sibling(&Self::checksum_path(path), ".tmp")
    }

    fn compute_checksum(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Load an existing ledger or start an empty one. A file that fails its
    /// checksum or does not parse is an error: starting empty would let
    /// redeemed invoices be redeemed again.
    pub fn open(path: PathBuf) -> Result<Self> {
        let checksum_path = Self::checksum_path(&path);

        if !path.exists() {
            if checksum_path.exists() {
                return Err(LedgerError::Storage(format!(
                    "{} is missing but {} exists",
                    path.display(),
                    checksum_path.display()
                )));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            info!("No ledger at {}, starting empty", path.display());
            return Ok(Self {
                path,
                entries: RwLock::new(Entries::default()),
            });
        }

        let data = std::fs::read(&path).map_err(|e| {
            LedgerError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::verify(&path, &data)?;

        let ids: Vec<String> = serde_json::from_slice(&data).map_err(|e| {
            LedgerError::Storage(format!("{} is not a JSON array of ids: {}", path.display(), e))
        })?;

        let mut entries = Entries::default();
        for id in ids {
            if entries.index.insert(id.clone()) {
                entries.order.push(id);
            }
        }
        info!(
            "Loaded {} redeemed invoices from {}",
            entries.order.len(),
            path.display()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Check `data` against the sidecar. A pending sidecar that matches means
    /// the last write stopped after the ledger rename; it is moved into place.
    fn verify(path: &Path, data: &[u8]) -> Result<()> {
        let checksum_path = Self::checksum_path(path);
        let computed = Self::compute_checksum(data);

        let stored = std::fs::read_to_string(&checksum_path).ok();
        if stored.as_deref().map(str::trim) == Some(computed.as_str()) {
            return Ok(());
        }

        let pending_path = Self::pending_checksum_path(path);
        let pending = std::fs::read_to_string(&pending_path).ok();
        if pending.as_deref().map(str::trim) == Some(computed.as_str()) {
            rename(&pending_path, &checksum_path)?;
            info!("Completed interrupted checksum update for {}", path.display());
            return Ok(());
        }

        match stored {
            Some(_) => Err(LedgerError::Storage(format!(
                "Checksum mismatch for {}; delete {} if the file was edited on purpose",
                path.display(),
                checksum_path.display()
            ))),
            None => {
                warn!(
                    "Could not read {}, proceeding without verification",
                    checksum_path.display()
                );
                Ok(())
            }
        }
    }

    /// Replace the ledger with `ids`. The ledger is renamed into place before
    /// its sidecar, so a failure at any step leaves a pair `open` accepts.
    fn persist(&self, ids: &[String], previous: &[String]) -> Result<()> {
        let data = encode(ids)?;
        let temp_path = sibling(&self.path, ".tmp");
        let checksum_path = Self::checksum_path(&self.path);
        let pending_path = Self::pending_checksum_path(&self.path);

        write_synced(&temp_path, &data)?;
        write_synced(&pending_path, Self::compute_checksum(&data).as_bytes())?;

        if let Err(e) = rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            let _ = std::fs::remove_file(&pending_path);
            return Err(e);
        }

        if let Err(e) = rename(&pending_path, &checksum_path) {
            // the old sidecar is still in place, so put the old contents back under it
            match self.restore(previous) {
                Ok(()) => {
                    let _ = std::fs::remove_file(&pending_path);
                }
                Err(restore_err) => warn!(
                    "Could not restore {} after failed checksum update: {}",
                    self.path.display(),
                    restore_err
                ),
            }
            return Err(e);
        }
        Ok(())
    }

    fn restore(&self, ids: &[String]) -> Result<()> {
        let temp_path = sibling(&self.path, ".tmp");
        write_synced(&temp_path, &encode(ids)?)?;
        rename(&temp_path, &self.path)
    }
}

#[async_trait]
impl Ledger for JsonFileLedger {
    async fn is_used(&self, invoice_id: &str) -> Result<bool> {
        Ok(self.entries.read().await.index.contains(invoice_id))
    }

    async fn mark_used(&self, invoice_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if !entries.index.insert(invoice_id.to_string()) {
            return Err(LedgerError::Conflict(invoice_id.to_string()));
        }
        entries.order.push(invoice_id.to_string());

        let previous = entries.order.len() - 1;
        if let Err(e) = self.persist(&entries.order, &entries.order[..previous]) {
            entries.order.pop();
            entries.index.remove(invoice_id);
            return Err(e);
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.order.len())
    }
}
