use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use hai_flow_core::{PendingTxPort, PortError};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PendingTxFile {
    schema_version: u32,
    entries: BTreeMap<String, B256>,
}

/// Submitted-but-unconfirmed transaction hashes, one per account, kept in a
/// JSON file so a restarted process resumes waiting instead of resubmitting.
#[derive(Debug)]
pub struct PendingTxStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl PendingTxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PendingTxFile, PortError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PendingTxFile::default()),
            Err(e) => {
                return Err(PortError::Transport(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let file: PendingTxFile = serde_json::from_slice(&raw)
            .map_err(|e| PortError::Validation(format!("corrupt pending tx file: {e}")))?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(PortError::Validation(format!(
                "unsupported pending tx schema version {}",
                file.schema_version
            )));
        }
        Ok(file)
    }

    fn write(&self, mut file: PendingTxFile) -> Result<(), PortError> {
        file.schema_version = SCHEMA_VERSION;
        let raw = serde_json::to_vec_pretty(&file)
            .map_err(|e| PortError::Validation(format!("pending tx serialization failed: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                PortError::Transport(format!("failed to write {}: {e}", self.path.display()))
            })
    }
}

fn key(owner: Address) -> String {
    owner.to_string().to_lowercase()
}

impl PendingTxPort for PendingTxStore {
    fn remember(&self, tx_hash: B256, owner: Address) -> Result<(), PortError> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.read()?;
        file.entries.insert(key(owner), tx_hash);
        self.write(file)?;
        debug!(%owner, %tx_hash, "pending transaction remembered");
        Ok(())
    }

    fn load(&self, owner: Address) -> Result<Option<B256>, PortError> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.entries.get(&key(owner)).copied())
    }

    fn clear(&self, owner: Address) -> Result<(), PortError> {
        let _io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.read()?;
        if file.entries.remove(&key(owner)).is_some() {
            self.write(file)?;
            debug!(%owner, "pending transaction cleared");
        }
        Ok(())
    }
}
