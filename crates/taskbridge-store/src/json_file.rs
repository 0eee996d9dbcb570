use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use taskbridge_domain::{
    now_timestamp, CoreError, MappingStore, MappingTable, ReconciliationKey, TaskMapping,
};
use tracing::warn;

/// Mapping table persisted as pretty-printed JSON at an injected path.
///
/// There is no in-process cache: every call re-reads the file, and every
/// mutation rewrites it through a sibling temporary file and a rename.
#[derive(Debug, Clone)]
pub struct JsonFileMappingStore {
    path: PathBuf,
}

impl JsonFileMappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> MappingTable {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return MappingTable::default();
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "mapping table unreadable; treating as empty"
                );
                return MappingTable::default();
            }
        };

        if raw.trim().is_empty() {
            return MappingTable::default();
        }

        match serde_json::from_str(&raw) {
            Ok(table) => table,
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "mapping table could not be decoded; treating as empty"
                );
                MappingTable::default()
            }
        }
    }

    fn save(&self, table: &MappingTable) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|error| {
                    CoreError::Persistence(format!(
                        "failed to create state directory {}: {error}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut bytes = serde_json::to_vec_pretty(table).map_err(|error| {
            CoreError::Persistence(format!("failed to encode mapping table: {error}"))
        })?;
        bytes.push(b'\n');

        let tmp = self.temp_path();
        if let Err(error) = write_private(&tmp, &bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CoreError::Persistence(format!(
                "failed to write {}: {error}",
                tmp.display()
            )));
        }

        std::fs::rename(&tmp, &self.path).map_err(|error| {
            let _ = std::fs::remove_file(&tmp);
            CoreError::Persistence(format!(
                "failed to replace {}: {error}",
                self.path.display()
            ))
        })
    }

    fn update(&self, apply: impl FnOnce(&mut MappingTable)) -> Result<(), CoreError> {
        let mut table = self.load();
        apply(&mut table);
        self.save(&table)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MappingStore for JsonFileMappingStore {
    fn snapshot(&self) -> MappingTable {
        self.load()
    }

    fn upsert(&self, mapping: TaskMapping) -> Result<(), CoreError> {
        self.update(|table| {
            table.mappings.insert(mapping.key.clone(), mapping);
        })
    }

    fn remove(&self, key: &ReconciliationKey) -> Result<(), CoreError> {
        self.update(|table| {
            table.mappings.remove(key);
        })
    }

    fn mark_sync_success(&self) -> Result<(), CoreError> {
        self.update(|table| {
            table.last_sync_at = Some(now_timestamp());
            table.last_error = None;
        })
    }

    fn mark_sync_failure(&self, message: &str) -> Result<(), CoreError> {
        self.update(|table| {
            table.last_error = Some(message.to_owned());
        })
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
