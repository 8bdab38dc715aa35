//! Device registry contract and the bundled in-memory registry
//!
//! The registry owns persistence. The core only needs to find records and
//! patch them, plus insert/delete for the CRUD surface. Uniqueness of name,
//! ip and mac is the registry's job because only it can check atomically.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::model::{DeviceFilter, DeviceId, DevicePatch, DeviceRecord};

type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Storage for device records.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Records matching `filter`, in a stable order.
    async fn find(&self, filter: &DeviceFilter) -> RegistryResult<Vec<DeviceRecord>>;

    /// Apply `patch` to record `id` and return the updated record.
    async fn update(&self, id: &DeviceId, patch: &DevicePatch) -> RegistryResult<DeviceRecord>;

    async fn insert(&self, record: DeviceRecord) -> RegistryResult<DeviceRecord>;

    async fn delete(&self, id: &DeviceId) -> RegistryResult<()>;
}

/// Records kept in memory, optionally mirrored to a JSON file.
///
/// The file is rewritten after every mutation.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<Vec<DeviceRecord>>,
    snapshot: Option<PathBuf>,
    write_lock: tokio::sync::Mutex<()>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<DeviceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Default::default()
        }
    }

    /// Load from `path` if it exists and keep it updated afterwards.
    pub async fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), count = records.len(), "loaded device registry");
        Ok(Self {
            records: RwLock::new(records),
            snapshot: Some(path),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Apply `mutate` to a copy of the records, save the copy, then swap it
    /// in. A failed save leaves memory untouched.
    async fn commit<T, F>(&self, mutate: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut Vec<DeviceRecord>) -> RegistryResult<T> + Send,
        T: Send,
    {
        // One writer at a time so the file always matches memory.
        let _guard = self.write_lock.lock().await;
        let mut next = self.records.read().clone();
        let out = mutate(&mut next)?;
        self.persist(&next).await?;
        *self.records.write() = next;
        Ok(out)
    }

    async fn persist(&self, records: &[DeviceRecord]) -> RegistryResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(records)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// First field of `candidate` that another record already uses.
fn conflicting_field(
    records: &[DeviceRecord],
    candidate: &DeviceRecord,
) -> Option<&'static str> {
    records
        .iter()
        .filter(|r| r.id != candidate.id)
        .find_map(|r| {
            if r.device_name == candidate.device_name {
                Some("device_name")
            } else if r.ip == candidate.ip {
                Some("ip")
            } else if r.mac == candidate.mac {
                Some("mac")
            } else {
                None
            }
        })
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn find(&self, filter: &DeviceFilter) -> RegistryResult<Vec<DeviceRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update(&self, id: &DeviceId, patch: &DevicePatch) -> RegistryResult<DeviceRecord> {
        self.commit(|records| {
            let index = records
                .iter()
                .position(|r| r.id == *id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

            let mut candidate = records[index].clone();
            patch.apply_to(&mut candidate);
            if let Some(field) = conflicting_field(records, &candidate) {
                return Err(RegistryError::Conflict { field });
            }
            records[index] = candidate.clone();
            Ok(candidate)
        })
        .await
    }

    async fn insert(&self, record: DeviceRecord) -> RegistryResult<DeviceRecord> {
        self.commit(|records| {
            if records.iter().any(|r| r.id == record.id) {
                return Err(RegistryError::Conflict { field: "_id" });
            }
            if let Some(field) = conflicting_field(records, &record) {
                return Err(RegistryError::Conflict { field });
            }
            records.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn delete(&self, id: &DeviceId) -> RegistryResult<()> {
        self.commit(|records| {
            let before = records.len();
            records.retain(|r| r.id != *id);
            if records.len() == before {
                return Err(RegistryError::NotFound(id.clone()));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use std::net::Ipv4Addr;

    fn record(id: &str, name: &str, last_octet: u8) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::new(id),
            device_name: name.into(),
            ip: Ipv4Addr::new(10, 0, 0, last_octet),
            mac: roomctl_discovery::MacAddr::new([0x02, 0, 0, 0, 0, last_octet]),
            username: String::new(),
            password: String::new(),
            category: Category::Display,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let registry = MemoryRegistry::new();
        registry.insert(record("a", "Lobby", 1)).await.unwrap();

        let dup_name = registry.insert(record("b", "Lobby", 2)).await.unwrap_err();
        assert!(matches!(dup_name, RegistryError::Conflict { field: "device_name" }));

        let dup_ip = registry.insert(record("c", "Hall", 1)).await.unwrap_err();
        assert!(matches!(dup_ip, RegistryError::Conflict { field: "ip" }));

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_update_checks_uniqueness_against_others() {
        let registry =
            MemoryRegistry::with_records(vec![record("a", "Lobby", 1), record("b", "Hall", 2)]);

        // Re-saving a record's own values is fine
        let same = DevicePatch {
            device_name: Some("Lobby".into()),
            ..Default::default()
        };
        registry.update(&DeviceId::new("a"), &same).await.unwrap();

        let clash = DevicePatch::ip(Ipv4Addr::new(10, 0, 0, 2));
        let err = registry.update(&DeviceId::new("a"), &clash).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { field: "ip" }));

        let found = registry.find(&DeviceFilter::by_id(&DeviceId::new("a"))).await.unwrap();
        assert_eq!(found[0].ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let registry = MemoryRegistry::new();
        let err = registry.delete(&DeviceId::new("nope")).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("devices.json");

        let registry = MemoryRegistry::open(&path).await.unwrap();
        assert!(registry.is_empty());
        registry.insert(record("a", "Lobby", 1)).await.unwrap();
        registry
            .update(&DeviceId::new("a"), &DevicePatch::ip(Ipv4Addr::new(10, 0, 0, 50)))
            .await
            .unwrap();

        let reopened = MemoryRegistry::open(&path).await.unwrap();
        let records = reopened.find(&DeviceFilter::all()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, Ipv4Addr::new(10, 0, 0, 50));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let path = data.join("devices.json");

        let registry = MemoryRegistry::open(&path).await.unwrap();
        registry.insert(record("a", "Lobby", 1)).await.unwrap();

        // a plain file where the directory should be makes every save fail
        std::fs::remove_dir_all(&data).unwrap();
        std::fs::write(&data, b"").unwrap();

        assert!(registry.insert(record("b", "Hall", 2)).await.is_err());
        assert!(registry
            .update(&DeviceId::new("a"), &DevicePatch::ip(Ipv4Addr::new(10, 0, 0, 9)))
            .await
            .is_err());
        assert!(registry.delete(&DeviceId::new("a")).await.is_err());

        let records = registry.find(&DeviceFilter::all()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, DeviceId::new("a"));
        assert_eq!(records[0].ip, Ipv4Addr::new(10, 0, 0, 1));
    }
}
