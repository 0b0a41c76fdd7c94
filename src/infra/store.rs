use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::record::TicketRecord;
use crate::error::{AppError, AppResult};
use crate::services::TicketStore;

pub const STORE_FILE_NAME: &str = "tickets.json";

/// Ticket records kept as a pretty-printed JSON array in a single file.
pub struct JsonTicketStore {
    file_path: PathBuf,
}

impl JsonTicketStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

impl TicketStore for JsonTicketStore {
    fn save_all(&self, records: &[TicketRecord]) -> AppResult<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(records)
            .map_err(|err| AppError::Storage(format!("failed to encode records: {err}")))?;
        fs::write(&self.file_path, data)?;
        Ok(())
    }

    fn load_all(&self) -> AppResult<Vec<TicketRecord>> {
        let contents = match fs::read_to_string(&self.file_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AppError::Io(err)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|err| {
            AppError::Storage(format!(
                "invalid ticket store {}: {err}",
                self.file_path.display()
            ))
        })
    }

    fn add(&self, record: TicketRecord) -> AppResult<()> {
        let mut records = self.load_all()?;
        match records.iter_mut().find(|existing| existing.key == record.key) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save_all(&records)
    }

    fn update(&self, record: TicketRecord) -> AppResult<()> {
        let mut records = self.load_all()?;
        let existing = records
            .iter_mut()
            .find(|existing| existing.key == record.key)
            .ok_or_else(|| AppError::Storage(format!("ticket not found: {}", record.key)))?;
        *existing = record;
        self.save_all(&records)
    }

    fn get_by_key(&self, key: &str) -> AppResult<Option<TicketRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|record| record.key == key))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store(dir: &TempDir) -> JsonTicketStore {
        JsonTicketStore::new(dir.path().join("nested").join(STORE_FILE_NAME))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load_all().unwrap().is_empty());
    }

    #[test]
    fn empty_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STORE_FILE_NAME);
        fs::write(&path, "").unwrap();
        assert!(JsonTicketStore::new(path).get_all().unwrap().is_empty());
    }

    #[test]
    fn saves_and_loads_in_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut second = TicketRecord::new("PROJ-2", "Second");
        second.blocked_by = vec!["PROJ-1".to_string()];
        store
            .save_all(&[TicketRecord::new("PROJ-1", "First"), second])
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].key, "PROJ-1");
        assert_eq!(loaded[1].blocked_by, vec!["PROJ-1".to_string()]);
    }

    #[test]
    fn add_replaces_existing_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.add(TicketRecord::new("PROJ-1", "Original")).unwrap();
        store.add(TicketRecord::new("PROJ-2", "Other")).unwrap();
        store.add(TicketRecord::new("PROJ-1", "Replaced")).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            store.get_by_key("PROJ-1").unwrap().unwrap().summary,
            "Replaced"
        );
        assert!(store.get_by_key("NOPE-1").unwrap().is_none());
    }

    #[test]
    fn update_requires_existing_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.update(TicketRecord::new("PROJ-1", "Missing")),
            Err(AppError::Storage(_))
        ));

        store.add(TicketRecord::new("PROJ-1", "Original")).unwrap();
        let mut record = store.get_by_key("PROJ-1").unwrap().unwrap();
        record.status = "In Progress".to_string();
        store.update(record).unwrap();
        assert_eq!(
            store.get_by_key("PROJ-1").unwrap().unwrap().status,
            "In Progress"
        );
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STORE_FILE_NAME);
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonTicketStore::new(path).load_all(),
            Err(AppError::Storage(_))
        ));
    }
}
