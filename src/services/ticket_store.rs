use crate::domain::record::TicketRecord;
use crate::error::AppResult;

/// Keyed storage for records of created tickets.
pub trait TicketStore: Send + Sync {
    fn save_all(&self, records: &[TicketRecord]) -> AppResult<()>;
    fn load_all(&self) -> AppResult<Vec<TicketRecord>>;

    /// Inserts the record, replacing any existing record with the same key.
    fn add(&self, record: TicketRecord) -> AppResult<()>;

    /// Replaces an existing record; fails when the key is unknown.
    fn update(&self, record: TicketRecord) -> AppResult<()>;

    fn get_by_key(&self, key: &str) -> AppResult<Option<TicketRecord>>;

    fn get_all(&self) -> AppResult<Vec<TicketRecord>> {
        self.load_all()
    }
}
