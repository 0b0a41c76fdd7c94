pub mod issue;
pub mod key;
pub mod record;
pub mod ticket;
