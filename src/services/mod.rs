pub mod issue_tracker;
pub mod ticket_store;

pub use issue_tracker::IssueTrackerService;
pub use ticket_store::TicketStore;
