pub mod entry;
pub mod store;
pub mod verify;

pub use entry::{CandidateMessage, LogEntry, GENESIS_HASH};
pub use store::LedgerStore;
pub use verify::{BreakKind, ChainBreak, ChainVerifier, IntegrityReport};
