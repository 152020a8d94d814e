//! Safety Envelope (C8): pre-flight checks, the transaction state
//! machine, the concurrent-apply file lock, and the remote-session
//! watchdog.

pub mod lock;
pub mod preflight;
pub mod transaction;
pub mod validate;
pub mod watchdog;

pub use lock::TransactionLock;
pub use transaction::Transaction;
pub use watchdog::{Watchdog, WatchdogState};
