//! Interface inventory (C2), probe engine (C3), and AS-path intelligence
//! (C4) for netopt.

pub mod aspath;
pub mod cache;
pub mod inventory;
pub mod probe;

pub use aspath::annotate;
pub use cache::ProbeCache;
pub use inventory::{gateway, list};
pub use probe::{probe, probe_batch, ProbeOpts};
