//! Route Applicator (C6): install a weighted multipath default route,
//! back it up, restore it, tune TCP sysctls, and configure DNS.

pub mod dns;
pub mod route;
pub mod sysctl;

pub use dns::configure_dns;
pub use route::{apply, backup, restore};
pub use sysctl::tune_sysctl;
