//! Weight Planner (C5): turns a set of alive, optionally AS-annotated
//! probes into a [`Plan`] of weighted multipath nexthops.

pub mod weight;

pub use weight::plan;
