//! Rebuild jobs for the video recommendation engine
//!
//! [`Jobs`] rebuilds preference profiles, the interaction model and the
//! embedding index of the engine and search service it is given. Embed it
//! with [`scheduler::run`] in the process that serves queries so rebuilt
//! snapshots are swapped into the live instances. The `vidrec-worker`
//! binary runs the same jobs offline.

pub mod jobs;
pub mod scheduler;

pub use jobs::{JobKind, JobReport, Jobs};
