//! Transaction journals and the commit protocol.
//!
//! Every attempt records the refs it touches in a [`Journal`]:
//! - **Isolation**: reads and writes go to per-attempt [`Entry`] values
//! - **Validation**: an entry is valid while its ref still holds the version read
//! - **Atomicity**: pending writes are installed together under one lock

pub(crate) mod commit;
mod entry;
mod journal;

pub use entry::Entry;
pub use journal::Journal;
