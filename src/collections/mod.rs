//! Arena-backed intrusive doubly-linked lists.
//!
//! Entries of the C reference carried raw `next`/`prev` pointers and were
//! mutated under a global interrupt mask. Here the nodes live in a fixed
//! [`Arena`] and are addressed by [`Handle`]s carrying a generation
//! counter, so a stale handle dereferences to `None` instead of walking
//! freed memory; exclusive mutation is guaranteed by `&mut` on the owning
//! store rather than by masking interrupts.

mod dl_list;

pub use self::dl_list::{Arena, Handle, List, ListIter};
