//! # stakematch-ledger
//!
//! **Ledger & Match Store**: durable records of accounts, matches, ledger
//! entries, cancel requests, disputes, and the admin audit trail, plus the
//! protocol every balance mutation must follow.
//!
//! ## Architecture
//!
//! 1. **Store**: the storage seam. Reads return records with a version;
//!    writes arrive as one [`ChangeSet`] that commits all-or-nothing.
//! 2. **UnitOfWork**: one request's transaction. Records every version it
//!    reads, stages writes, and pairs each balance change with its ledger entry.
//! 3. **MemoryStore**: in-process implementation. Validates every version
//!    expectation and the ledger discipline under one write lock before
//!    applying anything.
//! 4. **SupplyConservation**: tracks external deposits/withdrawals and checks
//!    that match operations never create or destroy coins.
//!
//! ## Commit Flow
//!
//! ```text
//! UnitOfWork.load_*()  → records expected versions
//!          .credit()/.debit()/.put_*()  → staged in memory
//!          .commit()  → Store.commit(ChangeSet)
//!                         ├─ version mismatch → ConcurrencyConflict (retry)
//!                         ├─ entries ≠ balance deltas → LedgerInvariantViolation
//!                         └─ apply everything, bump versions
//! ```

pub mod memory;
pub mod store;
pub mod supply_conservation;
pub mod unit_of_work;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fault;

pub use memory::MemoryStore;
pub use store::{ChangeSet, CommitReceipt, RecordKey, Store, Versioned};
pub use supply_conservation::{SupplyConservation, SupplySnapshot};
pub use unit_of_work::{Committed, UnitOfWork};
