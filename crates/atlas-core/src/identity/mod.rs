//! Stable identifier format and allocation.

mod assigner;
mod stable_id;

pub use assigner::{
    needs_assignment, next_stable_id, repair_order, AssignedIdentity, AssignmentReport,
    IdentityCandidate, IdentityFailure,
};
pub use stable_id::StableId;
