// ============================================================================
// Creator Earnings - pending / realized commission per creator
// ============================================================================

pub mod ledger;
pub mod value_objects;

pub use ledger::*;
pub use value_objects::*;
