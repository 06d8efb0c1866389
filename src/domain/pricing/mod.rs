// ============================================================================
// Pricing - pure money arithmetic
// ============================================================================
//
// - commission: profit split between creator and platform
// - exchange:   rate snapshots and the rate-provider collaborator
//
// ============================================================================

pub mod commission;
pub mod errors;
pub mod exchange;

pub use commission::*;
pub use errors::*;
pub use exchange::*;
