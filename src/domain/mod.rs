// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure business rules, no I/O:
// - pricing:  commission split and currency conversion
// - order:    the Order aggregate and its state machine
// - earnings: creator earnings postings
// - catalog:  listings and design requests
//
// Persistence lives in `crate::store`, the provider in `crate::provider`.
//
// ============================================================================

pub mod aggregate;
pub mod catalog;
pub mod earnings;
pub mod order;
pub mod pricing;
