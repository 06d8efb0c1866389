// ============================================================================
// Catalog - provider product listings and the design requests behind them
// ============================================================================

pub mod design_request;
pub mod value_objects;

pub use design_request::*;
pub use value_objects::*;
