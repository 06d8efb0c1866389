// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus, Shipment, Charge)
// - Events and commands
// - Provider status mapper
// - Aggregate (Order, the state machine)
// - Command handler (conditional writes + ledger flush)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod status_mapper;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use status_mapper::*;
pub use aggregate::Order;
pub use command_handler::*;
