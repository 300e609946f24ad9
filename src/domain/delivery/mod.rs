// ============================================================================
// Delivery Domain - status machine and price reconstruction
// ============================================================================
//
// - Value objects (DeliveryStatus, PaymentMethod, ProductItem, ...)
// - Transition messages exchanged with the store
// - Commands (Confirm, Cancel)
// - Errors (DeliveryError, FieldError)
// - Aggregate (Delivery with its transition rules)
// - Pricing (pre-discount price and totals from stored fields)
// - Command Handler (DeliveryCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod pricing;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use pricing::*;
pub use command_handler::*;
