//! Delivery lifecycle core: the Pending → Confirmed/Cancelled status machine,
//! price reconstruction from discounted unit prices, and the store adapters
//! that carry transitions to the remote delivery API.

pub mod config;
pub mod domain;
pub mod metrics;
pub mod store;

pub use domain::delivery::{
    reconstruct_pricing, ConfirmInput, Delivery, DeliveryCommand, DeliveryCommandHandler, DeliveryError,
    DeliveryStatus, FieldError, PaymentMethod, PricingBreakdown, ProductItem,
};
pub use store::{DeliveryStore, HttpDeliveryStore, InMemoryDeliveryStore, StoreError};
