//! Preemptible pricing strategy
//!
//! Decides how much of a launch rides on preemptible capacity, validates
//! price ceilings against current shape prices, and watches tracked
//! instances for provider-initiated interruption.

pub mod monitor;
pub mod prices;
pub mod strategy;

pub use monitor::{InstanceStateSource, InterruptionMonitor, PreemptionEvent, DEFAULT_POLL_INTERVAL};
pub use prices::{MockPriceTable, ShapePriceSource};
pub use strategy::{strategy, validate_ceiling, PricingError, PricingStrategy};
