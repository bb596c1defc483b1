//! Pricing policy per job class.

use crate::prices::ShapePriceSource;
use burst_analyzer::{FabricDemand, InstanceRequirements, Job};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("no candidate shape is within the preemptible price ceiling of {ceiling}")]
    PriceCeilingExceeded { ceiling: f64 },
}

/// How a launch is priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    /// Fraction of the target capacity to place on preemptible capacity.
    pub preemptible_ratio: f64,
    pub allow_mixed: bool,
    /// Ceiling for preemptible bids, USD per instance-hour.
    pub price_ceiling: Option<f64>,
    /// Fall back to on-demand capacity when preemptible is unavailable or
    /// priced out.
    pub on_demand_fallback: bool,
}

/// Decide the pricing strategy for a classified job.
pub fn strategy(job: &Job, reqs: &InstanceRequirements) -> PricingStrategy {
    let ceiling = reqs.pricing.max_preemptible_price;
    let strategy = if job.tightly_coupled && reqs.fabric == FabricDemand::Required {
        // Interruptions kill the whole gang; keep most of it on-demand.
        PricingStrategy {
            preemptible_ratio: 0.3,
            allow_mixed: true,
            price_ceiling: ceiling,
            on_demand_fallback: true,
        }
    } else if job.tightly_coupled {
        PricingStrategy {
            preemptible_ratio: 0.7,
            allow_mixed: true,
            price_ceiling: ceiling,
            on_demand_fallback: false,
        }
    } else if reqs.pricing.prefer_preemptible {
        PricingStrategy {
            preemptible_ratio: 0.9,
            allow_mixed: true,
            price_ceiling: ceiling,
            on_demand_fallback: false,
        }
    } else {
        PricingStrategy {
            preemptible_ratio: 0.5,
            allow_mixed: false,
            price_ceiling: ceiling,
            on_demand_fallback: false,
        }
    };
    debug!(
        job = %job.id,
        ratio = strategy.preemptible_ratio,
        mixed = strategy.allow_mixed,
        "pricing strategy"
    );
    strategy
}

/// Check the ceiling against current prices for the candidate shapes.
///
/// Fails only when preemptible capacity is actually wanted, every candidate
/// exceeds the ceiling, and on-demand fallback is off. Shapes with unknown
/// prices count as affordable; the fleet allocator is the final arbiter.
pub fn validate_ceiling(
    strategy: &PricingStrategy,
    shapes: &[String],
    source: &dyn ShapePriceSource,
) -> Result<(), PricingError> {
    if strategy.preemptible_ratio <= 0.0 {
        return Ok(());
    }
    let Some(ceiling) = strategy.price_ceiling else {
        return Ok(());
    };

    let mut any_affordable = false;
    for shape in shapes {
        match source.price(shape) {
            Some(price) if price > ceiling => {
                debug!(shape = %shape, price, ceiling, "shape above price ceiling");
            }
            _ => any_affordable = true,
        }
    }

    if !any_affordable && !strategy.on_demand_fallback {
        return Err(PricingError::PriceCeilingExceeded { ceiling });
    }
    if !any_affordable {
        warn!(ceiling, "all candidate shapes above ceiling, relying on on-demand fallback");
    }
    Ok(())
}
