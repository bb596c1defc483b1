//! Instance-family catalog
//!
//! Static table describing the cloud instance families the engine is willing
//! to launch: whether a family carries the low-latency fabric adapter, which
//! hardware generation of it, and its general network class.

use serde::{Deserialize, Serialize};

/// Network class of an instance family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkClass {
    /// Standard VPC networking.
    Standard,
    /// Enhanced networking (ENA), no user-space fabric.
    Enhanced,
    /// Fabric-capable, HPC-grade interconnect.
    Fabric,
}

/// One row of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceFamily {
    /// Family prefix, e.g. `c6in` in `c6in.4xlarge`.
    pub name: &'static str,
    /// Whether the family exposes the low-latency fabric adapter.
    pub supports_fabric: bool,
    /// Fabric hardware generation, 0 when unsupported.
    pub fabric_generation: u8,
    pub network_class: NetworkClass,
}

/// The full family table. Order within each class list below is the
/// preference order the analyzer emits.
const FAMILIES: &[InstanceFamily] = &[
    InstanceFamily { name: "hpc7a", supports_fabric: true, fabric_generation: 2, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "hpc6a", supports_fabric: true, fabric_generation: 1, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "c6in", supports_fabric: true, fabric_generation: 2, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "c5n", supports_fabric: true, fabric_generation: 1, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "r6in", supports_fabric: true, fabric_generation: 2, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "r5n", supports_fabric: true, fabric_generation: 1, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "p4d", supports_fabric: true, fabric_generation: 2, network_class: NetworkClass::Fabric },
    InstanceFamily { name: "g5", supports_fabric: false, fabric_generation: 0, network_class: NetworkClass::Enhanced },
    InstanceFamily { name: "c6i", supports_fabric: false, fabric_generation: 0, network_class: NetworkClass::Enhanced },
    InstanceFamily { name: "m6i", supports_fabric: false, fabric_generation: 0, network_class: NetworkClass::Enhanced },
    InstanceFamily { name: "m5", supports_fabric: false, fabric_generation: 0, network_class: NetworkClass::Standard },
];

/// HPC-class families, largest fabric generation first.
pub fn hpc_families() -> Vec<&'static str> {
    vec!["hpc7a", "hpc6a"]
}

/// Compute families with fabric support.
pub fn compute_fabric_families() -> Vec<&'static str> {
    vec!["c6in", "c5n"]
}

/// Memory-heavy families with fabric support.
pub fn memory_fabric_families() -> Vec<&'static str> {
    vec!["r6in", "r5n"]
}

/// Accelerator families.
pub fn accelerator_families() -> Vec<&'static str> {
    vec!["p4d", "g5"]
}

/// General compute and general-purpose families.
pub fn general_families() -> Vec<&'static str> {
    vec!["c6i", "m6i", "m5"]
}

/// Look up a family row by its prefix.
pub fn family(name: &str) -> Option<&'static InstanceFamily> {
    FAMILIES.iter().find(|f| f.name == name)
}

/// Family prefix of a full shape name (`c6in.4xlarge` -> `c6in`).
pub fn family_of_shape(shape: &str) -> Option<&str> {
    shape.split('.').next().filter(|s| !s.is_empty())
}

/// Whether a full shape name belongs to a fabric-capable family.
pub fn shape_supports_fabric(shape: &str) -> bool {
    family_of_shape(shape)
        .and_then(family)
        .map(|f| f.supports_fabric)
        .unwrap_or(false)
}

/// Size tier derived from the per-node resource envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeTier {
    Small,
    Medium,
    Large,
    Xlarge,
    Huge,
}

impl SizeTier {
    /// Classify a per-node envelope. Thresholds are inclusive.
    pub fn classify(memory_mib: u64, cpus: u32) -> Self {
        const GIB: u64 = 1024;
        if memory_mib <= 8 * GIB && cpus <= 2 {
            SizeTier::Small
        } else if memory_mib <= 16 * GIB && cpus <= 4 {
            SizeTier::Medium
        } else if memory_mib <= 32 * GIB && cpus <= 8 {
            SizeTier::Large
        } else if memory_mib <= 64 * GIB && cpus <= 16 {
            SizeTier::Xlarge
        } else {
            SizeTier::Huge
        }
    }

    /// Instance size suffix that exactly fits this tier.
    pub fn suffix(self) -> &'static str {
        match self {
            SizeTier::Small => "large",
            SizeTier::Medium => "xlarge",
            SizeTier::Large => "2xlarge",
            SizeTier::Xlarge => "4xlarge",
            SizeTier::Huge => "8xlarge",
        }
    }

    /// The next size up, saturating at the largest tier.
    pub fn one_up(self) -> Self {
        match self {
            SizeTier::Small => SizeTier::Medium,
            SizeTier::Medium => SizeTier::Large,
            SizeTier::Large => SizeTier::Xlarge,
            SizeTier::Xlarge => SizeTier::Huge,
            SizeTier::Huge => SizeTier::Huge,
        }
    }
}

/// Canonical shape for an accelerator family. Accelerator families come in
/// one usable size per family and preempt normal sizing.
pub fn accelerator_shape(family: &str) -> Option<&'static str> {
    match family {
        "p4d" => Some("p4d.24xlarge"),
        "g5" => Some("g5.12xlarge"),
        _ => None,
    }
}

/// Candidate shapes for one family at a given tier, larger size first so a
/// lowest-price allocator still lands on the exact fit while keeping one
/// step of headroom available.
pub fn shapes_for(family: &str, tier: SizeTier) -> Vec<String> {
    let up = tier.one_up();
    if up == tier {
        vec![format!("{}.{}", family, tier.suffix())]
    } else {
        vec![
            format!("{}.{}", family, up.suffix()),
            format!("{}.{}", family, tier.suffix()),
        ]
    }
}
