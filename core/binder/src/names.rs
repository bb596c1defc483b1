//! Logical node name parsing.
//!
//! Node names follow `{partition}-{nodegroup}-{index}` with alphanumeric
//! partition and group components. Names that do not parse are logged and
//! skipped; the scheduler may host nodes this engine does not manage.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeName {
    pub partition: String,
    pub node_group: String,
    pub index: u32,
}

fn node_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z0-9]+)-([a-zA-Z0-9]+)-([0-9]+)$").unwrap())
}

impl NodeName {
    pub fn parse(name: &str) -> Option<Self> {
        let captures = node_name_re().captures(name)?;
        Some(NodeName {
            partition: captures[1].to_string(),
            node_group: captures[2].to_string(),
            index: captures[3].parse().ok()?,
        })
    }
}

/// Group node names by (partition, node-group), preserving request order
/// within each group and the order groups first appear. Unparseable names
/// are skipped with a warning.
pub fn group_by_node_group(names: &[String]) -> Vec<((String, String), Vec<String>)> {
    let mut groups: Vec<((String, String), Vec<String>)> = Vec::new();
    for name in names {
        let Some(parsed) = NodeName::parse(name) else {
            warn!(node = %name, "node name does not match partition-group-index shape, skipping");
            continue;
        };
        let key = (parsed.partition, parsed.node_group);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(name.clone()),
            None => groups.push((key, vec![name.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let parsed = NodeName::parse("hpc-od-007").unwrap();
        assert_eq!(parsed.partition, "hpc");
        assert_eq!(parsed.node_group, "od");
        assert_eq!(parsed.index, 7);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(NodeName::parse("hpc-od").is_none());
        assert!(NodeName::parse("hpc-od-xyz").is_none());
        assert!(NodeName::parse("hpc_od-001").is_none());
        assert!(NodeName::parse("hpc-od-001-extra").is_none());
    }

    #[test]
    fn test_grouping_preserves_order_and_skips_unparseable() {
        let names = vec![
            "hpc-od-001".to_string(),
            "hpc-spot-001".to_string(),
            "not_a_node".to_string(),
            "hpc-od-002".to_string(),
        ];
        let groups = group_by_node_group(&names);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ("hpc".to_string(), "od".to_string()));
        assert_eq!(groups[0].1, vec!["hpc-od-001".to_string(), "hpc-od-002".to_string()]);
        assert_eq!(groups[1].1, vec!["hpc-spot-001".to_string()]);
    }
}
