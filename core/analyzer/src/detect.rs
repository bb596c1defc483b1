//! Tight-coupling detectors.
//!
//! Four independent detectors, each returning a positive flag plus a
//! confidence in `[0, 1]`. The caller folds them by maximum confidence; a
//! job is considered tightly coupled when the winning confidence exceeds
//! 0.5.

use crate::job::Job;
use regex::Regex;
use std::sync::OnceLock;

/// One detector's verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub positive: bool,
    pub confidence: f64,
}

impl Detection {
    pub const fn negative() -> Self {
        Detection { positive: false, confidence: 0.0 }
    }

    pub const fn of(positive: bool, confidence: f64) -> Self {
        Detection { positive, confidence }
    }
}

fn task_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^#SBATCH\s+(?:--ntasks[=\s]|-n\s+)(\d+)").unwrap()
    })
}

fn launcher_proc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bmpi(?:run|exec)\S*\s+(?:-np?|-n)\s+(\d+)").unwrap())
}

/// Task count declared in the script or the resource envelope, if any.
pub fn declared_task_count(job: &Job) -> Option<u32> {
    if let Some(n) = job.resources.task_count {
        return Some(n);
    }
    if let Some(cap) = task_decl_re().captures(&job.script) {
        return cap[1].parse().ok();
    }
    if let Some(cap) = launcher_proc_re().captures(&job.script) {
        return cap[1].parse().ok();
    }
    None
}

/// Task-count detector: more tasks than nodes, but not more than the nodes
/// can hold, reads as a multi-process parallel job.
pub fn task_count(job: &Job, cpus_per_node: u32) -> Detection {
    let nodes = job.resources.node_count;
    let Some(tasks) = declared_task_count(job) else {
        return Detection::negative();
    };
    if nodes == 0 {
        return Detection::negative();
    }
    if tasks > nodes && tasks <= nodes * cpus_per_node {
        Detection::of(true, 0.9)
    } else if tasks == nodes {
        Detection::of(false, 0.1)
    } else {
        Detection::negative()
    }
}

fn high_confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bmpi(?:run|exec)\b|\bsrun\b.*--mpi|#include\s*<mpi\.h>|\buse\s+mpi\b|from\s+mpi4py|\bcharmrun\b",
        )
        .unwrap()
    })
}

fn medium_confidence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)openmpi|mvapich|intel[-_ ]?mpi|\bnccl\b|\bhorovod\b|\bucx\b").unwrap()
    })
}

/// Script-content detector: parallel-launcher invocations and parallel API
/// headers score high, weaker runtime mentions score medium.
pub fn script_content(job: &Job) -> Detection {
    if high_confidence_re().is_match(&job.script) {
        Detection::of(true, 0.9)
    } else if medium_confidence_re().is_match(&job.script) {
        Detection::of(true, 0.6)
    } else {
        Detection::negative()
    }
}

/// Domain codes known to be tightly coupled, with per-entry confidence.
const KNOWN_APPLICATIONS: &[(&str, f64)] = &[
    ("gromacs", 0.95),
    ("lammps", 0.9),
    ("namd", 0.9),
    ("vasp", 0.95),
    ("quantum espresso", 0.9),
    ("cp2k", 0.9),
    ("nwchem", 0.9),
    ("wrf", 0.9),
    ("cesm", 0.85),
    ("openfoam", 0.85),
    ("gamess", 0.85),
];

/// Known-application detector: membership test of the job name and script
/// against the static table above.
pub fn known_application(job: &Job) -> Detection {
    let name = job.name.to_lowercase();
    let script = job.script.to_lowercase();
    let mut best = Detection::negative();
    for (app, confidence) in KNOWN_APPLICATIONS {
        if (name.contains(app) || script.contains(app)) && *confidence > best.confidence {
            best = Detection::of(true, *confidence);
        }
    }
    best
}

/// Environment-variable prefixes planted by parallel runtimes.
const RUNTIME_ENV_PREFIXES: &[&str] = &[
    "OMPI_", "MPICH_", "I_MPI_", "MV2_", "PMI_", "PMIX_", "NCCL_", "UCX_", "HOROVOD_",
];

/// Environment detector: presence of variables whose names begin with a
/// known parallel-runtime prefix.
pub fn environment(job: &Job) -> Detection {
    let hit = job
        .env
        .keys()
        .any(|k| RUNTIME_ENV_PREFIXES.iter().any(|p| k.starts_with(p)));
    if hit {
        Detection::of(true, 0.6)
    } else {
        Detection::negative()
    }
}

/// Run all four detectors and fold by maximum confidence.
pub fn classify(job: &Job, cpus_per_node: u32) -> (bool, f64) {
    let detections = [
        task_count(job, cpus_per_node),
        script_content(job),
        known_application(job),
        environment(job),
    ];
    let best = detections
        .iter()
        .filter(|d| d.positive)
        .map(|d| d.confidence)
        .fold(0.0_f64, f64::max);
    (best > 0.5, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ResourceEnvelope;
    use std::collections::{HashMap, HashSet};

    fn job_with_script(script: &str, nodes: u32, tasks: Option<u32>) -> Job {
        Job {
            id: "1".to_string(),
            name: "test".to_string(),
            partition: "p".to_string(),
            node_names: (0..nodes).map(|i| format!("p-g-{:03}", i)).collect(),
            resources: ResourceEnvelope {
                node_count: nodes,
                cpus_per_node: 4,
                memory_mib_per_node: 8192,
                task_count: tasks,
                ..ResourceEnvelope::default()
            },
            script: script.to_string(),
            env: HashMap::new(),
            features: HashSet::new(),
            tightly_coupled: false,
            process_count: 0,
            topology: crate::job::Topology::Any,
        }
    }

    #[test]
    fn test_task_count_parallel_fill() {
        let job = job_with_script("", 4, Some(12));
        let d = task_count(&job, 4);
        assert!(d.positive);
        assert_eq!(d.confidence, 0.9);
    }

    #[test]
    fn test_task_count_one_per_node() {
        let job = job_with_script("", 4, Some(4));
        let d = task_count(&job, 4);
        assert!(!d.positive);
        assert_eq!(d.confidence, 0.1);
    }

    #[test]
    fn test_task_count_oversubscribed_is_negative() {
        let job = job_with_script("", 4, Some(64));
        assert_eq!(task_count(&job, 4), Detection::negative());
    }

    #[test]
    fn test_declared_task_count_from_sbatch() {
        let job = job_with_script("#!/bin/bash\n#SBATCH --ntasks=48\nsrun ./a.out\n", 4, None);
        assert_eq!(declared_task_count(&job), Some(48));
    }

    #[test]
    fn test_declared_task_count_from_launcher() {
        let job = job_with_script("mpirun -np 512 ./climate\n", 32, None);
        assert_eq!(declared_task_count(&job), Some(512));
    }

    #[test]
    fn test_script_launcher_scores_high() {
        let job = job_with_script("mpirun -np 512 ./model", 32, None);
        let d = script_content(&job);
        assert!(d.positive);
        assert_eq!(d.confidence, 0.9);
    }

    #[test]
    fn test_script_runtime_mention_scores_medium() {
        let job = job_with_script("module load openmpi/4.1\n./run.sh", 2, None);
        let d = script_content(&job);
        assert!(d.positive);
        assert_eq!(d.confidence, 0.6);
    }

    #[test]
    fn test_plain_script_is_negative() {
        let job = job_with_script("./run.sh $TASK_ID", 8, None);
        assert_eq!(script_content(&job), Detection::negative());
        assert_eq!(known_application(&job), Detection::negative());
    }

    #[test]
    fn test_known_application_by_name() {
        let mut job = job_with_script("", 8, None);
        job.name = "gromacs-md-prod".to_string();
        let d = known_application(&job);
        assert!(d.positive);
        assert_eq!(d.confidence, 0.95);
    }

    #[test]
    fn test_environment_prefix() {
        let mut job = job_with_script("", 2, None);
        job.env.insert("OMPI_MCA_btl".to_string(), "self,vader".to_string());
        let d = environment(&job);
        assert!(d.positive);
        assert_eq!(d.confidence, 0.6);
    }

    #[test]
    fn test_classify_folds_by_max_confidence() {
        let mut job = job_with_script("module load openmpi\n./run", 2, None);
        job.env.insert("UCX_TLS".to_string(), "rc".to_string());
        let (tight, confidence) = classify(&job, 4);
        assert!(tight);
        assert_eq!(confidence, 0.6);
    }

    #[test]
    fn test_classify_below_threshold_is_independent() {
        let job = job_with_script("./run.sh", 8, Some(8));
        let (tight, _) = classify(&job, 4);
        assert!(!tight);
    }
}
