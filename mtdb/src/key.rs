use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifies one logical experiment; repeated runs share the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationKey {
    pub queue_depth: u64,
    pub thread_count: u64,
    pub iat_scale: u64,
    pub t1_size_mb: u64,
    pub t2_size_mb: u64,
}

impl ConfigurationKey {
    pub fn is_single_tier(&self) -> bool {
        self.t2_size_mb == 0
    }

    /// The key with the tier-2 size dropped: ST and MT runs that can be
    /// compared share it.
    pub fn tier1_group(&self) -> Tier1Group {
        Tier1Group {
            workload: self.workload(),
            t1_size_mb: self.t1_size_mb,
        }
    }

    pub fn workload(&self) -> WorkloadConfig {
        WorkloadConfig {
            queue_depth: self.queue_depth,
            thread_count: self.thread_count,
            iat_scale: self.iat_scale,
        }
    }
}

impl fmt::Display for ConfigurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.queue_depth, self.thread_count, self.iat_scale, self.t1_size_mb, self.t2_size_mb
        )
    }
}

/// Replay settings shared by every cache size tried on a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub queue_depth: u64,
    pub thread_count: u64,
    pub iat_scale: u64,
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.queue_depth, self.thread_count, self.iat_scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tier1Group {
    pub workload: WorkloadConfig,
    pub t1_size_mb: u64,
}

static FILE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_(\d+)_(\d+)_(\d+)_(\d+)_(\d+)(?:\.dump)?$").expect("static regex")
});

/// `{queueDepth}_{threadCount}_{iatScale}_{t1MB}_{t2MB}_{iteration}[.dump]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileName {
    pub key: ConfigurationKey,
    pub iteration: u32,
}

impl FileName {
    pub fn parse(name: &str) -> Option<Self> {
        let captures = FILE_NAME_REGEX.captures(name)?;
        let field = |i: usize| captures.get(i)?.as_str().parse::<u64>().ok();
        Some(Self {
            key: ConfigurationKey {
                queue_depth: field(1)?,
                thread_count: field(2)?,
                iat_scale: field(3)?,
                t1_size_mb: field(4)?,
                t2_size_mb: field(5)?,
            },
            iteration: captures.get(6)?.as_str().parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let name = FileName::parse("128_8_1_8538_12242_0.dump").unwrap();
        assert_eq!(name.iteration, 0);
        assert_eq!(name.key.queue_depth, 128);
        assert_eq!(name.key.thread_count, 8);
        assert_eq!(name.key.iat_scale, 1);
        assert_eq!(name.key.t1_size_mb, 8538);
        assert_eq!(name.key.t2_size_mb, 12242);

        let name = FileName::parse("128_16_100_800_0_2").unwrap();
        assert_eq!(name.iteration, 2);
        assert!(name.key.is_single_tier());

        assert!(FileName::parse("128_16_100_800_0").is_none());
        assert!(FileName::parse("notes.txt").is_none());
        assert!(FileName::parse("128_16_100_800_0_1.json").is_none());
    }

    #[test]
    fn test_tier1_group() {
        let st = ConfigurationKey {
            queue_depth: 128,
            thread_count: 16,
            iat_scale: 100,
            t1_size_mb: 800,
            t2_size_mb: 0,
        };
        let mt = ConfigurationKey {
            t2_size_mb: 1600,
            ..st
        };
        assert_ne!(st, mt);
        assert_eq!(st.tier1_group(), mt.tier1_group());
        assert_eq!(mt.to_string(), "128-16-100-800-1600");
        assert_eq!(mt.workload().to_string(), "128-16-100");
    }
}
