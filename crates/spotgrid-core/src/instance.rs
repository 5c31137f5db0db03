//! Instance-type name parsing.
//!
//! EC2 instance types look like `{family}.{size}` (`c5.large`,
//! `m6gd.2xlarge`). The family encodes generation and processor, the size
//! orders siblings within a family.

use crate::types::Architecture;

/// Sizes in ascending order of capacity.
const SIZE_LADDER: &[&str] = &[
    "nano", "micro", "small", "medium", "large", "xlarge", "2xlarge", "3xlarge", "4xlarge",
    "6xlarge", "8xlarge", "9xlarge", "10xlarge", "12xlarge", "16xlarge", "18xlarge",
    "24xlarge", "32xlarge", "48xlarge", "metal",
];

/// Family part of an instance type (`c5` for `c5.large`).
pub fn family(instance_type: &str) -> &str {
    instance_type
        .split_once('.')
        .map_or(instance_type, |(family, _)| family)
}

/// Size part of an instance type (`large` for `c5.large`).
pub fn size(instance_type: &str) -> Option<&str> {
    instance_type.split_once('.').map(|(_, size)| size)
}

/// Position of the size on the ladder, `None` for unknown sizes.
pub fn size_rank(instance_type: &str) -> Option<usize> {
    let size = size(instance_type)?;
    SIZE_LADDER.iter().position(|s| *s == size)
}

/// Fraction of the size ladder above this instance (0.0 for the largest
/// size, approaching 1.0 for the smallest). Unknown sizes sit mid-ladder.
pub fn sibling_pressure(instance_type: &str) -> f64 {
    let top = (SIZE_LADDER.len() - 1) as f64;
    match size_rank(instance_type) {
        Some(rank) => (top - rank as f64) / top,
        None => 0.5,
    }
}

/// Region of an availability zone (`ap-south-1` for `ap-south-1a`).
pub fn region_of_zone(zone: &str) -> &str {
    zone.trim_end_matches(|c: char| c.is_ascii_lowercase())
}

/// Infer the processor architecture from the family name.
///
/// Graviton families carry a `g` right after the generation digit
/// (`m6g`, `c7gn`, `im4gn`); `a1` is the first-generation Graviton.
pub fn infer_architecture(instance_type: &str) -> Architecture {
    let family = family(instance_type);
    if family == "a1" {
        return Architecture::Arm64;
    }
    let suffix = family
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start_matches(|c: char| c.is_ascii_digit());
    if suffix.starts_with('g') {
        Architecture::Arm64
    } else {
        Architecture::X86_64
    }
}
