//! Civic code and incident video code generation
//!
//! A civic code identifies one registered agent:
//!
//! ```text
//! {COUNTY_PREFIX}-{CONSTITUENCY_CODE}-{WARD_CODE}-{SEQ}
//! NAIROBI-002-0004-07
//! ```
//!
//! Formatting is total: any county/constituency/ward strings are accepted.
//! Names missing from the reference data fall back to a prefix of the name
//! itself, padded as a string. Two different names sharing a prefix therefore
//! produce the same segment; the `civic_code` UNIQUE constraint and the
//! registration retry loop in `db::agents` handle the resulting collisions.

use crate::reference::ReferenceData;

/// Characters kept from the upper-cased county name
pub const COUNTY_PREFIX_LEN: usize = 7;
/// Width of the constituency segment
pub const CONSTITUENCY_CODE_WIDTH: usize = 3;
/// Width of the ward segment
pub const WARD_CODE_WIDTH: usize = 4;
/// Minimum width of the sequence segment
pub const SEQUENCE_WIDTH: usize = 2;

/// Maximum incident videos per agent, lettered in upload order
pub const VIDEO_LETTERS: [char; 3] = ['A', 'B', 'C'];

/// Format a civic code for an agent holding ward sequence number `seq`
///
/// # Examples
/// ```
/// use civic_common::civic_code::format_civic_code;
/// use civic_common::ReferenceData;
///
/// let reference = ReferenceData::builtin().unwrap();
/// let code = format_civic_code(&reference, "Nairobi", "Kasarani", "Ruai", 7);
/// assert_eq!(code, "NAIROBI-002-0004-07");
/// ```
pub fn format_civic_code(
    reference: &ReferenceData,
    county: &str,
    constituency: &str,
    ward: &str,
    seq: i64,
) -> String {
    format!(
        "{}-{}-{}-{}",
        county_prefix(county),
        constituency_segment(reference, constituency),
        ward_segment(reference, ward),
        sequence_segment(seq)
    )
}

/// County upper-cased, then cut to 7 characters
pub fn county_prefix(county: &str) -> String {
    county.to_uppercase().chars().take(COUNTY_PREFIX_LEN).collect()
}

pub fn constituency_segment(reference: &ReferenceData, constituency: &str) -> String {
    match reference.constituency_code(constituency) {
        Some(code) => code.to_string(),
        None => fallback_segment(constituency, CONSTITUENCY_CODE_WIDTH),
    }
}

pub fn ward_segment(reference: &ReferenceData, ward: &str) -> String {
    match reference.ward_code(ward) {
        Some(code) => code.to_string(),
        None => fallback_segment(ward, WARD_CODE_WIDTH),
    }
}

/// `seq` zero-padded to two digits; wider values are kept whole
pub fn sequence_segment(seq: i64) -> String {
    format!("{:0width$}", seq, width = SEQUENCE_WIDTH)
}

/// First `width` characters of `name`, left-padded with '0' to `width`
///
/// The name is treated as text: "Ab" becomes "0Ab", never a number.
fn fallback_segment(name: &str, width: usize) -> String {
    let head: String = name.chars().take(width).collect();
    let pad = width - head.chars().count();
    let mut out = "0".repeat(pad);
    out.push_str(&head);
    out
}

/// Video code for an agent's `existing`-th upload (0-based)
///
/// Returns `None` once the agent has used all letters.
pub fn video_code(civic_code: &str, existing: usize) -> Option<String> {
    VIDEO_LETTERS
        .get(existing)
        .map(|letter| format!("{}-{}", civic_code, letter))
}
