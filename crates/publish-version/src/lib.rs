//! Version naming and allocation
//!
//! Published versions of a subset live in sibling directories named after
//! their number. This crate owns the naming rule and picks the next number
//! from a listing of those directories. It performs no I/O.

use thiserror::Error;

/// Minimum width of a formatted version name (zero-padded)
pub const VERSION_WIDTH: usize = 3;

/// Errors from version allocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocateError {
    #[error("version numbers exhausted: latest version is {latest}")]
    Exhausted { latest: u32 },
}

/// Format a version number as its directory name.
///
/// `1` -> `001`, `42` -> `042`, `1234` -> `1234`.
pub fn format_version(number: u32) -> String {
    format!("{:0width$}", number, width = VERSION_WIDTH)
}

/// Parse a directory name produced by [`format_version`].
///
/// Only names that round-trip exactly are versions. Anything else
/// (`v001`, `0001`, `01`, `000`, `.incoming-x`) returns `None`.
pub fn parse_version(name: &str) -> Option<u32> {
    if name.len() < VERSION_WIDTH || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let number: u32 = name.parse().ok()?;
    if number == 0 || format_version(number) != name {
        return None;
    }

    Some(number)
}

/// Highest version among `names`, ignoring anything that is not a version.
pub fn latest_version<I, S>(names: I) -> Option<u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| parse_version(name.as_ref()))
        .max()
}

/// Next version number to allocate given the existing entry names.
///
/// Returns `1` when no entry is a version, otherwise the highest version + 1.
pub fn allocate_next<I, S>(existing: I) -> Result<u32, AllocateError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    match latest_version(existing) {
        None => Ok(1),
        Some(latest) => latest
            .checked_add(1)
            .ok_or(AllocateError::Exhausted { latest }),
    }
}
