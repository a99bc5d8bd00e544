use crate::DescriptorError;
use semver::{Version, VersionReq};
use tracing::warn;

/// Length in bytes of the leading dotted-numeric prefix of `raw`, together
/// with the number of numeric components it contains. `None` when `raw`
/// does not start with a digit.
fn numeric_prefix(raw: &str) -> Option<(usize, usize)> {
    let bytes = raw.as_bytes();
    if !bytes.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut end = 0;
    let mut components = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        components += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        // Consume a '.' only when another numeric component follows.
        if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
            end += 1;
        } else {
            break;
        }
    }
    Some((end, components))
}

/// Best-effort mapping of an arbitrary version token to a three-component
/// dotted numeric form, used only for comparison, never for display or
/// storage.
///
/// `"17"` becomes `"17.0.0"`, `"1.2"` becomes `"1.2.0"`, and anything
/// already carrying three numeric components is returned unchanged. Any
/// suffix after the numeric prefix is preserved (`"1.2-beta"` becomes
/// `"1.2.0-beta"`). Tokens without a leading digit cannot be normalized.
pub fn normalize_to_semver(raw: &str) -> Option<String> {
    let (end, components) = numeric_prefix(raw)?;
    let (prefix, suffix) = raw.split_at(end);
    match components {
        0 => None,
        1 => Some(format!("{prefix}.0.0{suffix}")),
        2 => Some(format!("{prefix}.0{suffix}")),
        _ => Some(raw.to_owned()),
    }
}

/// Filter `raws` down to the entries whose normalized form satisfies
/// `range`, returning the surviving **original raw strings** in input order.
///
/// Entries that cannot be normalized (or whose normalized form is still not
/// a parseable semantic version) are excluded with a warning rather than
/// failing the whole resolution.
pub fn matching_versions(range: &str, raws: &[String]) -> Result<Vec<String>, DescriptorError> {
    let req = VersionReq::parse(range).map_err(|e| DescriptorError::InvalidRange {
        range: range.to_owned(),
        reason: e.to_string(),
    })?;
    let mut out = Vec::new();
    for raw in raws {
        let Some(normalized) = normalize_to_semver(raw) else {
            warn!("version '{raw}' is not semver-normalizable; excluded from range matching");
            continue;
        };
        match Version::parse(&normalized) {
            Ok(version) => {
                if req.matches(&version) {
                    out.push(raw.clone());
                }
            }
            Err(e) => {
                warn!("normalized version '{normalized}' is not valid semver ({e}); excluded");
            }
        }
    }
    Ok(out)
}

/// Strict `major.minor.patch` numeric triple, with no prefix or suffix.
pub fn is_valid_container_version(s: &str) -> bool {
    let mut parts = 0;
    for part in s.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}

/// Increment the patch component of a strict three-component numeric version.
///
/// Deliberately narrow: container versions are always plain numeric triples,
/// so anything else is rejected rather than passed through a general semver
/// library's lenient handling.
pub fn increment_patch(version: &str) -> Result<String, DescriptorError> {
    if !is_valid_container_version(version) {
        return Err(DescriptorError::InvalidContainerVersion(version.to_owned()));
    }
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().unwrap_or_default();
    let patch: u64 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| DescriptorError::InvalidContainerVersion(version.to_owned()))?;
    Ok(format!("{major}.{minor}.{}", patch + 1))
}
