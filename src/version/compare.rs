//! pacman/RPM-style version comparison
//!
//! Versions are split into epoch, version and release (`[epoch:]version[-release]`).
//! Each part is compared segment by segment, where a segment is a maximal run of
//! alphanumeric characters. The ordering is total: malformed strings are never
//! rejected, they simply fall through the segment and placeholder rules.

use std::cmp::Ordering;

/// Release value used when a version string carries no release part
pub const NO_RELEASE: &str = "-1";

/// Epoch value used when a version string carries no epoch part
pub const DEFAULT_EPOCH: &str = "0";

/// Placeholder for a missing character that follows a digit.
/// Sorts above letters and spaces but below digits.
const DIGIT_PLACEHOLDER: char = '!';

/// A version string split into its epoch, version and release components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTriple<'a> {
    pub epoch: &'a str,
    pub version: &'a str,
    pub release: &'a str,
}

impl<'a> VersionTriple<'a> {
    /// Split `[epoch:]version[-release]`.
    ///
    /// Components are never empty: a missing or empty epoch becomes `"0"`,
    /// a missing or empty release becomes [`NO_RELEASE`].
    pub fn parse(evr: &'a str) -> Self {
        let (epoch, rest) = match evr.split_once(':') {
            Some((epoch, rest)) if !epoch.is_empty() => (epoch, rest),
            Some((_, rest)) => (DEFAULT_EPOCH, rest),
            None => (DEFAULT_EPOCH, evr),
        };

        let (version, release) = match rest.split_once('-') {
            Some((version, release)) if !release.is_empty() => (version, release),
            Some((version, _)) => (version, NO_RELEASE),
            None => (rest, NO_RELEASE),
        };

        Self {
            epoch,
            version,
            release,
        }
    }

    /// Whether the release component should take part in comparisons
    pub fn has_release(&self) -> bool {
        self.release != NO_RELEASE
    }
}

/// Compare two full version strings.
///
/// Releases are only compared when both sides carry one, so `1.5` and `1.5-1`
/// are equal.
pub fn compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let left = VersionTriple::parse(a);
    let right = VersionTriple::parse(b);

    rpm_compare(left.epoch, right.epoch)
        .then_with(|| rpm_compare(left.version, right.version))
        .then_with(|| {
            if left.has_release() && right.has_release() {
                rpm_compare(left.release, right.release)
            } else {
                Ordering::Equal
            }
        })
}

/// Whether a package with the given versions has an update available.
///
/// A remote version of `"0"` means there is no remote package at all.
pub fn is_updatable(local_version: &str, remote_version: &str) -> bool {
    if remote_version == "0" {
        return false;
    }
    compare(local_version, remote_version) == Ordering::Less
}

/// ASCII symbols such as `+`, `~` and `^` separate segments just like `.` and `_`
fn is_separator(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_punctuation()
}

fn is_letter_like(c: char) -> bool {
    c.is_alphabetic() || c.is_whitespace()
}

/// Compare a single epoch, version or release component
fn rpm_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let left: Vec<&str> = a.split(is_separator).filter(|s| !s.is_empty()).collect();
    let right: Vec<&str> = b.split(is_separator).filter(|s| !s.is_empty()).collect();

    let segments = left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| segment_compare(l.as_bytes(), r.as_bytes()))
        .find(|ord| ord.is_ne());

    if let Some(ord) = segments {
        return ord;
    }

    left.len().cmp(&right.len()).then_with(|| {
        let seps_a = a.chars().filter(|c| is_separator(*c)).count();
        let seps_b = b.chars().filter(|c| is_separator(*c)).count();
        seps_a.cmp(&seps_b)
    })
}

/// Compare two segments character by character.
///
/// The shorter segment is padded: after a digit with [`DIGIT_PLACEHOLDER`],
/// otherwise with a space. Once a difference is found, comparison only keeps
/// going while both sides are still inside a run of digits, so longer numbers
/// win over shorter ones.
fn segment_compare(a: &[u8], b: &[u8]) -> Ordering {
    let (len_a, len_b) = (a.len(), b.len());
    let points = len_a.max(len_b);

    let mut result = Ordering::Equal;
    let mut r1 = '\0';
    let mut r2 = '\0';

    for i in 0..points {
        if result.is_ne() && !(r1.is_ascii_digit() && r2.is_ascii_digit()) {
            break;
        }

        r1 = next_char(a, i, r1);
        r2 = next_char(b, i, r2);

        let ord = char_compare(r1, r2);
        if ord.is_ne() {
            result = ord;
            if i + 1 == points || len_a == len_b {
                break;
            }
        }
    }

    if result.is_eq() {
        result = len_a.cmp(&len_b);
    }

    result
}

fn next_char(segment: &[u8], index: usize, previous: char) -> char {
    match segment.get(index) {
        Some(byte) => char::from(*byte),
        None if previous.is_ascii_digit() => DIGIT_PLACEHOLDER,
        None => ' ',
    }
}

/// Class-aware character ordering: letters/spaces < placeholder < digits.
/// Characters of the same class compare by code point; anything else is equal.
fn char_compare(a: char, b: char) -> Ordering {
    if is_letter_like(a) {
        if is_letter_like(b) {
            a.cmp(&b)
        } else if b.is_ascii_digit() || b == DIGIT_PLACEHOLDER {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    } else if a.is_ascii_digit() {
        if is_letter_like(b) || b == DIGIT_PLACEHOLDER {
            Ordering::Greater
        } else if b.is_ascii_digit() {
            a.cmp(&b)
        } else {
            Ordering::Equal
        }
    } else if a == DIGIT_PLACEHOLDER {
        if is_letter_like(b) {
            Ordering::Greater
        } else if b.is_ascii_digit() {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    } else {
        Ordering::Equal
    }
}
