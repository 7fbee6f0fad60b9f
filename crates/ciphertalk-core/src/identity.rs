//! Contact identity normalization
//!
//! Address-book entries arrive in whatever shape the phone stored them:
//! "+1 (415) 555-2671", "415-555-2671", "4155552671". Registration lookups
//! and contact matching need all of those to land on the same account, so
//! each raw identifier is expanded into a set of canonical variants and
//! matching happens on the union.
//!
//! Normalization never fails: unparsable or too-short input simply
//! contributes nothing to the result set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Minimum digit count for the raw-digits fallback form
const FALLBACK_MIN_DIGITS: usize = 6;

// ----------------------------------------------------------------------------
// Region
// ----------------------------------------------------------------------------

/// Dialing-plan parameters for the fixed default region phone numbers are
/// parsed against.
///
/// The default is the North American plan (`+1`, ten national digits, no
/// leading 0/1 in the national number), matching the deployments this
/// messenger ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Country calling code, without the leading `+`
    pub country_code: String,
    /// Exact length of a valid national number
    pub national_digits: usize,
}

impl Region {
    /// North American Numbering Plan
    pub fn nanp() -> Self {
        Self {
            country_code: "1".to_string(),
            national_digits: 10,
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::nanp()
    }
}

// ----------------------------------------------------------------------------
// Normalization
// ----------------------------------------------------------------------------

/// Normalize a single raw identifier into its canonical variants.
///
/// A valid phone number yields three forms: fully-qualified international
/// ("+14155552671"), digits-only national ("4155552671"), and formatted
/// national ("(415) 555-2671"). Anything else that still carries at least
/// six digits yields the bare digit string; shorter input yields nothing.
pub fn normalize(raw: &str, region: &Region) -> BTreeSet<String> {
    let mut forms = BTreeSet::new();
    add_forms(raw, region, &mut forms);
    forms
}

/// Normalize a batch of raw identifiers into one deduplicated set
pub fn normalize_all<I, S>(items: I, region: &Region) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut forms = BTreeSet::new();
    for item in items {
        add_forms(item.as_ref(), region, &mut forms);
    }
    forms
}

fn add_forms(raw: &str, region: &Region, forms: &mut BTreeSet<String>) {
    if raw.trim().is_empty() {
        return;
    }

    if let Some(national) = parse_national(raw, region) {
        forms.insert(format!("+{}{}", region.country_code, national));
        forms.insert(format_national(&national));
        forms.insert(national);
        return;
    }

    let digits = digits_of(raw);
    if digits.len() >= FALLBACK_MIN_DIGITS {
        forms.insert(digits);
    }
}

/// Extract the national number if the input parses as a valid phone number
/// in the given region.
fn parse_national(raw: &str, region: &Region) -> Option<String> {
    let has_plus = raw.trim_start().starts_with('+');
    let digits = digits_of(raw);

    let national = if has_plus {
        // International form must carry the region's country code.
        digits.strip_prefix(region.country_code.as_str())?.to_string()
    } else if digits.len() == region.national_digits {
        digits
    } else if digits.len() == region.country_code.len() + region.national_digits {
        digits
            .strip_prefix(region.country_code.as_str())?
            .to_string()
    } else {
        return None;
    };

    if national.len() != region.national_digits {
        return None;
    }
    // National numbers never start with a trunk or country prefix digit.
    if national.starts_with('0') || national.starts_with('1') {
        return None;
    }

    Some(national)
}

/// Render the display form used by address books, e.g. "(415) 555-2671".
///
/// Lengths other than ten digits fall back to the bare digit string, which
/// collapses with the digits-only variant in the result set.
fn format_national(national: &str) -> String {
    if national.len() != 10 {
        return national.to_string();
    }
    format!(
        "({}) {}-{}",
        &national[..3],
        &national[3..6],
        &national[6..]
    )
}

fn digits_of(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Region {
        Region::default()
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(normalize("", &region()).is_empty());
        assert!(normalize("   ", &region()).is_empty());
        assert!(normalize_all(Vec::<&str>::new(), &region()).is_empty());
    }

    #[test]
    fn valid_international_number_yields_three_forms() {
        let forms = normalize("+14155552671", &region());
        assert_eq!(forms.len(), 3);
        assert!(forms.contains("+14155552671"));
        assert!(forms.contains("4155552671"));
        assert!(forms.contains("(415) 555-2671"));
    }

    #[test]
    fn contains_digits_only_variant_of_sufficient_length() {
        let forms = normalize("+14155552671", &region());
        assert!(forms
            .iter()
            .any(|f| f.chars().all(|c| c.is_ascii_digit()) && f.len() >= 6));
    }

    #[test]
    fn formatted_national_input_parses() {
        let forms = normalize("(415) 555-2671", &region());
        assert!(forms.contains("+14155552671"));
        assert!(forms.contains("4155552671"));
    }

    #[test]
    fn eleven_digit_national_with_country_code_parses() {
        let forms = normalize("1-415-555-2671", &region());
        assert!(forms.contains("+14155552671"));
    }

    #[test]
    fn invalid_number_falls_back_to_digit_string() {
        // Leading 0 in the national number fails phone validation but has
        // enough digits for the fallback form.
        let forms = normalize("0155552671", &region());
        assert_eq!(forms.len(), 1);
        assert!(forms.contains("0155552671"));
    }

    #[test]
    fn short_garbage_contributes_nothing() {
        assert!(normalize("12345", &region()).is_empty());
        assert!(normalize("call me", &region()).is_empty());
    }

    #[test]
    fn duplicates_collapse_across_items() {
        let forms = normalize_all(["123456", "123456"], &region());
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn union_over_mixed_items() {
        let forms = normalize_all(["+14155552671", "415.555.2671", "nope"], &region());
        // Both phone shapes resolve to the same three canonical forms.
        assert_eq!(forms.len(), 3);
    }
}
