//! Identifier normalization
//!
//! Notify numbers are printed as `10-2-6700038284` on certificates, but the
//! registry only matches the bare digits. Operators paste both forms, sometimes
//! with stray spaces or typographic dashes copied from PDFs.

use std::collections::HashSet;

use crate::models::types::NotifyNumber;

/// Separator characters dropped from identifiers (whitespace is handled separately)
const SEPARATORS: [char; 8] = [
    '-', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2212}', '\u{FF0D}',
];

#[inline]
fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(&c)
}

/// Strip separators from a notify number. Idempotent.
pub fn normalize_regno(raw: &str) -> String {
    raw.chars().filter(|c| !is_separator(*c)).collect()
}

/// Parse sheet cells into identifiers, dropping blanks and duplicates.
///
/// Order follows the input; the first spelling of a duplicated key wins.
pub fn collect_identifiers<I, S>(cells: I) -> Vec<NotifyNumber>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    cells
        .into_iter()
        .filter_map(|cell| NotifyNumber::parse(cell.as_ref()))
        .filter(|id| seen.insert(id.regnos.clone()))
        .collect()
}
