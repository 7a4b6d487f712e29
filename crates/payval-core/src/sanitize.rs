//! Normalisation of raw identifier input.
//!
//! People supply IBANs and BICs in every conceivable shape: lower case,
//! grouped in fours, hyphenated. Every algorithmic check in this crate runs on
//! the canonical form produced by [`sanitize`].

/// Uppercases `raw` and strips every character outside `[A-Z0-9]`.
///
/// Total and idempotent.
///
/// ```
/// use payval_core::sanitize::sanitize;
///
/// assert_eq!(sanitize("an-ib-an-12340"), "ANIBAN12340");
/// assert_eq!(sanitize("gb29 nwbk 6016 1331 9268 19"), "GB29NWBK60161331926819");
/// ```
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Returns `true` when `raw` is not already in sanitized form.
pub fn needs_sanitizing(raw: &str) -> bool {
    sanitize(raw) != raw
}

/// Sanitizes `raw` and groups the result in blocks of four for display.
///
/// ```
/// use payval_core::sanitize::print_format;
///
/// assert_eq!(print_format("gb29nwbk60161331926819"), "GB29 NWBK 6016 1331 9268 19");
/// ```
pub fn print_format(raw: &str) -> String {
    let clean = sanitize(raw);
    let mut out = String::with_capacity(clean.len() + clean.len() / 4);
    for (i, c) in clean.chars().enumerate() {
        if i != 0 && i % 4 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}
