//! ISO 7064 MOD 97-10 check-digit verification for IBANs.
//!
//! The functions here operate on the *sanitized* identifier form produced by
//! [`crate::sanitize::sanitize`]. They do not check length or country codes;
//! those are layered on top by the validators and the rule content.

/// Verifies that `value`, read as a base-36 numeral, is congruent to 1 modulo 97.
///
/// # Algorithm
///
/// Each character is converted to its numeric value:
/// - Digits `0`–`9` map to 0–9.
/// - Letters `A`–`Z` map to 10–35.
///
/// The concatenated decimal numeral can be far wider than 64 bits, so it is
/// reduced incrementally: for each character
/// `remainder = (remainder * base + digit_value) % 97`, where `base` is 10
/// for a one-digit expansion and 100 for a two-digit expansion. This yields
/// the exact remainder of the arbitrary-precision numeral.
///
/// Bytes outside `[0-9A-Z]` are skipped. Callers are expected to sanitize
/// first; the function is still total on other input.
///
/// # Examples
///
/// ```
/// use payval_core::check_digits::mod97_10;
///
/// // "GB29NWBK60161331926819" rotated so the check digits sit at the end.
/// assert!(mod97_10("NWBK60161331926819GB29"));
/// assert!(!mod97_10("NWBK60161331926820GB29"));
/// ```
pub fn mod97_10(value: &str) -> bool {
    remainder97(value) == Some(1)
}

/// Returns the exact remainder modulo 97 of the numerized `value`, or `None`
/// when `value` contains no alphanumeric character at all.
fn remainder97(value: &str) -> Option<u64> {
    let mut remainder: u64 = 0;
    let mut seen = false;
    for byte in value.as_bytes() {
        match byte {
            b'0'..=b'9' => {
                let digit = u64::from(byte - b'0');
                remainder = (remainder * 10 + digit) % 97;
                seen = true;
            }
            b'A'..=b'Z' => {
                let value = u64::from(byte - b'A') + 10;
                remainder = (remainder * 100 + value) % 97;
                seen = true;
            }
            _ => {}
        }
    }
    seen.then_some(remainder)
}

/// Moves the first four characters of `iban` to the end.
///
/// Strings shorter than four characters are returned unchanged.
pub fn rotate(iban: &str) -> String {
    let split = iban.char_indices().nth(4).map_or(iban.len(), |(i, _)| i);
    let (head, tail) = iban.split_at(split);
    let mut rotated = String::with_capacity(iban.len());
    rotated.push_str(tail);
    rotated.push_str(head);
    rotated
}

/// Expands every letter to its base-36 value and keeps digits as-is.
///
/// Characters outside `[0-9A-Z]` are dropped.
///
/// ```
/// use payval_core::check_digits::numerize;
///
/// assert_eq!(numerize("GB29"), "161129");
/// ```
pub fn numerize(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        match c {
            '0'..='9' => out.push(c),
            'A'..='Z' => {
                let v = u32::from(c) - u32::from('A') + 10;
                out.push_str(&v.to_string());
            }
            _ => {}
        }
    }
    out
}

/// Returns `true` when the sanitized `iban` passes the IBAN MOD-97 test.
///
/// The first four characters (country code and check digits) are rotated to
/// the end and the result must satisfy [`mod97_10`]. Empty input is invalid.
///
/// ```
/// use payval_core::check_digits::is_valid_iban_checksum;
///
/// assert!(is_valid_iban_checksum("GB29NWBK60161331926819"));
/// assert!(!is_valid_iban_checksum("GB29NWBK60161331926820"));
/// assert!(!is_valid_iban_checksum(""));
/// ```
pub fn is_valid_iban_checksum(iban: &str) -> bool {
    if iban.is_empty() {
        return false;
    }
    mod97_10(&rotate(iban))
}
