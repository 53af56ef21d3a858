//! ASCII folding for names that end up in the directory.

use unicode_normalization::UnicodeNormalization;

/// Decompose (NFKD) and drop everything that is not ASCII, so `José` becomes `Jose`.
pub fn normalize(s: &str) -> String {
    s.nfkd().filter(char::is_ascii).collect()
}

/// Key used to route all jobs for one directory account to the same place.
///
/// `sAMAccountName` comparisons are case-insensitive, so the key is lowercased.
pub fn routing_key(username: &str) -> String {
    normalize(username).to_ascii_lowercase()
}
