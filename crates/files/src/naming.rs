//! Stored filename rules.
//!
//! Uploaded documents keep a recognisable version of their original name, with characters
//! that object stores reject replaced, and a UTC timestamp prefix so two uploads of
//! `lease.pdf` into the same folder never overwrite each other.

use chrono::{DateTime, Utc};

/// Filename used when the original name has nothing usable left after sanitising.
pub const FALLBACK_FILENAME: &str = "file";

const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Returns `name` with forbidden characters replaced by `_` and whitespace runs collapsed
/// to a single `_`.
///
/// Leading and trailing whitespace is dropped first. An empty result becomes
/// [`FALLBACK_FILENAME`].
pub fn safe_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if FORBIDDEN_CHARS.contains(&ch) || ch.is_control() {
            out.push('_');
        } else {
            out.push(ch);
        }
    }

    if out.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        out
    }
}

/// Returns the stored filename for an upload: `YYYYMMDD-HHMMSS__<safe name>`.
pub fn stamped_filename(original: &str, at: DateTime<Utc>) -> String {
    format!("{}__{}", at.format("%Y%m%d-%H%M%S"), safe_filename(original))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_safe_filename_replaces_forbidden_characters() {
        assert_eq!(safe_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_safe_filename_collapses_whitespace() {
        assert_eq!(safe_filename("  Signed   Lease\t2024.pdf "), "Signed_Lease_2024.pdf");
    }

    #[test]
    fn test_safe_filename_fallback() {
        assert_eq!(safe_filename(""), "file");
        assert_eq!(safe_filename("   "), "file");
    }

    #[test]
    fn test_safe_filename_keeps_unicode_letters() {
        assert_eq!(safe_filename("Café menu.pdf"), "Café_menu.pdf");
    }

    #[test]
    fn test_stamped_filename_format() {
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 5).unwrap();
        assert_eq!(stamped_filename("w9.pdf", at), "20251231-235905__w9.pdf");
    }
}
