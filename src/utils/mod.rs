//! Utility functions and helpers
//!
//! This module provides common utility functions used throughout the crate:
//! - Slug and file name sanitization
//! - Time and date formatting

/// String utilities
pub mod string {
    /// Characters never allowed in a download file name.
    const FILE_NAME_SPECIAL: &[char] = &[
        '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*',
        '(', ')', '|', '~', '`', '!', '{', '}', '%', '+', '\u{2019}', '\u{ab}', '\u{bb}',
        '\u{201d}', '\u{201c}',
    ];

    /// Fold a handful of accented Latin letters to ASCII.
    fn fold_accent(c: char) -> Option<&'static str> {
        let folded = match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
            'æ' => "ae",
            'ç' => "c",
            'è' | 'é' | 'ê' | 'ë' => "e",
            'ì' | 'í' | 'î' | 'ï' => "i",
            'ñ' => "n",
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
            'œ' => "oe",
            'ù' | 'ú' | 'û' | 'ü' => "u",
            'ý' | 'ÿ' => "y",
            'ß' => "ss",
            _ => return None,
        };
        Some(folded)
    }

    /// Turn a display title into a URL-safe slug
    ///
    /// Lowercases, folds common accents and replaces every run of other
    /// characters with a single dash.
    ///
    /// # Arguments
    /// * `title` - Title to convert
    ///
    /// # Returns
    /// * `String` - Slug made of `[a-z0-9-]`
    pub fn slugify(title: &str) -> String {
        let mut slug = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars().flat_map(char::to_lowercase) {
            let piece = if c.is_ascii_alphanumeric() {
                Some(c.to_string())
            } else {
                fold_accent(c).map(str::to_string)
            };

            match piece {
                Some(p) => {
                    if pending_dash && !slug.is_empty() {
                        slug.push('-');
                    }
                    pending_dash = false;
                    slug.push_str(&p);
                }
                None => pending_dash = true,
            }
        }

        slug
    }

    /// Make a file name safe for a `Content-Disposition` header
    ///
    /// Removes path separators, quotes, control characters and other
    /// special characters, turns whitespace into dashes and trims leading
    /// and trailing dots, dashes and underscores.
    ///
    /// # Arguments
    /// * `name` - Candidate file name
    ///
    /// # Returns
    /// * `String` - Sanitized file name
    pub fn sanitize_file_name(name: &str) -> String {
        let mut cleaned = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_control() || FILE_NAME_SPECIAL.contains(&c) {
                continue;
            }
            if c.is_whitespace() {
                if !cleaned.ends_with('-') {
                    cleaned.push('-');
                }
                continue;
            }
            if c == '-' && cleaned.ends_with('-') {
                continue;
            }
            cleaned.push(c);
        }

        cleaned
            .trim_matches(|c| c == '.' || c == '-' || c == '_')
            .to_string()
    }
}

/// Time and date utilities
pub mod time {
    use chrono::{DateTime, NaiveDate, Utc};

    /// Fixed-width timestamp layout used by every date column.
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// ISO calendar date layout used in download file names.
    pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

    /// Format a calendar date as `YYYY-MM-DD`
    pub fn iso_date(date: NaiveDate) -> String {
        date.format(ISO_DATE_FORMAT).to_string()
    }

    /// Current UTC instant
    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Get current timestamp in seconds
    ///
    /// # Returns
    /// * `u64` - Seconds since the Unix epoch, 0 for instants before it
    pub fn now_secs() -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}
