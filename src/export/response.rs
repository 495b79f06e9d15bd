//! Download response head
//!
//! Everything the transport must send before the first body byte: status,
//! content type, attachment filename and the no-cache headers.

use chrono::NaiveDate;

use crate::utils::string::{sanitize_file_name, slugify};
use crate::utils::time::iso_date;

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Headers that keep proxies and browsers from caching a download.
pub const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    (
        "Cache-Control",
        "no-cache, must-revalidate, max-age=0, no-store, private",
    ),
    ("Expires", "Wed, 11 Jan 1984 05:00:00 GMT"),
    ("Pragma", "no-cache"),
];

/// Attachment filename `<slug(title)>-YYYY-MM-DD.csv`, made filesystem-safe.
pub fn attachment_filename(title: &str, date: NaiveDate) -> String {
    sanitize_file_name(&format!("{}-{}.csv", slugify(title), iso_date(date)))
}

/// Status line and headers of a download response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub filename: String,
}

impl ResponseHead {
    /// A `200` CSV attachment for an exporter titled `title`.
    pub fn csv_attachment(title: &str, date: NaiveDate) -> Self {
        let filename = attachment_filename(title, date);
        let mut headers = vec![
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{}\"", filename),
            ),
        ];
        headers.extend(
            NO_CACHE_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        Self {
            status: 200,
            headers,
            filename,
        }
    }

    /// Value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
