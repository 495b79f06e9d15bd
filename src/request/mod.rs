//! Inbound export requests
//!
//! An [`ExportRequest`] is built once per trigger-link hit from the raw query
//! string. Every parameter value is untrusted: it goes through
//! [`sanitize_text_field`] before it can reach a [`FilterSet`], and list
//! parameters (`key[]=a&key[]=b`) are sanitized element by element.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::auth::Caller;

/// `action` value that marks a request as an export trigger.
pub const EXPORT_ACTION: &str = "export_csv";

/// Query parameter carrying the anti-forgery token.
pub const TOKEN_PARAM: &str = "_token";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex is valid"));

static OCTET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("static regex is valid"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Neutralize one untrusted text value
///
/// Escapes a `<` that never closes into a tag, strips markup tags, drops
/// percent-encoded octets until none are left, folds whitespace runs into
/// single spaces and trims the result.
pub fn sanitize_text_field(value: &str) -> String {
    let escaped = escape_stray_less_than(value);
    let mut text = TAG_RE.replace_all(&escaped, "").into_owned();
    // Removing one octet can join its neighbours into a new one.
    while OCTET_RE.is_match(&text) {
        text = OCTET_RE.replace_all(&text, "").into_owned();
    }
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Replace each `<` not followed by a `>` before the next `<` with `&lt;`.
fn escape_stray_less_than(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let closes = match (after.find('>'), after.find('<')) {
            (Some(gt), Some(lt)) => gt < lt,
            (Some(_), None) => true,
            _ => false,
        };
        out.push_str(if closes { "<" } else { "&lt;" });
        rest = after;
    }
    out.push_str(rest);
    out
}

/// A filter parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

/// Sanitized request parameters, keyed by name.
///
/// Adapters read only the keys they recognize; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scalar value, sanitizing it.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.values.insert(
            key.to_string(),
            FilterValue::Single(sanitize_text_field(value)),
        );
    }

    /// Append to a list value, sanitizing the element.
    ///
    /// A scalar already stored under `key` is replaced by the list.
    pub fn push(&mut self, key: &str, value: &str) {
        let clean = sanitize_text_field(value);
        match self.values.get_mut(key) {
            Some(FilterValue::List(items)) => items.push(clean),
            _ => {
                self.values
                    .insert(key.to_string(), FilterValue::List(vec![clean]));
            }
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    /// Non-empty scalar value of `key`. List values are not scalars.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FilterValue::Single(s)) if !s.is_empty() => Some(s.as_str()),
            Some(FilterValue::List(_)) => {
                debug!("Ignoring list value for scalar filter '{}'", key);
                None
            }
            _ => None,
        }
    }

    /// Non-empty values of `key`, whether scalar or list.
    pub fn values(&self, key: &str) -> Vec<&str> {
        match self.values.get(key) {
            Some(FilterValue::Single(s)) if !s.is_empty() => vec![s.as_str()],
            Some(FilterValue::List(items)) => items
                .iter()
                .map(String::as_str)
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split a query string into decoded `(key, value)` pairs.
///
/// `+` decodes to a space; pairs whose key does not decode are skipped.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.trim_start_matches('?');
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            let value = decode_component(raw_value).unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}

/// One export request.
///
/// Constructed per trigger hit, never persisted.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Sanitized `action` parameter.
    pub action: Option<String>,
    /// Sanitized `exporter_id` parameter.
    pub exporter_id: Option<String>,
    /// Every other parameter except the token, sanitized.
    pub filters: FilterSet,
    /// Raw anti-forgery token. Only ever compared, never interpolated.
    pub token: Option<String>,
    pub caller: Caller,
}

impl ExportRequest {
    /// Build a request from a raw query string.
    pub fn from_query(query: &str, caller: Caller) -> Self {
        Self::from_pairs(parse_query(query), caller)
    }

    /// Build a request from decoded parameters.
    pub fn from_pairs<I, K, V>(pairs: I, caller: Caller) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = FilterSet::new();
        let mut token = None;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key == TOKEN_PARAM {
                token = Some(value.trim().to_string());
            } else if let Some(list_key) = key.strip_suffix("[]") {
                filters.push(list_key, value);
            } else {
                filters.insert(key, value);
            }
        }

        Self {
            action: filters.text("action").map(str::to_string),
            exporter_id: filters.text("exporter_id").map(str::to_string),
            filters,
            token,
            caller,
        }
    }

    /// Whether the request is an export trigger at all.
    pub fn is_export_action(&self) -> bool {
        self.action.as_deref() == Some(EXPORT_ACTION) && self.exporter_id.is_some()
    }

    /// Whether the request is an export trigger addressed to `exporter_id`.
    pub fn is_addressed_to(&self, exporter_id: &str) -> bool {
        self.is_export_action() && self.exporter_id.as_deref() == Some(exporter_id)
    }
}
