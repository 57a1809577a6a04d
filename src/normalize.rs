//! Payload normalization into [`Article`] records.
//!
//! Each known source has a dedicated extraction rule, expressed as one variant
//! of [`SourceKind`]. Unknown names fall through to [`SourceKind::Generic`],
//! which dumps the payload as JSON with `", "` / `": "` separators and every
//! non-ASCII character escaped, cut to [`GENERIC_BODY_LIMIT`] characters.
//!
//! # Rules
//!
//! | Source | Variant | Fields read |
//! |--------|---------|-------------|
//! | `age_name` | [`SourceKind::AgeName`] | `name`, `age`, `count` |
//! | `exchange` | [`SourceKind::Exchange`] | `rates.*` |
//! | `bitcoin` | [`SourceKind::Bitcoin`] | `bpi.USD.rate` |
//! | `gender_name` | [`SourceKind::GenderName`] | `name`, `gender`, `probability` |
//! | `universe` | [`SourceKind::Universe`] | `gravity`, `mass.massValue`, `mass.massExponent` |
//! | anything else | [`SourceKind::Generic`] | whole payload |
//!
//! Normalization never fails. Missing, null or mistyped fields are rendered as
//! placeholders so a successful fetch always yields an article.

use crate::models::Article;
use crate::utils::{local_timestamp, truncate_chars, upcase};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use std::io;

/// Placeholder for a field the payload did not carry.
pub const MISSING: &str = "N/A";

/// Maximum number of characters of payload JSON kept by the generic rule.
pub const GENERIC_BODY_LIMIT: usize = 300;

/// Extraction rule selected by source name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    AgeName,
    Exchange,
    Bitcoin,
    GenderName,
    Universe,
    Generic,
}

impl SourceKind {
    /// Map a registry name to its extraction rule.
    pub fn from_name(name: &str) -> Self {
        match name {
            "age_name" => SourceKind::AgeName,
            "exchange" => SourceKind::Exchange,
            "bitcoin" => SourceKind::Bitcoin,
            "gender_name" => SourceKind::GenderName,
            "universe" => SourceKind::Universe,
            _ => SourceKind::Generic,
        }
    }

    /// Build `(title, body)` for a payload.
    fn extract(self, name: &str, payload: &Value) -> (String, String) {
        match self {
            SourceKind::AgeName => {
                let title = match queried_name(payload) {
                    Some(n) => format!("Age estimate for the name '{n}'"),
                    None => "Age estimate by name".to_string(),
                };
                let body = format!(
                    "Estimated age: {} years (based on {} records)",
                    render(field(payload, "age"), MISSING),
                    render(field(payload, "count"), MISSING),
                );
                (title, body)
            }
            SourceKind::Exchange => {
                let body = match field(payload, "rates").and_then(Value::as_object) {
                    Some(rates) if !rates.is_empty() => rates
                        .iter()
                        .map(|(currency, rate)| match rate.as_f64() {
                            Some(r) => format!("1 EUR = {r:.2} {currency}"),
                            None => format!("1 EUR = {MISSING} {currency}"),
                        })
                        .collect::<Vec<_>>()
                        .join("\n"),
                    _ => "Could not retrieve exchange rates.".to_string(),
                };
                ("Exchange rates against the Euro".to_string(), body)
            }
            SourceKind::Bitcoin => {
                let rate = field(payload, "bpi")
                    .and_then(|bpi| field(bpi, "USD"))
                    .and_then(|usd| field(usd, "rate"));
                (
                    "Current Bitcoin price".to_string(),
                    format!("1 BTC = {} USD", render(rate, MISSING)),
                )
            }
            SourceKind::GenderName => {
                let title = match queried_name(payload) {
                    Some(n) => format!("Gender probability for the name '{n}'"),
                    None => "Gender probability by name".to_string(),
                };
                let probability = field(payload, "probability")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let body = format!(
                    "Most likely gender: {} ({}%)",
                    render(field(payload, "gender"), MISSING),
                    (probability * 100.0).trunc() as i64,
                );
                (title, body)
            }
            SourceKind::Universe => {
                let mass = field(payload, "mass");
                let body = format!(
                    "Gravity: {} m/s²\nMass: {}e{} kg",
                    render(field(payload, "gravity"), MISSING),
                    render(mass.and_then(|m| field(m, "massValue")), "?"),
                    render(mass.and_then(|m| field(m, "massExponent")), ""),
                );
                ("Information about the planet Mars".to_string(), body)
            }
            SourceKind::Generic => (
                format!("Data from {name}"),
                truncate_chars(&to_spaced_ascii_json(payload), GENERIC_BODY_LIMIT),
            ),
        }
    }
}

/// Normalize a payload, stamping it with the current local time.
pub fn normalize(name: &str, payload: &Value) -> Article {
    normalize_at(name, payload, local_timestamp())
}

/// Normalize a payload with an explicit timestamp.
pub fn normalize_at(name: &str, payload: &Value, timestamp: String) -> Article {
    let (title, body) = SourceKind::from_name(name).extract(name, payload);
    Article {
        source: name.to_string(),
        title,
        timestamp,
        body,
    }
}

/// Look up `key` on an object, treating JSON `null` as absent.
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn queried_name(payload: &Value) -> Option<String> {
    field(payload, "name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(upcase)
}

/// Render a scalar the way a reader expects it: strings without quotes,
/// numbers and booleans verbatim, containers as compact JSON.
fn render(value: Option<&Value>, placeholder: &str) -> String {
    match value {
        None | Some(Value::Null) => placeholder.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// JSON formatter writing `", "` and `": "` separators and escaping every
/// non-ASCII character as `\uXXXX` (UTF-16 surrogate pairs above the BMP).
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..idx].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn to_spaced_ascii_json(payload: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedAsciiFormatter);
    match payload.serialize(&mut ser) {
        // Every non-ASCII char was escaped, so the buffer is plain ASCII.
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| payload.to_string()),
        Err(_) => payload.to_string(),
    }
}
