//! Transaction record as posted to the scoring endpoint

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw transaction to be scored.
///
/// Every field is optional: absence is a valid input and is carried through
/// as `None`. Only the two date fields are required later, when features
/// are derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction amount
    #[serde(default, deserialize_with = "lenient_number")]
    pub amt: Option<f64>,

    /// Cardholder ZIP code
    #[serde(default, deserialize_with = "lenient_number")]
    pub zip: Option<f64>,

    /// Cardholder latitude
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,

    /// Cardholder longitude
    #[serde(default, deserialize_with = "lenient_number")]
    pub long: Option<f64>,

    /// Population of the cardholder's city
    #[serde(default, deserialize_with = "lenient_number")]
    pub city_pop: Option<f64>,

    /// Merchant latitude
    #[serde(default, deserialize_with = "lenient_number")]
    pub merch_lat: Option<f64>,

    /// Merchant longitude
    #[serde(default, deserialize_with = "lenient_number")]
    pub merch_long: Option<f64>,

    /// Transaction timestamp, `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub trans_date_trans_time: Option<String>,

    /// Cardholder date of birth, `YYYY-MM-DD`
    #[serde(default)]
    pub dob: Option<String>,

    /// Merchant category (e.g. `grocery_pos`)
    #[serde(default, deserialize_with = "lenient_label")]
    pub category: Option<String>,

    /// Cardholder gender (`M` / `F`)
    #[serde(default, deserialize_with = "lenient_label")]
    pub gender: Option<String>,

    /// Any other keys the caller sent (ids, merchant names, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accepts a JSON number, a numeric string, `""` or `null`.
///
/// The dashboard forwards CSV cells untouched, so `"1199.84"` must score the
/// same as `1199.84`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientNumber;

    impl<'de> Visitor<'de> for LenientNumber {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number, a numeric string or null")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v.is_finite() {
                Ok(Some(v))
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            // "NaN" and "inf" parse as floats but carry no amount
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(LenientNumber)
        }
    }

    deserializer.deserialize_any(LenientNumber)
}

/// Accepts a string; any other scalar is read as absent.
///
/// A category or gender that is not a string matches no indicator, so it
/// scores the same as a missing one.
fn lenient_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientLabel;

    impl<'de> Visitor<'de> for LenientLabel {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a scalar")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(LenientLabel)
        }
    }

    deserializer.deserialize_any(LenientLabel)
}
