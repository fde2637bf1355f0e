//! Feature extraction for fraud model inference.
//!
//! Turns a raw transaction record into the 23-column feature vector the
//! scaler and classifier were fit on. Column order is part of the contract
//! with the trained artifacts and must never change.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::PredictError;
use crate::types::transaction::TransactionRecord;

/// Format of `trans_date_trans_time`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of `dob`.
pub const DOB_FORMAT: &str = "%Y-%m-%d";

/// Number of columns in a feature vector.
pub const FEATURE_COUNT: usize = 23;

/// Number of leading numeric columns (the ones the scaler sees).
pub const NUMERIC_COUNT: usize = 9;

/// Number of trailing boolean indicator columns.
pub const INDICATOR_COUNT: usize = FEATURE_COUNT - NUMERIC_COUNT;

/// Column names in model order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    // Numeric (9)
    "amt",
    "zip",
    "lat",
    "long",
    "city_pop",
    "merch_lat",
    "merch_long",
    "Age",
    "hour",
    // Category indicators (13)
    "category_food_dining",
    "category_gas_transport",
    "category_grocery_net",
    "category_grocery_pos",
    "category_health_fitness",
    "category_home",
    "category_kids_pets",
    "category_misc_net",
    "category_misc_pos",
    "category_personal_care",
    "category_shopping_net",
    "category_shopping_pos",
    "category_travel",
    // Gender indicator (1)
    "gender_M",
];

/// Names of the columns the scaler was fit on, in order.
pub fn numeric_feature_names() -> &'static [&'static str] {
    &FEATURE_NAMES[..NUMERIC_COUNT]
}

/// Merchant category.
///
/// Encoded one-hot minus one baseline: [`Category::BASELINE`] has no column
/// and is represented by all thirteen indicators being false, exactly like
/// an unknown or missing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Entertainment,
    FoodDining,
    GasTransport,
    GroceryNet,
    GroceryPos,
    HealthFitness,
    Home,
    KidsPets,
    MiscNet,
    MiscPos,
    PersonalCare,
    ShoppingNet,
    ShoppingPos,
    Travel,
}

impl Category {
    /// Category dropped at encoding time.
    pub const BASELINE: Category = Category::Entertainment;

    /// Categories with an indicator column, in column order.
    pub const ENCODED: [Category; 13] = [
        Category::FoodDining,
        Category::GasTransport,
        Category::GroceryNet,
        Category::GroceryPos,
        Category::HealthFitness,
        Category::Home,
        Category::KidsPets,
        Category::MiscNet,
        Category::MiscPos,
        Category::PersonalCare,
        Category::ShoppingNet,
        Category::ShoppingPos,
        Category::Travel,
    ];

    /// Category name as it appears in transaction records.
    pub fn name(self) -> &'static str {
        match self {
            Category::Entertainment => "entertainment",
            Category::FoodDining => "food_dining",
            Category::GasTransport => "gas_transport",
            Category::GroceryNet => "grocery_net",
            Category::GroceryPos => "grocery_pos",
            Category::HealthFitness => "health_fitness",
            Category::Home => "home",
            Category::KidsPets => "kids_pets",
            Category::MiscNet => "misc_net",
            Category::MiscPos => "misc_pos",
            Category::PersonalCare => "personal_care",
            Category::ShoppingNet => "shopping_net",
            Category::ShoppingPos => "shopping_pos",
            Category::Travel => "travel",
        }
    }

    /// Exact, case-sensitive lookup. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        std::iter::once(Self::BASELINE)
            .chain(Self::ENCODED)
            .find(|c| c.name() == name)
    }

    /// Indicator columns for an optional category.
    pub fn one_hot(category: Option<Self>) -> [bool; 13] {
        let mut flags = [false; 13];
        if let Some(category) = category {
            if let Some(idx) = Self::ENCODED.iter().position(|&c| c == category) {
                flags[idx] = true;
            }
        }
        flags
    }
}

/// Value of a single feature column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    /// Numeric column; `None` when the source field was absent
    Numeric(Option<f64>),
    /// Indicator column
    Flag(bool),
}

/// Fixed-schema feature vector for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub amt: Option<f64>,
    pub zip: Option<f64>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub city_pop: Option<f64>,
    pub merch_lat: Option<f64>,
    pub merch_long: Option<f64>,
    /// Whole 365-day periods between date of birth and transaction
    pub age: i64,
    /// Hour of the transaction (0-23)
    pub hour: u32,
    /// Recognized category, `None` for unknown or missing values
    pub category: Option<Category>,
    pub gender_m: bool,
}

impl FeatureVector {
    /// The nine numeric columns, in scaler order.
    pub fn numeric(&self) -> [Option<f64>; NUMERIC_COUNT] {
        [
            self.amt,
            self.zip,
            self.lat,
            self.long,
            self.city_pop,
            self.merch_lat,
            self.merch_long,
            Some(self.age as f64),
            Some(self.hour as f64),
        ]
    }

    /// The fourteen indicator columns: thirteen categories then `gender_M`.
    pub fn indicators(&self) -> [bool; INDICATOR_COUNT] {
        let mut flags = [false; INDICATOR_COUNT];
        flags[..13].copy_from_slice(&Category::one_hot(self.category));
        flags[13] = self.gender_m;
        flags
    }

    /// All columns paired with their names, in model order.
    pub fn fields(&self) -> Vec<(&'static str, FeatureValue)> {
        let values = self
            .numeric()
            .into_iter()
            .map(FeatureValue::Numeric)
            .chain(self.indicators().into_iter().map(FeatureValue::Flag));

        FEATURE_NAMES.iter().copied().zip(values).collect()
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.fields() {
            match value {
                FeatureValue::Numeric(v) => map.serialize_entry(name, &v)?,
                FeatureValue::Flag(b) => map.serialize_entry(name, &b)?,
            }
        }
        map.end()
    }
}

/// Feature extractor that transforms transaction records into model input.
///
/// Pure function of its input; holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a transaction record.
    ///
    /// Fails only when a date field is missing or malformed. Missing numeric
    /// fields stay `None` and unknown categories yield all-false indicators.
    pub fn extract(&self, record: &TransactionRecord) -> Result<FeatureVector, PredictError> {
        let trans_time = parse_timestamp(record.trans_date_trans_time.as_deref())?;
        let dob = parse_dob(record.dob.as_deref())?;

        Ok(FeatureVector {
            amt: record.amt,
            zip: record.zip,
            lat: record.lat,
            long: record.long,
            city_pop: record.city_pop,
            merch_lat: record.merch_lat,
            merch_long: record.merch_long,
            age: age_in_years(trans_time, dob),
            hour: trans_time.hour(),
            category: record.category.as_deref().and_then(Category::from_name),
            gender_m: record.gender.as_deref() == Some("M"),
        })
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

fn parse_timestamp(value: Option<&str>) -> Result<NaiveDateTime, PredictError> {
    let value = value.ok_or(PredictError::MissingField("trans_date_trans_time"))?;
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        PredictError::InvalidDate {
            field: "trans_date_trans_time",
            value: value.to_string(),
            source,
        }
    })
}

fn parse_dob(value: Option<&str>) -> Result<NaiveDate, PredictError> {
    let value = value.ok_or(PredictError::MissingField("dob"))?;
    NaiveDate::parse_from_str(value, DOB_FORMAT).map_err(|source| PredictError::InvalidDate {
        field: "dob",
        value: value.to_string(),
        source,
    })
}

/// Age as whole 365-day periods, floored.
///
/// Not leap-year aware on purpose: the model was trained on this exact
/// formula. Days are floored before dividing so a transaction a few hours
/// before a day boundary still counts the previous day.
pub fn age_in_years(trans_time: NaiveDateTime, dob: NaiveDate) -> i64 {
    let elapsed = trans_time - dob.and_time(NaiveTime::MIN);
    let days = elapsed.num_seconds().div_euclid(86_400);
    days.div_euclid(365)
}
