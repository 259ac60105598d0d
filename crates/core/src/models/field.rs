use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of raw records a chart can be computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Tasks,
    XpTransactions,
    Categories,
    CalendarEvents,
}

impl DataSource {
    /// All data sources, in catalog order.
    pub const ALL: [DataSource; 4] = [
        DataSource::Tasks,
        DataSource::XpTransactions,
        DataSource::Categories,
        DataSource::CalendarEvents,
    ];
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Tasks => write!(f, "TASKS"),
            DataSource::XpTransactions => write!(f, "XP_TRANSACTIONS"),
            DataSource::Categories => write!(f, "CATEGORIES"),
            DataSource::CalendarEvents => write!(f, "CALENDAR_EVENTS"),
        }
    }
}

/// Declared type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Number,
    String,
    Date,
    Enum,
    Boolean,
}

impl DataType {
    /// STRING, ENUM and BOOLEAN values partition records into named groups.
    #[must_use]
    pub fn is_categorical(&self) -> bool {
        matches!(self, DataType::String | DataType::Enum | DataType::Boolean)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Number => write!(f, "NUMBER"),
            DataType::String => write!(f, "STRING"),
            DataType::Date => write!(f, "DATE"),
            DataType::Enum => write!(f, "ENUM"),
            DataType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// One queryable attribute of a data source.
///
/// Descriptors live in the static field catalog; `id` is unique within
/// its data source and is what chart configs refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataField {
    pub data_source: DataSource,
    pub id: &'static str,
    /// Display name only, never used in computation
    pub label: &'static str,
    pub data_type: DataType,
}

/// A value extracted from a record for one field.
///
/// Absent attributes are represented by `None` at the extraction site,
/// never by a sentinel variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Enum(&'static str),
    Boolean(bool),
}

impl FieldValue {
    /// Numeric view used by SUM/AVERAGE/MIN/MAX and FIRST/LAST.
    ///
    /// BOOLEAN maps to 1/0, DATE to epoch milliseconds, text only when it
    /// parses as a number. ENUM values have no numeric view.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Date(d) => Some(d.timestamp_millis() as f64),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Enum(_) => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Literal text used as a category bucket key.
    #[must_use]
    pub fn to_label(&self) -> String {
        match self {
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Enum(v) => (*v).to_string(),
            FieldValue::Boolean(b) => b.to_string(),
        }
    }
}

/// `10.0` renders as "10", `2.5` as "2.5".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
