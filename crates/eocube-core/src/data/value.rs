//! Typed dimension values

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// A single cell of an inventory dimension.
///
/// Values are compared within their own kind. Across kinds only `Int` and
/// `Float` are comparable; everything else is ordered by kind so that values
/// can live in ordered sets.
#[derive(Debug, Clone)]
pub enum DimValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Naive timestamp (no time zone), stored with microsecond precision
    Time(NaiveDateTime),
}

impl DimValue {
    /// Name of the value kind, used in error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DimValue::Null => "Null",
            DimValue::Bool(_) => "Bool",
            DimValue::Int(_) => "Int",
            DimValue::Float(_) => "Float",
            DimValue::Str(_) => "String",
            DimValue::Time(_) => "Timestamp",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, DimValue::Null)
    }

    /// Arrow type used to store values of this kind
    #[must_use]
    pub fn arrow_type(&self) -> DataType {
        match self {
            DimValue::Null => DataType::Null,
            DimValue::Bool(_) => DataType::Boolean,
            DimValue::Int(_) => DataType::Int64,
            DimValue::Float(_) => DataType::Float64,
            DimValue::Str(_) => DataType::Utf8,
            DimValue::Time(_) => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            DimValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DimValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a point on a number line.
    ///
    /// Timestamps map to microseconds since the epoch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DimValue::Int(i) => Some(*i as f64),
            DimValue::Float(f) => Some(*f),
            DimValue::Time(t) => Some(t.and_utc().timestamp_micros() as f64),
            _ => None,
        }
    }

    /// Distance between two values, if they share a number line
    #[must_use]
    pub fn distance(&self, other: &DimValue) -> Option<f64> {
        match (self, other) {
            (DimValue::Time(_), DimValue::Time(_))
            | (DimValue::Int(_) | DimValue::Float(_), DimValue::Int(_) | DimValue::Float(_)) => {
                Some((self.as_f64()? - other.as_f64()?).abs())
            }
            _ => None,
        }
    }

    /// Calendar year of a timestamp value
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.as_time().map(|t| t.year())
    }

    /// Calendar month (1-12) of a timestamp value
    #[must_use]
    pub fn month(&self) -> Option<u32> {
        self.as_time().map(|t| t.month())
    }

    /// Microseconds since the epoch, the Arrow storage of `Time`
    pub(crate) fn micros(t: &NaiveDateTime) -> i64 {
        t.and_utc().timestamp_micros()
    }

    pub(crate) fn from_micros(micros: i64) -> DimValue {
        DateTime::from_timestamp_micros(micros).map_or(DimValue::Null, |dt| {
            DimValue::Time(dt.naive_utc())
        })
    }

    fn rank(&self) -> u8 {
        match self {
            DimValue::Null => 0,
            DimValue::Bool(_) => 1,
            DimValue::Int(_) | DimValue::Float(_) => 2,
            DimValue::Str(_) => 3,
            DimValue::Time(_) => 4,
        }
    }
}

impl PartialEq for DimValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DimValue {}

impl PartialOrd for DimValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lower bound of floats too large for `i64` (2^63)
const I64_END: f64 = 9_223_372_036_854_775_808.0;

/// The integer a float holds exactly, if it is integral and fits `i64`
#[allow(clippy::cast_possible_truncation)]
fn exact_int(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_END..I64_END).contains(&f)).then(|| f as i64)
}

/// Exact ordering of an integer against a float, without rounding the
/// integer to the nearest float
#[allow(clippy::cast_possible_truncation)]
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() { Ordering::Greater } else { Ordering::Less };
    }
    if f >= I64_END {
        return Ordering::Less;
    }
    if f < -I64_END {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        unequal => unequal,
    }
}

impl Ord for DimValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DimValue::Null, DimValue::Null) => Ordering::Equal,
            (DimValue::Bool(a), DimValue::Bool(b)) => a.cmp(b),
            (DimValue::Int(a), DimValue::Int(b)) => a.cmp(b),
            // 0.0 and -0.0 are equal, like the integer 0 they both equal
            (DimValue::Float(a), DimValue::Float(b)) if a == b => Ordering::Equal,
            (DimValue::Float(a), DimValue::Float(b)) => a.total_cmp(b),
            (DimValue::Int(a), DimValue::Float(b)) => cmp_int_float(*a, *b),
            (DimValue::Float(a), DimValue::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (DimValue::Str(a), DimValue::Str(b)) => a.cmp(b),
            (DimValue::Time(a), DimValue::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for DimValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            DimValue::Null => {}
            DimValue::Bool(b) => b.hash(state),
            // a float equal to an integer must hash like that integer
            DimValue::Int(i) => i.hash(state),
            DimValue::Float(f) => match exact_int(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            DimValue::Str(s) => s.hash(state),
            DimValue::Time(t) => t.hash(state),
        }
    }
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimValue::Null => write!(f, "null"),
            DimValue::Bool(b) => write!(f, "{b}"),
            DimValue::Int(i) => write!(f, "{i}"),
            DimValue::Float(v) => write!(f, "{v}"),
            DimValue::Str(s) => write!(f, "{s}"),
            DimValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl From<bool> for DimValue {
    fn from(b: bool) -> Self {
        DimValue::Bool(b)
    }
}

impl From<i64> for DimValue {
    fn from(i: i64) -> Self {
        DimValue::Int(i)
    }
}

impl From<i32> for DimValue {
    fn from(i: i32) -> Self {
        DimValue::Int(i64::from(i))
    }
}

impl From<f64> for DimValue {
    fn from(f: f64) -> Self {
        DimValue::Float(f)
    }
}

impl From<&str> for DimValue {
    fn from(s: &str) -> Self {
        DimValue::Str(s.to_string())
    }
}

impl From<String> for DimValue {
    fn from(s: String) -> Self {
        DimValue::Str(s)
    }
}

impl From<NaiveDateTime> for DimValue {
    fn from(t: NaiveDateTime) -> Self {
        DimValue::Time(t)
    }
}

impl From<NaiveDate> for DimValue {
    fn from(d: NaiveDate) -> Self {
        DimValue::Time(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: Into<DimValue>> From<Option<T>> for DimValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DimValue::Null, Into::into)
    }
}
