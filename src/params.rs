//! Request parameters and their normalization into ordered string pairs.

use std::collections::HashMap;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// String form placed in the query: booleans become `1`/`0`.
    pub fn to_query_value(&self) -> String {
        match self {
            Scalar::Str(s) => s.clone(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => format_float(*f),
            Scalar::Bool(true) => "1".to_string(),
            Scalar::Bool(false) => "0".to_string(),
        }
    }
}

// Whole floats keep a trailing ".0" (`2.0`, not `2`).
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// A parameter is either a scalar or a list of scalars.
///
/// Lists expand to indexed keys: `ids` with `[5, 7]` is sent as
/// `ids[0]=5&ids[1]=7`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant($conv(value))
                }
            }

            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

impl_from_scalar! {
    String => Str(|v| v),
    &str => Str(str::to_string),
    &String => Str(String::clone),
    i64 => Int(|v| v),
    i32 => Int(i64::from),
    u32 => Int(i64::from),
    f64 => Float(|v| v),
    bool => Bool(|v| v),
}

impl From<Scalar> for ParamValue {
    fn from(value: Scalar) -> Self {
        ParamValue::Scalar(value)
    }
}

impl<T: Into<Scalar>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Unordered request parameters. Ordering is applied only when signing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalizes the parameters into the exact pair sequence that is signed.
    ///
    /// Keys made only of digits sort after all other keys; each group is
    /// ordered by the raw key string. Lists expand in place after sorting.
    pub fn to_sorted_pairs(&self) -> Vec<(String, String)> {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort_by(|a, b| (is_numeric_key(a), a.as_str()).cmp(&(is_numeric_key(b), b.as_str())));

        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            match &self.values[key] {
                ParamValue::Scalar(value) => pairs.push((key.clone(), value.to_query_value())),
                ParamValue::List(values) => {
                    for (index, value) in values.iter().enumerate() {
                        pairs.push((format!("{}[{}]", key, index), value.to_query_value()));
                    }
                }
            }
        }
        pairs
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_digit())
}
