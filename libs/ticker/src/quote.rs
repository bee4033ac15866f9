use serde_json::{Number, Value};

/// Columns requested when the caller does not ask for anything else.
/// `close` is the last traded price.
pub const DEFAULT_COLUMNS: [&str; 5] = ["name", "close", "change", "change_abs", "volume"];

pub fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Column name to value for a single scan row, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    /// Pairs `columns[i]` with `values[i]`. Columns past the end of
    /// `values` map to null.
    pub fn zip(columns: &[String], values: &[Value]) -> Self {
        Self(
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| (col.clone(), values.get(i).cloned().unwrap_or(Value::Null)))
                .collect(),
        )
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(col, _)| col == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(col, value)| (col.as_str(), value))
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Fields {
    fn from(pairs: [(&str, Value); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(col, value)| (col.to_string(), value))
                .collect(),
        )
    }
}

/// Last price as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Price {
    /// Numeric price, keeping the provider's own rendering for display.
    Number(Number),
    /// Present but non-numeric, e.g. a placeholder string.
    Text(String),
    Missing,
}

impl Price {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) if n.as_f64().is_some() => Price::Number(n.clone()),
            Some(Value::String(s)) => Price::Text(s.clone()),
            Some(Value::Null) | None => Price::Missing,
            Some(other) => Price::Text(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Price::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

/// One cycle's quote. Numeric columns holding anything else are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub name: String,
    pub close: Price,
    pub change: Option<f64>,
    pub change_abs: Option<Number>,
    pub volume: Option<f64>,
}

impl Quote {
    pub fn from_fields(ticker: &str, fields: &Fields) -> Self {
        let name = match fields.get("name") {
            Some(Value::String(s)) => s.clone(),
            _ => ticker.to_string(),
        };

        Self {
            name,
            close: Price::from_value(fields.get("close")),
            change: fields.get("change").and_then(Value::as_f64),
            change_abs: match fields.get("change_abs") {
                Some(Value::Number(n)) => Some(n.clone()),
                _ => None,
            },
            volume: fields.get("volume").and_then(Value::as_f64),
        }
    }
}
