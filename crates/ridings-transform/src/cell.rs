//! Cell coercion helpers shared by the transforms.

use serde_json::Value;

use crate::{Error, Result};

/// Read a cell as an optional numeric value.
///
/// JSON null and the empty string map to `None` — both are how source APIs
/// encode disclosure suppression. Numbers and numeric strings map to `Some`;
/// anything else is a data defect.
pub(crate) fn numeric_cell(column: &str, value: &Value) -> Result<Option<f64>> {
  match value {
    Value::Null => Ok(None),
    Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| Error::NonNumeric {
      column: column.to_string(),
      value:  n.to_string(),
    }),
    Value::String(s) => {
      let trimmed = s.trim();
      if trimmed.is_empty() {
        return Ok(None);
      }
      trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| Error::NonNumeric {
          column: column.to_string(),
          value:  s.clone(),
        })
    }
    other => Err(Error::NonNumeric {
      column: column.to_string(),
      value:  other.to_string(),
    }),
  }
}

/// Read a cell as text. Null maps to the empty string, which downstream
/// record validation rejects for key fields.
pub(crate) fn text_cell(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}
