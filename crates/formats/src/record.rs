//! One row of an input table

use serde_json::Value;

/// A single row, as a JSON object keyed by column name
#[derive(Debug, Clone)]
pub struct Record {
    /// Column values; CSV cells arrive as strings
    pub data: Value,
    /// Source line number (1-based, header excluded for CSV)
    pub source_line: usize,
}

impl Record {
    pub fn new(data: Value, source_line: usize) -> Self {
        Self { data, source_line }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// Cell as trimmed text; `None` when missing, null or blank
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null => None,
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            other => Some(other.to_string()),
        }
    }

    /// Cell as raw text with surrounding whitespace kept
    pub fn raw_text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Column names
    pub fn columns(&self) -> Vec<String> {
        match &self.data {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_creation() {
        let data = json!({"COLONIA": "Centro", "id": 1});
        let record = Record::new(data.clone(), 3);
        assert_eq!(record.data, data);
        assert_eq!(record.source_line, 3);
    }

    #[test]
    fn test_text_access() {
        let record = Record::new(json!({"a": "  Centro ", "b": "", "c": null, "d": 4.5}), 1);
        assert_eq!(record.text("a").as_deref(), Some("Centro"));
        assert_eq!(record.raw_text("a").as_deref(), Some("  Centro "));
        assert_eq!(record.text("b"), None);
        assert_eq!(record.text("c"), None);
        assert_eq!(record.text("d").as_deref(), Some("4.5"));
        assert_eq!(record.text("missing"), None);
    }
}
