//! Query-condition translation
//!
//! Converts an already-parsed filter AST plus sort and paging into a
//! parameterized SQL WHERE clause.
//!
//! Wildcards: `CONTAINS` accepts `*` or U+FFFD (the placeholder some lexers emit
//! for `*`) and rewrites both to `%`. Literal `%`, `_` and `\` are escaped.
//! Quotes need no escaping because every value is a bound parameter.

mod ast;
mod transpile;

pub use ast::{Filter, Function, Param, Value};
pub use transpile::{
    FieldMapper, Query, Sort, Transpiled, Transpiler, MAX_LIMIT, WILDCARD_PLACEHOLDER,
};

use crate::core::id;

/// Static external → column mapping; fields listed in `id_fields` accept
/// `:hex` identifier strings as values
pub struct FieldMap {
    fields: &'static [(&'static str, &'static str)],
    id_fields: &'static [&'static str],
}

impl FieldMap {
    pub const fn new(
        fields: &'static [(&'static str, &'static str)],
        id_fields: &'static [&'static str],
    ) -> Self {
        FieldMap { fields, id_fields }
    }
}

impl FieldMapper for FieldMap {
    fn map_field(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(external, _)| *external == name)
            .map(|(_, column)| column.to_string())
    }

    fn map_value(&self, field: &str, value: &Value) -> std::result::Result<Value, String> {
        if !self.id_fields.contains(&field) {
            return Ok(value.clone());
        }
        match value {
            Value::String(s) => id::parse_id(s)
                .map(|v| Value::Integer(v as i64))
                .map_err(|e| e.to_string()),
            other => Ok(other.clone()),
        }
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u64,
    pub limit: u64,
    pub max_limit: u64,
    /// Total matching rows, present only when requested
    pub max_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    static MAP: FieldMap = FieldMap::new(&[("title", "title"), ("parent", "id_parent")], &["parent"]);

    #[test]
    fn test_field_map_ids() {
        let mut t = Transpiler::new(
            &MAP,
            Query::new().filter(Function::eq("parent", Value::string(":ff"))),
        );
        let out = t.transpile();
        assert_eq!(out.condition.as_deref(), Some("id_parent = ?"));
        assert_eq!(out.args, vec![rusqlite::types::Value::Integer(0xff)]);
    }

    #[test]
    fn test_field_map_bad_id() {
        let mut t = Transpiler::new(
            &MAP,
            Query::new().filter(Function::eq("parent", Value::string("ff"))),
        );
        assert!(!t.transpile().is_valid());
    }
}
