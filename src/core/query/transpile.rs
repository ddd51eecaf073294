//! Filter AST to parameterized SQL
//!
//! Produces a WHERE fragment with `?` placeholders plus the ordered argument
//! list, an ORDER BY list and clamped paging. Output is computed on the first
//! call to [`Transpiler::transpile`] and cached until [`Transpiler::reset`].

use super::ast::{Filter, Function, Param, Value};
use rusqlite::types::Value as SqlValue;

/// Hard cap on rows returned per page
pub const MAX_LIMIT: u64 = 100;

/// Placeholder the upstream lexer substitutes for `*`
pub const WILDCARD_PLACEHOLDER: char = '\u{FFFD}';

/// Maps external field names and values to their storage form
pub trait FieldMapper {
    /// Column for an external field name; `None` for unknown fields
    fn map_field(&self, name: &str) -> Option<String>;

    /// Storage form of a value compared against `field`
    fn map_value(&self, _field: &str, value: &Value) -> std::result::Result<Value, String> {
        Ok(value.clone())
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            descending: true,
        }
    }
}

/// Filter, sort and paging requested by a caller
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sort: Vec<Sort>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Also compute the total number of matching rows
    pub count: bool,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn filter(mut self, f: Function) -> Self {
        self.filter = Some(Filter(f));
        self
    }

    pub fn sort(mut self, s: Sort) -> Self {
        self.sort.push(s);
        self
    }

    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// Transpilation result
#[derive(Debug, Clone, Default)]
pub struct Transpiled {
    /// WHERE fragment without the keyword; `None` when there is no filter or it failed
    pub condition: Option<String>,
    pub args: Vec<SqlValue>,
    /// ORDER BY list without the keyword
    pub order_by: Option<String>,
    pub offset: u64,
    pub limit: u64,
    /// Why the filter was rejected
    pub error: Option<String>,
}

impl Transpiled {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// `WHERE base AND (condition)`, or just the base
    pub fn where_with(&self, base: &str) -> String {
        match (&self.condition, base.is_empty()) {
            (Some(c), false) => format!(" WHERE {} AND ({})", base, c),
            (Some(c), true) => format!(" WHERE {}", c),
            (None, false) => format!(" WHERE {}", base),
            (None, true) => String::new(),
        }
    }

    /// ` ORDER BY ... LIMIT n OFFSET m`
    pub fn tail(&self) -> String {
        let mut out = String::new();
        if let Some(order) = &self.order_by {
            out.push_str(" ORDER BY ");
            out.push_str(order);
        }
        out.push_str(&format!(" LIMIT {} OFFSET {}", self.limit, self.offset));
        out
    }
}

/// Caching transpiler bound to one mapper and one query
pub struct Transpiler<'m, M: FieldMapper + ?Sized> {
    mapper: &'m M,
    query: Query,
    cached: Option<Transpiled>,
}

impl<'m, M: FieldMapper + ?Sized> Transpiler<'m, M> {
    pub fn new(mapper: &'m M, query: Query) -> Self {
        Transpiler {
            mapper,
            query,
            cached: None,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Drop cached output so the next call re-transpiles
    pub fn reset(&mut self) {
        self.cached = None;
    }

    /// Replace the query and drop cached output
    pub fn set_query(&mut self, query: Query) {
        self.query = query;
        self.reset();
    }

    pub fn transpile(&mut self) -> &Transpiled {
        if self.cached.is_none() {
            self.cached = Some(self.build());
        }
        self.cached.get_or_insert_with(Transpiled::default)
    }

    fn build(&self) -> Transpiled {
        let mut out = Transpiled {
            offset: self.query.offset.unwrap_or(0),
            limit: match self.query.limit {
                Some(l) if l > 0 => l.min(MAX_LIMIT),
                _ => MAX_LIMIT,
            },
            ..Default::default()
        };

        if let Some(Filter(root)) = &self.query.filter {
            let mut args = Vec::new();
            match self.function(root, &mut args) {
                Ok(sql) => {
                    out.condition = Some(sql);
                    out.args = args;
                }
                Err(e) => out.error = Some(e),
            }
        }

        let order: Vec<String> = self
            .query
            .sort
            .iter()
            .filter_map(|s| {
                let column = self.mapper.map_field(&s.field)?;
                if column.is_empty() {
                    return None;
                }
                Some(if s.descending {
                    format!("{} DESC", column)
                } else {
                    column
                })
            })
            .collect();
        if !order.is_empty() {
            out.order_by = Some(order.join(", "));
        }
        out
    }

    fn function(&self, f: &Function, args: &mut Vec<SqlValue>) -> std::result::Result<String, String> {
        let name = f.name.to_ascii_uppercase();
        match name.as_str() {
            "NOT" => {
                let inner = match f.params.as_slice() {
                    [Param::Function(inner)] => inner,
                    _ => return Err("NOT takes exactly one function".to_string()),
                };
                Ok(format!("NOT ({})", self.function(inner, args)?))
            }
            "AND" | "OR" => {
                if f.params.is_empty() {
                    return Err(format!("{} needs at least one operand", name));
                }
                let mut parts = Vec::with_capacity(f.params.len());
                for p in &f.params {
                    match p {
                        Param::Function(inner) => parts.push(format!("({})", self.function(inner, args)?)),
                        Param::Value(_) => return Err(format!("{} operands must be functions", name)),
                    }
                }
                Ok(parts.join(&format!(" {} ", name)))
            }
            "EQ" | "NEQ" | "GT" | "GTE" | "LT" | "LTE" | "CONTAINS" | "IN" => self.binary(&name, f, args),
            other => Err(format!("unknown function '{}'", other)),
        }
    }

    fn binary(&self, name: &str, f: &Function, args: &mut Vec<SqlValue>) -> std::result::Result<String, String> {
        let (field, value) = match f.params.as_slice() {
            [Param::Value(Value::Identifier(field)), Param::Value(value)] => (field, value),
            _ => return Err(format!("{} takes an identifier and a value", name)),
        };
        let column = self
            .mapper
            .map_field(field)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| format!("unknown field '{}'", field))?;

        match name {
            "CONTAINS" => {
                let pattern = match self.mapper.map_value(field, value)? {
                    Value::String(s) => s,
                    _ => return Err(format!("CONTAINS on '{}' needs a string", field)),
                };
                let (pattern, escaped) = like_pattern(&pattern);
                args.push(SqlValue::Text(pattern));
                Ok(if escaped {
                    format!("{} LIKE ? ESCAPE '\\'", column)
                } else {
                    format!("{} LIKE ?", column)
                })
            }
            "IN" => {
                let values = match value {
                    Value::List(items) => items.clone(),
                    single => vec![single.clone()],
                };
                if values.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                let mut marks = Vec::with_capacity(values.len());
                for v in &values {
                    args.push(to_sql(self.mapper.map_value(field, v)?)?);
                    marks.push("?");
                }
                Ok(format!("{} IN ({})", column, marks.join(", ")))
            }
            _ => {
                let op = match name {
                    "EQ" => "=",
                    "NEQ" => "<>",
                    "GT" => ">",
                    "GTE" => ">=",
                    "LT" => "<",
                    _ => "<=",
                };
                args.push(to_sql(self.mapper.map_value(field, value)?)?);
                Ok(format!("{} {} ?", column, op))
            }
        }
    }
}

/// Escape LIKE metacharacters, then turn wildcards into `%`.
/// Returns the pattern and whether an escape character was introduced.
fn like_pattern(raw: &str) -> (String, bool) {
    let mut out = String::with_capacity(raw.len());
    let mut escaped = false;
    for c in raw.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
                escaped = true;
            }
            '*' | WILDCARD_PLACEHOLDER => out.push('%'),
            _ => out.push(c),
        }
    }
    (out, escaped)
}

fn to_sql(value: Value) -> std::result::Result<SqlValue, String> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(b as i64),
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Float(f) => SqlValue::Real(f),
        Value::String(s) => SqlValue::Text(s),
        Value::Identifier(i) => return Err(format!("identifier '{}' in value position", i)),
        Value::List(_) => return Err("list value outside IN".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Map;

    impl FieldMapper for Map {
        fn map_field(&self, name: &str) -> Option<String> {
            match name {
                "title" => Some("o.title".to_string()),
                "type" => Some("o.type".to_string()),
                "hidden" => Some(String::new()),
                _ => None,
            }
        }

        fn map_value(&self, field: &str, value: &Value) -> std::result::Result<Value, String> {
            match (field, value) {
                ("type", Value::String(s)) if s == "folder" => Ok(Value::Integer(0)),
                _ => Ok(value.clone()),
            }
        }
    }

    fn run(f: Function) -> Transpiled {
        let mut t = Transpiler::new(&Map, Query::new().filter(f));
        t.transpile().clone()
    }

    #[test]
    fn test_eq() {
        let out = run(Function::eq("title", Value::string("v")));
        assert_eq!(out.condition.as_deref(), Some("o.title = ?"));
        assert_eq!(out.args, vec![SqlValue::Text("v".into())]);
    }

    #[test]
    fn test_contains_wildcards() {
        let out = run(Function::contains("title", "a*b"));
        assert_eq!(out.condition.as_deref(), Some("o.title LIKE ?"));
        assert_eq!(out.args, vec![SqlValue::Text("a%b".into())]);

        let out = run(Function::contains("title", "a\u{FFFD}b"));
        assert_eq!(out.args, vec![SqlValue::Text("a%b".into())]);
    }

    #[test]
    fn test_contains_escapes_literal_percent() {
        let out = run(Function::contains("title", "100%"));
        assert_eq!(out.condition.as_deref(), Some("o.title LIKE ? ESCAPE '\\'"));
        assert_eq!(out.args, vec![SqlValue::Text("100\\%".into())]);
    }

    #[test]
    fn test_and_or_not() {
        let out = run(Function::and(vec![
            Function::eq("title", Value::string("a")),
            Function::eq("type", Value::string("folder")),
        ]));
        assert_eq!(out.condition.as_deref(), Some("(o.title = ?) AND (o.type = ?)"));
        assert_eq!(
            out.args,
            vec![SqlValue::Text("a".into()), SqlValue::Integer(0)]
        );

        let out = run(Function::not(Function::or(vec![
            Function::gt("type", Value::Integer(1)),
            Function::lte("type", Value::Integer(0)),
        ])));
        assert_eq!(out.condition.as_deref(), Some("NOT ((o.type > ?) OR (o.type <= ?))"));
    }

    #[test]
    fn test_in() {
        let out = run(Function::is_in("type", vec![Value::Integer(0), Value::Integer(1)]));
        assert_eq!(out.condition.as_deref(), Some("o.type IN (?, ?)"));
        assert_eq!(out.args.len(), 2);
        assert_eq!(run(Function::is_in("type", vec![])).condition.as_deref(), Some("1 = 0"));
    }

    #[test]
    fn test_unknown_field_invalidates() {
        let out = run(Function::eq("secret", Value::Integer(1)));
        assert!(!out.is_valid());
        assert!(out.condition.is_none());
        assert!(out.args.is_empty());

        let out = run(Function::eq("hidden", Value::Integer(1)));
        assert!(!out.is_valid());
    }

    #[test]
    fn test_malformed_nodes() {
        assert!(!run(Function::new("XOR", vec![])).is_valid());
        assert!(!run(Function::new("AND", vec![])).is_valid());
        assert!(!run(Function::new("EQ", vec![Param::Value(Value::Integer(1))])).is_valid());
        assert!(!run(Function::eq("title", Value::ident("type"))).is_valid());
    }

    #[test]
    fn test_sort_and_paging() {
        let q = Query::new()
            .sort(Sort::desc("title"))
            .sort(Sort::asc("unknown"))
            .sort(Sort::asc("type"))
            .page(20, 500);
        let mut t = Transpiler::new(&Map, q);
        let out = t.transpile();
        assert_eq!(out.order_by.as_deref(), Some("o.title DESC, o.type"));
        assert_eq!(out.limit, MAX_LIMIT);
        assert_eq!(out.offset, 20);
        assert_eq!(out.tail(), " ORDER BY o.title DESC, o.type LIMIT 100 OFFSET 20");
    }

    #[test]
    fn test_where_with() {
        let out = run(Function::eq("title", Value::string("v")));
        assert_eq!(out.where_with("id_store = ?"), " WHERE id_store = ? AND (o.title = ?)");
        assert_eq!(Transpiled::default().where_with("x = ?"), " WHERE x = ?");
        assert_eq!(Transpiled::default().where_with(""), "");
    }

    #[test]
    fn test_cache_and_reset() {
        let mut t = Transpiler::new(&Map, Query::new().filter(Function::eq("title", Value::string("a"))));
        assert_eq!(t.transpile().args.len(), 1);
        t.set_query(Query::new());
        assert!(t.transpile().condition.is_none());
        t.reset();
        assert!(t.transpile().is_valid());
    }
}
