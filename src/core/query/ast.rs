//! Parsed filter expressions
//!
//! The filter parser lives outside the core; it hands over a [`Filter`] whose root
//! is a [`Function`] node. Leaves are [`Value`]s, where an [`Value::Identifier`]
//! names a field.

/// Literal or identifier leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    List(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn ident(s: impl Into<String>) -> Self {
        Value::Identifier(s.into())
    }
}

/// Parameter of a function node
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Function(Function),
    Value(Value),
}

/// Named function applied to parameters, e.g. `EQ(title, "x")`
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
}

/// Root of a parsed filter
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(pub Function);

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> Self {
        Function {
            name: name.into(),
            params,
        }
    }

    fn binary(name: &str, field: &str, value: Value) -> Self {
        Function::new(
            name,
            vec![Param::Value(Value::ident(field)), Param::Value(value)],
        )
    }

    pub fn eq(field: &str, value: Value) -> Self {
        Self::binary("EQ", field, value)
    }

    pub fn neq(field: &str, value: Value) -> Self {
        Self::binary("NEQ", field, value)
    }

    pub fn gt(field: &str, value: Value) -> Self {
        Self::binary("GT", field, value)
    }

    pub fn gte(field: &str, value: Value) -> Self {
        Self::binary("GTE", field, value)
    }

    pub fn lt(field: &str, value: Value) -> Self {
        Self::binary("LT", field, value)
    }

    pub fn lte(field: &str, value: Value) -> Self {
        Self::binary("LTE", field, value)
    }

    pub fn contains(field: &str, pattern: &str) -> Self {
        Self::binary("CONTAINS", field, Value::string(pattern))
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Self::binary("IN", field, Value::List(values))
    }

    pub fn and(parts: Vec<Function>) -> Self {
        Function::new("AND", parts.into_iter().map(Param::Function).collect())
    }

    pub fn or(parts: Vec<Function>) -> Self {
        Function::new("OR", parts.into_iter().map(Param::Function).collect())
    }

    pub fn not(inner: Function) -> Self {
        Function::new("NOT", vec![Param::Function(inner)])
    }
}
