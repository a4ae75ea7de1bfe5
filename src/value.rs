//! The dynamic [`Value`] type and dot-path-addressable [`Context`] that the
//! template engine resolves templates against. Each rendered page gets a
//! fresh [`Context`]; contexts are never shared or mutated across renders.

use std::collections::HashMap;

/// A dynamically-typed template value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Truthiness for template conditionals: `Null`, `false`, `0`, empty
    /// strings, and empty collections are falsy; everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// The string form used for variable interpolation. Collections have no
    /// meaningful scalar form and render as the empty string.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// Looks up a direct child by key. Only maps have children.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Value {
        Value::Int(n as i64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Value {
        Value::Map(map)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Value {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// The data environment a template is resolved against. Keys at the top
/// level are plain identifiers; nested map values are addressed with
/// dot-paths (`post.title`).
#[derive(Clone, Debug, Default)]
pub struct Context {
    vars: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Sets a top-level variable.
    pub fn insert<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.vars.insert(key.to_owned(), value.into());
    }

    /// Resolves a dot-path against the context. Missing segments resolve to
    /// `None`; callers treat that as falsy/empty rather than an error.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.vars.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Creates the nested scope for a loop body: a copy of this context with
    /// `var` bound to `value`, shadowing any existing binding.
    pub fn scoped<V: Into<Value>>(&self, var: &str, value: V) -> Context {
        let mut child = self.clone();
        child.insert(var, value);
        child
    }
}

/// Convenience for building `Value::Map`s without spelling out the HashMap.
pub fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_dot_path() {
        let mut ctx = Context::new();
        ctx.insert("post", map(vec![("title", Value::from("Hello"))]));
        assert_eq!(ctx.lookup("post.title"), Some(&Value::from("Hello")));
        assert_eq!(ctx.lookup("post.missing"), None);
        assert_eq!(ctx.lookup("missing.title"), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::from("").truthy());
        assert!(!Value::from(0usize).truthy());
        assert!(!Value::List(Vec::new()).truthy());
        assert!(Value::from("x").truthy());
        assert!(Value::from(true).truthy());
    }

    #[test]
    fn test_scoped_shadows() {
        let mut ctx = Context::new();
        ctx.insert("x", "outer");
        let child = ctx.scoped("x", "inner");
        assert_eq!(child.lookup("x"), Some(&Value::from("inner")));
        assert_eq!(ctx.lookup("x"), Some(&Value::from("outer")));
    }

    #[test]
    fn test_render_forms() {
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::from(3usize).render(), "3");
        assert_eq!(Value::from("a").render(), "a");
        assert_eq!(Value::List(vec![Value::from("a")]).render(), "");
    }
}
