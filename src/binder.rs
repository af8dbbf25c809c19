//! Dialect binder.
//!
//! Reassembles compiled fragments into positional SQL for a [`BindStyle`]
//! and resolves each named placeholder against the caller's arguments.

use std::collections::BTreeMap;

use crate::dialect::BindStyle;
use crate::error::{MintError, MintResult};
use crate::parser::CompiledNamedQuery;
use crate::value::Value;

/// Join fragments with positional placeholders.
///
/// Dollar numbering starts at `start_index + 1`. Escaped markers collapse:
/// `##` becomes `#` in both styles, `??` becomes `?` in question style.
pub fn render(style: BindStyle, fragments: &[String], start_index: usize) -> String {
    let mut sql = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            match style {
                BindStyle::Question => sql.push('?'),
                BindStyle::Dollar => {
                    sql.push('$');
                    sql.push_str(&(i + start_index).to_string());
                }
            }
        }
        sql.push_str(&unescape(style, fragment));
    }
    sql
}

fn unescape(style: BindStyle, fragment: &str) -> String {
    let text = fragment.replace("##", "#");
    match style {
        BindStyle::Question => text.replace("??", "?"),
        BindStyle::Dollar => text,
    }
}

/// Reject argument lists that cannot describe a binding context.
fn check_shape(names: &[&str], values: &[Value]) -> MintResult<()> {
    if names.is_empty() {
        if values.is_empty() {
            return Err(MintError::bind("arguments missing"));
        }
        if values.len() > 1 {
            return Err(MintError::bind("arguments exceed 1"));
        }
    } else if names.len() != values.len() {
        return Err(MintError::bind(format!(
            "{} argument names but {} values",
            names.len(),
            values.len()
        )));
    }
    Ok(())
}

/// Normalize caller arguments into a single context value.
///
/// - no names, one value: the value itself
/// - one name with a scalar value: `{name: value}`
/// - one name with a composite value: the composite
/// - several names: one mapping keyed by name
pub fn normalize_args(names: &[&str], values: &[Value]) -> MintResult<Value> {
    check_shape(names, values)?;

    match names.len() {
        0 => Ok(values[0].clone()),
        1 if values[0].is_composite() => Ok(values[0].clone()),
        _ => {
            let args: BTreeMap<String, Value> = names
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            Ok(Value::Map(args))
        }
    }
}

/// Resolve every bind name, in order, to a positional value.
///
/// Names are looked up among the argument names first; a dotted name may
/// reach into a named composite. Otherwise, when exactly one composite
/// argument was supplied, the name is looked up on it.
pub fn bind_values(bind_names: &[String], names: &[&str], values: &[Value]) -> MintResult<Vec<Value>> {
    if bind_names.is_empty() {
        return Ok(Vec::new());
    }
    check_shape(names, values)?;

    let composite = match values {
        [single] if single.is_composite() => Some(single),
        _ => None,
    };

    bind_names
        .iter()
        .map(|bind| {
            resolve_named(bind, names, values)
                .or_else(|| composite.and_then(|c| c.lookup(bind)))
                .cloned()
                .ok_or_else(|| MintError::bind(format!("'{}' not found", bind)))
        })
        .collect()
}

fn resolve_named<'a>(bind: &str, names: &[&str], values: &'a [Value]) -> Option<&'a Value> {
    if let Some(i) = names.iter().position(|n| *n == bind) {
        return Some(&values[i]);
    }
    let (head, rest) = bind.split_once('.')?;
    let i = names.iter().position(|n| *n == head)?;
    values[i].lookup(rest)
}

/// Render a compiled query and bind its values in one step.
pub fn bind_compiled(
    style: BindStyle,
    compiled: &CompiledNamedQuery,
    start_index: usize,
    names: &[&str],
    values: &[Value],
) -> MintResult<(String, Vec<Value>)> {
    let sql = render(style, &compiled.fragments, start_index);
    let params = bind_values(&compiled.bind_names, names, values)?;
    Ok((sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile;

    fn record() -> Value {
        let mut m = BTreeMap::new();
        m.insert("id".to_string(), Value::Int(3));
        m.insert("name".to_string(), Value::from("ann"));
        Value::Map(m)
    }

    #[test]
    fn test_render_question() {
        let q = compile("SELECT * FROM t WHERE a = #{a} AND b = #{b}").unwrap();
        assert_eq!(
            render(BindStyle::Question, &q.fragments, 0),
            "SELECT * FROM t WHERE a = ? AND b = ?"
        );
    }

    #[test]
    fn test_render_dollar_with_offset() {
        let q = compile("a = #{a} AND b = #{b}").unwrap();
        assert_eq!(render(BindStyle::Dollar, &q.fragments, 0), "a = $1 AND b = $2");
        assert_eq!(render(BindStyle::Dollar, &q.fragments, 3), "a = $4 AND b = $5");
    }

    #[test]
    fn test_render_escapes() {
        let q = compile("SELECT '##' , data ?? 'k' FROM t WHERE a = #{a}").unwrap();
        assert_eq!(
            render(BindStyle::Question, &q.fragments, 0),
            "SELECT '#' , data ? 'k' FROM t WHERE a = ?"
        );
        assert_eq!(
            render(BindStyle::Dollar, &q.fragments, 0),
            "SELECT '#' , data ?? 'k' FROM t WHERE a = $1"
        );
    }

    #[test]
    fn test_bind_by_name() {
        let q = compile("a = #{a} AND b = #{b} AND a2 = #{a}").unwrap();
        let params = bind_values(&q.bind_names, &["b", "a"], &[Value::Int(2), Value::Int(1)]).unwrap();
        assert_eq!(params, vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_bind_from_composite() {
        let q = compile("id = #{id} AND name = #{name}").unwrap();
        let params = bind_values(&q.bind_names, &[], &[record()]).unwrap();
        assert_eq!(params, vec![Value::Int(3), Value::from("ann")]);

        // a named composite still answers unknown names
        let params = bind_values(&q.bind_names, &["user"], &[record()]).unwrap();
        assert_eq!(params, vec![Value::Int(3), Value::from("ann")]);
    }

    #[test]
    fn test_bind_dotted_name() {
        let q = compile("id = #{user.id} AND x = #{x}").unwrap();
        let params = bind_values(&q.bind_names, &["user", "x"], &[record(), Value::Bool(true)]).unwrap();
        assert_eq!(params, vec![Value::Int(3), Value::Bool(true)]);
    }

    #[test]
    fn test_bind_missing_name() {
        let q = compile("id = #{id} AND z = #{z}").unwrap();
        let err = bind_values(&q.bind_names, &["id", "y"], &[Value::Int(1), Value::Int(2)]).unwrap_err();
        assert_eq!(err.to_string(), "Bind error: 'z' not found");
    }

    #[test]
    fn test_bind_shape_errors() {
        let names = vec!["id".to_string()];
        assert_eq!(
            bind_values(&names, &[], &[]).unwrap_err().to_string(),
            "Bind error: arguments missing"
        );
        assert_eq!(
            bind_values(&names, &[], &[Value::Int(1), Value::Int(2)]).unwrap_err().to_string(),
            "Bind error: arguments exceed 1"
        );
        assert!(bind_values(&names, &["id", "x"], &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_normalize_args() {
        assert_eq!(normalize_args(&[], &[Value::Int(1)]).unwrap(), Value::Int(1));

        let single = normalize_args(&["id"], &[Value::Int(1)]).unwrap();
        assert_eq!(single.get("id"), Some(&Value::Int(1)));

        let composite = normalize_args(&["user"], &[record()]).unwrap();
        assert_eq!(composite, record());

        let merged = normalize_args(&["a", "b"], &[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(merged.get("b"), Some(&Value::Int(2)));

        assert!(normalize_args(&[], &[]).is_err());
    }
}
