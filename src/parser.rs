//! Named query compiler using nom.
//!
//! Splits SQL text into literal fragments interleaved with named
//! placeholders.
//!
//! ```text
//! SELECT * FROM users WHERE id = #{id} AND tag = '##x' OR org = #{org.id}
//! ───────────┬────────────────── ─┬─── ───────┬─────────────── ────┬────
//!            │                    │           │                    │
//!            │                    │           │                    └── Dotted name
//!            │                    │           └── Fragment (`##` is a literal escape)
//!            │                    └── Placeholder
//!            └── Fragment
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::char,
    sequence::delimited,
    IResult,
};
use once_cell::sync::Lazy;

use crate::error::{MintError, MintResult};

/// Upper bound on entries in the process-wide compile cache.
pub const MAX_CACHED_QUERIES: usize = 1000;

static CACHE: Lazy<QueryCache> = Lazy::new(|| QueryCache::new(MAX_CACHED_QUERIES));

/// SQL text split at its named placeholders.
///
/// `fragments.len() == bind_names.len() + 1` always holds; fragments may be
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledNamedQuery {
    pub fragments: Vec<String>,
    pub bind_names: Vec<String>,
}

impl CompiledNamedQuery {
    pub fn has_bindings(&self) -> bool {
        !self.bind_names.is_empty()
    }

    /// Rejoin the fragments with `#{name}` placeholders.
    pub fn to_source(&self) -> String {
        let mut out = self.fragments[0].clone();
        for (name, fragment) in self.bind_names.iter().zip(&self.fragments[1..]) {
            out.push_str("#{");
            out.push_str(name);
            out.push('}');
            out.push_str(fragment);
        }
        out
    }
}

/// Compile SQL text containing `#{name}` placeholders.
pub fn compile(sql: &str) -> MintResult<CompiledNamedQuery> {
    let mut fragments = Vec::new();
    let mut bind_names = Vec::new();
    let mut current = String::new();
    let mut input = sql;

    while !input.is_empty() {
        let position = sql.len() - input.len();

        if input.starts_with("#{") {
            let (rest, name) =
                parse_placeholder(input).map_err(|_| placeholder_error(position, input))?;
            if name.split('.').any(str::is_empty) {
                return Err(MintError::parse(
                    position,
                    format!("invalid placeholder name '{}'", name),
                ));
            }
            fragments.push(std::mem::take(&mut current));
            bind_names.push(name.to_string());
            input = rest;
            continue;
        }

        let (rest, text) = parse_literal(input)
            .map_err(|e| MintError::parse(position, format!("Parse failed: {:?}", e)))?;
        current.push_str(text);
        input = rest;
    }

    fragments.push(current);
    Ok(CompiledNamedQuery {
        fragments,
        bind_names,
    })
}

/// Compiled queries keyed by SQL text, capped at `max_entries`.
///
/// Once full, new text is still compiled but no longer kept.
pub struct QueryCache {
    entries: DashMap<String, Arc<CompiledNamedQuery>>,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_entries),
            max_entries,
        }
    }

    pub fn compile(&self, sql: &str) -> MintResult<Arc<CompiledNamedQuery>> {
        if let Some(hit) = self.entries.get(sql) {
            tracing::trace!("named query cache hit");
            return Ok(Arc::clone(&hit));
        }

        let compiled = Arc::new(compile(sql)?);
        tracing::debug!(
            "compiled named query with {} bindings: {}",
            compiled.bind_names.len(),
            sql
        );
        if self.entries.len() < self.max_entries {
            self.entries.insert(sql.to_string(), Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compile through the process-wide cache.
pub fn compile_cached(sql: &str) -> MintResult<Arc<CompiledNamedQuery>> {
    CACHE.compile(sql)
}

/// Number of queries held by the process-wide cache.
pub fn cached_queries() -> usize {
    CACHE.len()
}

/// Parse `#{name}`.
fn parse_placeholder(input: &str) -> IResult<&str, &str> {
    delimited(tag("#{"), take_while1(is_name_char), char('}'))(input)
}

/// Parse literal text up to the next marker, an escaped `##`, or a lone `#`.
fn parse_literal(input: &str) -> IResult<&str, &str> {
    alt((tag("##"), take_till1(|c: char| c == '#'), tag("#")))(input)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn placeholder_error(position: usize, input: &str) -> MintError {
    let body = &input[2..];
    let message = match body.find('}') {
        None => "unterminated placeholder".to_string(),
        Some(0) => "empty placeholder name".to_string(),
        Some(end) => format!("invalid placeholder name '{}'", &body[..end]),
    };
    MintError::parse(position, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_compile() {
        let q = compile("SELECT * FROM users WHERE id = #{id}").unwrap();
        assert_eq!(q.fragments, vec!["SELECT * FROM users WHERE id = ", ""]);
        assert_eq!(q.bind_names, vec!["id"]);
    }

    #[test]
    fn test_no_placeholders() {
        let q = compile("SELECT 1").unwrap();
        assert_eq!(q.fragments, vec!["SELECT 1"]);
        assert!(!q.has_bindings());
    }

    #[test]
    fn test_empty_text() {
        let q = compile("").unwrap();
        assert_eq!(q.fragments, vec![""]);
        assert!(q.bind_names.is_empty());
    }

    #[test]
    fn test_adjacent_and_leading_placeholders() {
        let q = compile("#{a}#{b}, #{c.d}").unwrap();
        assert_eq!(q.fragments, vec!["", "", ", ", ""]);
        assert_eq!(q.bind_names, vec!["a", "b", "c.d"]);
    }

    #[test]
    fn test_escape_is_not_a_binding() {
        let q = compile("SELECT '##{x}', '#' FROM t WHERE a = #{a}").unwrap();
        assert_eq!(q.bind_names, vec!["a"]);
        assert_eq!(q.fragments[0], "SELECT '##{x}', '#' FROM t WHERE a = ");
    }

    #[test]
    fn test_round_trip_source() {
        for sql in [
            "INSERT INTO t(a, b) VALUES(#{a}, #{b})",
            "#{x}",
            "a ## b # c #{d}e",
            "no bindings at all",
        ] {
            let q = compile(sql).unwrap();
            assert_eq!(q.fragments.len(), q.bind_names.len() + 1);
            assert_eq!(q.to_source(), sql);
        }
    }

    #[test]
    fn test_unterminated() {
        let err = compile("SELECT #{id").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 7: unterminated placeholder");
    }

    #[test]
    fn test_empty_name() {
        let err = compile("a = #{}").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 4: empty placeholder name");
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(compile("a = #{a b}"), Err(MintError::Parse { position: 4, .. })));
        assert!(matches!(compile("a = #{a..b}"), Err(MintError::Parse { position: 4, .. })));
    }

    #[test]
    fn test_cache_shares_result() {
        let cache = QueryCache::new(4);
        let a = cache.compile("SELECT #{shared}").unwrap();
        let b = cache.compile("SELECT #{shared}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = QueryCache::new(3);
        for i in 0..10 {
            let q = cache.compile(&format!("SELECT * FROM t{} WHERE id = #{{id}}", i)).unwrap();
            assert_eq!(q.bind_names, vec!["id"]);
        }
        assert_eq!(cache.len(), 3);

        // past the cap, text still compiles
        let q = cache.compile("SELECT #{late}").unwrap();
        assert_eq!(q.bind_names, vec!["late"]);
        assert_eq!(cache.len(), 3);
    }
}
