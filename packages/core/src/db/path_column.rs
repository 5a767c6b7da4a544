//! Path Column SQL
//!
//! SQL half of the path type. SQLite has no `ltree`, so the containment,
//! level, and subpath capabilities are rendered as plain expressions over the
//! `TEXT` path column:
//!
//! - strict descendant of `P`: `path >= 'P.' AND path < 'P/'` (a range scan on
//!   the path index; `/` is the character after the separator)
//! - ancestor-or-self of `P`: `path IN (<every prefix of P>)`
//! - level: separator count + 1
//! - prefix rewrite: `:new || substr(path, length(:old) + 1)`
//!
//! Every builder returns SQL with `?` placeholders and the values to bind, in
//! placeholder order.

use libsql::Value;

use crate::models::{MaterializedPath, PATH_SEPARATOR};

/// Character immediately after [`PATH_SEPARATOR`]; exclusive upper bound of a subtree range
const RANGE_END: char = '/';

/// SQL fragment with positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A predicate that matches nothing
    pub fn never() -> Self {
        Self::new("0", Vec::new())
    }
}

fn text(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

/// Expression builder for one path column
#[derive(Debug, Clone, Copy)]
pub struct PathColumn<'a> {
    column: &'a str,
}

impl<'a> PathColumn<'a> {
    pub fn new(column: &'a str) -> Self {
        Self { column }
    }

    /// Rows whose path is a strict descendant of `path`
    pub fn descendant_of(&self, path: &MaterializedPath) -> SqlFragment {
        SqlFragment::new(
            format!("({c} >= ? AND {c} < ?)", c = self.column),
            vec![
                text(format!("{}{}", path, PATH_SEPARATOR)),
                text(format!("{}{}", path, RANGE_END)),
            ],
        )
    }

    /// Rows whose path is `path` or a descendant of it
    pub fn descendant_or_self_of(&self, path: &MaterializedPath) -> SqlFragment {
        let strict = self.descendant_of(path);
        let mut params = vec![text(path.as_str())];
        params.extend(strict.params);
        SqlFragment::new(format!("({} = ? OR {})", self.column, strict.sql), params)
    }

    /// Rows whose path is a strict ancestor of `path`
    pub fn ancestor_of(&self, path: &MaterializedPath) -> SqlFragment {
        let mut prefixes = path.prefixes();
        prefixes.pop();
        self.any_of(&prefixes)
    }

    /// Rows whose path is `path` or an ancestor of it
    pub fn ancestor_or_self_of(&self, path: &MaterializedPath) -> SqlFragment {
        self.any_of(&path.prefixes())
    }

    /// Rows whose path equals one of `paths`
    pub fn any_of(&self, paths: &[MaterializedPath]) -> SqlFragment {
        if paths.is_empty() {
            return SqlFragment::never();
        }
        let placeholders = vec!["?"; paths.len()].join(", ");
        SqlFragment::new(
            format!("{} IN ({})", self.column, placeholders),
            paths.iter().map(|p| text(p.as_str())).collect(),
        )
    }

    /// Segment count of the column value
    pub fn level(&self) -> String {
        format!(
            "(length({c}) - length(replace({c}, '{sep}', '')) + 1)",
            c = self.column,
            sep = PATH_SEPARATOR
        )
    }

    /// Rows whose path has exactly `depth` segments
    pub fn at_level(&self, depth: usize) -> SqlFragment {
        SqlFragment::new(
            format!("{} = ?", self.level()),
            vec![Value::Integer(depth as i64)],
        )
    }

    /// New column value for a row under `old`, re-rooted at `new`
    ///
    /// Keeps everything after `old`, separator included, so
    /// `new || subpath(path, level(old))` holds segment for segment.
    pub fn rewrite_prefix(&self, old: &MaterializedPath, new: &MaterializedPath) -> SqlFragment {
        SqlFragment::new(
            format!("? || substr({}, length(?) + 1)", self.column),
            vec![text(new.as_str()), text(old.as_str())],
        )
    }
}
