//! Sparse field patches shared by every entity's updates and inserts.

use sqlx::PgExecutor;

use authgate_core::error::AppError;
use authgate_core::result::AppResult;
use authgate_core::types::FilterValue;

use super::binder::{BoundQuery, NamedParams, bind_named};
use crate::error::db_err;

/// How a patched column receives its value.
#[derive(Debug, Clone, PartialEq)]
enum PatchValue {
    /// A bound parameter.
    Bound(FilterValue),
    /// A trusted SQL expression such as `NOW()`.
    Expr(&'static str),
}

/// The set of columns a write touches, in order.
///
/// Columns that are never set are neither updated nor inserted, so the
/// stored value (or the column default) survives.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    fields: Vec<(&'static str, PatchValue)>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always write `column`.
    pub fn set(&mut self, column: &'static str, value: impl Into<FilterValue>) -> &mut Self {
        self.put(column, PatchValue::Bound(value.into()))
    }

    /// Write `column` only when the value is present and not blank.
    pub fn set_if_some<V: Into<FilterValue>>(
        &mut self,
        column: &'static str,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value.map(Into::into).filter(|v| !v.is_blank()) {
            self.put(column, PatchValue::Bound(value));
        }
        self
    }

    /// Write `column` from a trusted SQL expression.
    pub fn set_expr(&mut self, column: &'static str, expr: &'static str) -> &mut Self {
        self.put(column, PatchValue::Expr(expr))
    }

    fn put(&mut self, column: &'static str, value: PatchValue) -> &mut Self {
        match self.fields.iter_mut().find(|(existing, _)| *existing == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
        self
    }

    /// Columns touched by this patch, in order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(column, _)| *column).collect()
    }

    /// Whether the patch touches nothing.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(placeholder or expression)` for each column, registering the bound
    /// values under `set_<column>`.
    fn value_exprs(&self, params: &mut NamedParams) -> Vec<String> {
        self.fields
            .iter()
            .map(|(column, value)| match value {
                PatchValue::Bound(v) => {
                    let name = format!("set_{column}");
                    params.set(name.clone(), v.clone());
                    format!(":{name}")
                }
                PatchValue::Expr(expr) => (*expr).to_string(),
            })
            .collect()
    }

    /// Render `UPDATE table SET ... WHERE key_column = key`.
    pub fn render_update(
        &self,
        table: &str,
        key_column: &str,
        key: impl Into<FilterValue>,
    ) -> AppResult<BoundQuery> {
        if self.is_empty() {
            return Err(AppError::validation(format!("Nothing to update on {table}")));
        }

        let mut params = NamedParams::new();
        let assignments: Vec<String> = self
            .columns()
            .into_iter()
            .zip(self.value_exprs(&mut params))
            .map(|(column, expr)| format!("{column} = {expr}"))
            .collect();
        params.set("key", key);

        let template = format!(
            "UPDATE {table} SET {} WHERE {key_column} = :key",
            assignments.join(", ")
        );
        Ok(bind_named(&template, &params))
    }

    /// Render `INSERT INTO table (...) VALUES (...)` for the set columns.
    pub fn render_insert(&self, table: &str) -> AppResult<BoundQuery> {
        if self.is_empty() {
            return Err(AppError::validation(format!("Nothing to insert into {table}")));
        }

        let mut params = NamedParams::new();
        let values = self.value_exprs(&mut params);
        let template = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            self.columns().join(", "),
            values.join(", ")
        );
        Ok(bind_named(&template, &params))
    }
}

/// Apply a patch to the row of `table` whose `key_column` equals `key`.
///
/// Returns the number of rows affected.
pub async fn apply_update<'e, E>(
    executor: E,
    table: &str,
    key_column: &str,
    key: impl Into<FilterValue>,
    patch: &Patch,
) -> AppResult<u64>
where
    E: PgExecutor<'e>,
{
    let bound = patch.render_update(table, key_column, key)?;
    let result = sqlx::query_with(&bound.sql, bound.arguments()?)
        .execute(executor)
        .await
        .map_err(db_err("Failed to apply update"))?;
    Ok(result.rows_affected())
}
