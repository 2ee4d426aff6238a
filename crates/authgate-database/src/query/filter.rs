//! Composable `WHERE` predicates.

use authgate_core::types::FilterValue;

use super::binder::{BoundQuery, NamedParams, bind_named};

/// An ordered list of `AND`-joined conditions and the values they bind.
///
/// Conditions reference their values as `:name` placeholders and are
/// rendered once, together with the surrounding statement, through
/// [`bind_named`].
#[derive(Debug, Clone, Default)]
pub struct Predicates {
    conditions: Vec<String>,
    params: NamedParams,
}

impl Predicates {
    /// Create an empty predicate list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition that binds one named value.
    pub fn and(
        &mut self,
        condition: impl Into<String>,
        name: &str,
        value: impl Into<FilterValue>,
    ) -> &mut Self {
        self.conditions.push(condition.into());
        self.params.set(name, value);
        self
    }

    /// Add a condition only when the value is present and not blank.
    pub fn and_if<V: Into<FilterValue>>(
        &mut self,
        condition: impl Into<String>,
        name: &str,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value.map(Into::into).filter(|v| !v.is_blank()) {
            self.and(condition, name, value);
        }
        self
    }

    /// Add a condition that binds nothing.
    pub fn and_raw(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether no conditions were added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The ` WHERE ...` clause, or an empty string for no conditions.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Render `head WHERE ... tail` with the predicate values followed by
    /// `extra` values (pagination, layouts, ...).
    pub fn render(&self, head: &str, tail: &str, extra: &NamedParams) -> BoundQuery {
        let template = format!("{head}{}{tail}", self.where_clause());
        let mut params = self.params.clone();
        params.merge(extra);
        bind_named(&template, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_empty_predicates_render_no_where() {
        let bound = Predicates::new().render("SELECT COUNT(*) FROM sessions", "", &NamedParams::new());
        assert_eq!(bound.sql, "SELECT COUNT(*) FROM sessions");
        assert!(bound.args.is_empty());
    }

    #[test]
    fn test_conditions_join_in_order() {
        let user = Uuid::new_v4();
        let mut predicates = Predicates::new();
        predicates
            .and("user_id = :user_id", "user_id", user)
            .and_if("ip ILIKE :search", "search", Some("%10.0%"))
            .and_if("client_type_id = :client_type_id", "client_type_id", None::<Uuid>);

        let extra = NamedParams::new().with("limit", 10i64).with("offset", 0i64);
        let bound = predicates.render(
            "SELECT * FROM sessions",
            " LIMIT :limit OFFSET :offset",
            &extra,
        );

        assert_eq!(
            bound.sql,
            "SELECT * FROM sessions WHERE user_id = $1 AND ip ILIKE $2 LIMIT $3 OFFSET $4"
        );
        assert_eq!(bound.args.len(), 4);
        assert_eq!(bound.args[0], FilterValue::Uuid(user));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let mut predicates = Predicates::new();
        predicates
            .and_if("ip ILIKE :search", "search", Some("   "))
            .and_if("user_id = :user_id", "user_id", Some(Uuid::nil()));
        assert!(predicates.is_empty());
    }

    #[test]
    fn test_raw_condition_and_null_safe_match() {
        let mut predicates = Predicates::new();
        predicates
            .and("env_id IS NOT DISTINCT FROM :env_id", "env_id", None::<Uuid>)
            .and_raw("expires_at > NOW()");

        let bound = predicates.render("DELETE FROM sessions", "", &NamedParams::new());
        assert_eq!(
            bound.sql,
            "DELETE FROM sessions WHERE env_id IS NOT DISTINCT FROM $1 AND expires_at > NOW()"
        );
        assert_eq!(bound.args, vec![FilterValue::NullableUuid(None)]);
    }
}
