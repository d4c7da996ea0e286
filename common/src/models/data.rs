//! Table data request and row models.

use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::utils::sql_validator::validate_database_name;

/// One result row: column name to JSON value, in result-set column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Query parameters for listing rows of a table.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TableDataQuery {
    /// Target database name.
    #[validate(
        required(message = "missing required parameter: db_name"),
        length(min = 1, message = "missing required parameter: db_name"),
        custom(function = "validate_database_name")
    )]
    pub db_name: Option<String>,

    /// Comma-separated column list; all columns when absent.
    pub columns: Option<String>,

    /// Filter predicate, e.g. `age >= 18 AND status = 'active'`.
    pub filter: Option<String>,
}

/// Query parameters for fetching a single item.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    /// Target database name.
    #[validate(
        required(message = "missing required parameter: db_name"),
        length(min = 1, message = "missing required parameter: db_name"),
        custom(function = "validate_database_name")
    )]
    pub db_name: Option<String>,
}

impl TableDataQuery {
    /// Column list with blank entries dropped, or `None` for all columns.
    pub fn column_list(&self) -> Option<Vec<&str>> {
        let columns: Vec<&str> = self
            .columns
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        (!columns.is_empty()).then_some(columns)
    }

    /// Filter text, or `None` when absent or blank.
    pub fn filter_text(&self) -> Option<&str> {
        self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(db: Option<&str>) -> TableDataQuery {
        TableDataQuery {
            db_name: db.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_db_name_is_required() {
        assert!(query(None).validate().is_err());
        assert!(query(Some("")).validate().is_err());
        assert!(query(Some("shop")).validate().is_ok());
    }

    #[test]
    fn test_db_name_must_be_an_identifier() {
        assert!(query(Some("shop; DROP DATABASE x")).validate().is_err());
        assert!(ItemQuery { db_name: Some("shop/x".into()) }.validate().is_err());
    }

    #[test]
    fn test_column_list() {
        let mut q = query(Some("d"));
        assert_eq!(q.column_list(), None);

        q.columns = Some(" , ".into());
        assert_eq!(q.column_list(), None);

        q.columns = Some("a, b,,c ".into());
        assert_eq!(q.column_list(), Some(vec!["a", "b", "c"]));
    }

    #[test]
    fn test_filter_text() {
        let mut q = query(Some("d"));
        assert_eq!(q.filter_text(), None);
        q.filter = Some("   ".into());
        assert_eq!(q.filter_text(), None);
        q.filter = Some(" age > 3 ".into());
        assert_eq!(q.filter_text(), Some("age > 3"));
    }
}
