use futures::TryStreamExt;
use sqlx::{postgres::PgRow, Encode, Postgres, QueryBuilder, Row, Type};

use super::manager::Tx;
use crate::models::ServiceResult;

/// Equality-filtered SELECT built from optional criteria.
///
/// Every `Some` criterion becomes `column = $n`; `None` leaves the column
/// unconstrained. Values are always bound, never interpolated.
pub struct FilterQuery<'a> {
    builder: QueryBuilder<'a, Postgres>,
    has_where: bool,
}

impl<'a> FilterQuery<'a> {
    /// Page query returning `columns` plus the full match count in `total`.
    pub fn select(table: &str, columns: &str) -> Self {
        Self::with_prefix(format!("SELECT {}, COUNT(*) OVER() AS total FROM {}", columns, table))
    }

    /// Bare count of matching rows, in `total`.
    pub fn count(table: &str) -> Self {
        Self::with_prefix(format!("SELECT COUNT(*) AS total FROM {}", table))
    }

    fn with_prefix(prefix: String) -> Self {
        Self { builder: QueryBuilder::new(prefix), has_where: false }
    }

    pub fn eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + Encode<'a, Postgres> + Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.builder.push(if self.has_where { " AND " } else { " WHERE " });
            self.builder.push(column).push(" = ").push_bind(value);
            self.has_where = true;
        }
        self
    }

    /// Append ordering and pagination. Offset and limit only apply when positive.
    pub fn page(mut self, order_by: &str, offset: i64, limit: i64) -> QueryBuilder<'a, Postgres> {
        self.builder.push(" ORDER BY ").push(order_by);
        if limit > 0 {
            self.builder.push(" LIMIT ").push_bind(limit);
        }
        if offset > 0 {
            self.builder.push(" OFFSET ").push_bind(offset);
        }
        self.builder
    }

    pub fn into_builder(self) -> QueryBuilder<'a, Postgres> {
        self.builder
    }

    pub fn sql(&self) -> &str {
        self.builder.sql()
    }
}

/// Describes one paged lookup against a single table.
pub struct PageQuery<'t> {
    pub table: &'t str,
    pub columns: &'t str,
    pub order_by: &'t str,
    pub offset: i64,
    pub limit: i64,
}

impl PageQuery<'_> {
    /// Run the lookup, returning the page and the size of the whole match set.
    ///
    /// The window count vanishes when the page is empty, so an offset past the
    /// end falls back to a plain COUNT with the same predicates.
    pub async fn fetch<T, P, M>(&self, tx: &mut Tx, predicates: P, from_row: M) -> ServiceResult<(Vec<T>, i64)>
    where
        P: for<'q> Fn(&mut FilterQuery<'q>),
        M: Fn(&PgRow) -> Result<T, sqlx::Error>,
    {
        let mut query = FilterQuery::select(self.table, self.columns);
        predicates(&mut query);
        let mut builder = query.page(self.order_by, self.offset, self.limit);

        let mut items = Vec::new();
        let mut total = 0;
        {
            let mut rows = builder.build().fetch(tx.conn());
            while let Some(row) = rows.try_next().await? {
                total = row.try_get("total")?;
                items.push(from_row(&row)?);
            }
        }

        if items.is_empty() && self.offset > 0 {
            let mut query = FilterQuery::count(self.table);
            predicates(&mut query);
            let row = query.into_builder().build().fetch_one(tx.conn()).await?;
            total = row.try_get("total")?;
        }

        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_criteria_means_no_where_clause() {
        let query = FilterQuery::select("exercise", "id, name");
        assert_eq!(query.sql(), "SELECT id, name, COUNT(*) OVER() AS total FROM exercise");
    }

    #[test]
    fn set_criteria_are_bound_in_order() {
        let mut query = FilterQuery::select("workout", "id");
        query
            .eq("id", None::<i64>)
            .eq("user_id", Some(3_i64))
            .eq("name", Some("Leg Day".to_string()));
        assert_eq!(
            query.sql(),
            "SELECT id, COUNT(*) OVER() AS total FROM workout WHERE user_id = $1 AND name = $2"
        );
    }

    #[test]
    fn pagination_only_when_positive() {
        let builder = FilterQuery::select("exercise", "id").page("id ASC", 0, 0);
        assert_eq!(builder.sql(), "SELECT id, COUNT(*) OVER() AS total FROM exercise ORDER BY id ASC");

        let mut query = FilterQuery::select("exercise", "id");
        query.eq("name", Some("Squat".to_string()));
        let builder = query.page("id ASC", 20, 10);
        assert_eq!(
            builder.sql(),
            "SELECT id, COUNT(*) OVER() AS total FROM exercise WHERE name = $1 ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn count_query_shares_predicates() {
        let mut query = FilterQuery::count("profile");
        query.eq("user_id", Some(9_i64));
        assert_eq!(query.sql(), "SELECT COUNT(*) AS total FROM profile WHERE user_id = $1");
    }
}
