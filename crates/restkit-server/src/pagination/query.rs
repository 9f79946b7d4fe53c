//! Query model rendered to Postgres SQL
//!
//! Table, column and order-by names are supplied by handler code and are
//! written into the SQL verbatim. Values always go through bind parameters.

use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{DateFilter, DatePredicate, PageWindow};

/// Bindable value for an equality condition
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Uuid(Uuid),
    Date(NaiveDate),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Row condition joined with `AND`
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`
    Equals { column: String, value: SqlValue },
    /// Case-insensitive substring match on any of `columns`
    Contains { columns: Vec<String>, needle: String },
}

/// Base list query for one table, before paging and date filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    table: String,
    columns: Vec<String>,
    order_by: Option<String>,
    conditions: Vec<Condition>,
}

impl ListQuery {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            columns: Vec::new(),
            order_by: None,
            conditions: Vec::new(),
        }
    }

    /// Columns to select; `*` when none are given
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Raw `ORDER BY` expression, e.g. `"created_at DESC, id"`
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(Condition::Equals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Add a keyword search over `columns`. A missing keyword adds nothing.
    pub fn search<I, S>(mut self, columns: I, keyword: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(needle) = keyword.map(str::trim).filter(|k| !k.is_empty()) else {
            return self;
        };
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if !columns.is_empty() {
            self.conditions.push(Condition::Contains {
                columns,
                needle: needle.to_string(),
            });
        }
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// A [`ListQuery`] narrowed by a page window and optional date predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredQuery {
    base: ListQuery,
    window: PageWindow,
    date: Option<DatePredicate>,
}

impl FilteredQuery {
    pub fn new(base: ListQuery, window: PageWindow, date: Option<DatePredicate>) -> Self {
        Self { base, window, date }
    }

    pub fn base(&self) -> &ListQuery {
        &self.base
    }

    pub fn window(&self) -> PageWindow {
        self.window
    }

    pub fn date(&self) -> Option<&DatePredicate> {
        self.date.as_ref()
    }

    /// `SELECT` for the current page
    pub fn select_sql(&self) -> QueryBuilder<'static, Postgres> {
        let columns = if self.base.columns.is_empty() {
            "*".to_string()
        } else {
            self.base.columns.join(", ")
        };

        let mut builder = QueryBuilder::new(format!("SELECT {} FROM {}", columns, self.base.table));
        self.push_where(&mut builder);
        if let Some(order_by) = &self.base.order_by {
            builder.push(" ORDER BY ").push(order_by);
        }
        builder
            .push(" LIMIT ")
            .push_bind(self.window.limit())
            .push(" OFFSET ")
            .push_bind(self.window.offset());
        builder
    }

    /// `SELECT COUNT(*)` over the same filters, ignoring the page window
    pub fn count_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.base.table));
        self.push_where(&mut builder);
        builder
    }

    fn push_where(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        let mut keyword = " WHERE ";

        for condition in &self.base.conditions {
            builder.push(keyword);
            keyword = " AND ";
            match condition {
                Condition::Equals { column, value } => {
                    builder.push(column).push(" = ");
                    push_value(builder, value);
                },
                Condition::Contains { columns, needle } => {
                    let pattern = format!("%{}%", escape_like(needle));
                    builder.push("(");
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            builder.push(" OR ");
                        }
                        builder
                            .push(column)
                            .push(" ILIKE ")
                            .push_bind(pattern.clone());
                    }
                    builder.push(")");
                },
            }
        }

        if let Some(date) = &self.date {
            builder.push(keyword).push(&date.column).push("::date");
            match date.filter {
                DateFilter::On(day) => {
                    builder.push(" = ").push_bind(day);
                },
                DateFilter::Between(start, end) => {
                    builder
                        .push(" BETWEEN ")
                        .push_bind(start)
                        .push(" AND ")
                        .push_bind(end);
                },
            }
        }
    }
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &SqlValue) {
    match value {
        SqlValue::Text(v) => builder.push_bind(v.clone()),
        SqlValue::Int(v) => builder.push_bind(*v),
        SqlValue::Bool(v) => builder.push_bind(*v),
        SqlValue::Uuid(v) => builder.push_bind(*v),
        SqlValue::Date(v) => builder.push_bind(*v),
    };
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
