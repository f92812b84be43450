//! SQLite column conversions for catalog value types.

use crate::artifact::{BaseModelCode, CategoryCode};
use crate::error::AtlasError;
use crate::identity::StableId;
use crate::layout::LayoutDescriptor;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

fn invalid(field: &str, value: &str) -> FromSqlError {
    FromSqlError::Other(Box::new(AtlasError::validation(
        field,
        format!("unrecognized stored value '{value}'"),
    )))
}

impl ToSql for BaseModelCode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BaseModelCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        BaseModelCode::from_code(raw).ok_or_else(|| invalid("base_model_code", raw))
    }
}

impl ToSql for CategoryCode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        CategoryCode::from_code(raw).ok_or_else(|| invalid("category_code", raw))
    }
}

impl ToSql for StableId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for StableId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        StableId::parse(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for LayoutDescriptor {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

/// Any stored text reads back as a descriptor; non-canonical text becomes `Unknown`.
impl FromSql for LayoutDescriptor {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(LayoutDescriptor::parse(value.as_str()?))
    }
}
