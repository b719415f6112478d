//! 선택 컬럼 파싱
//!
//! `"<table>.<field>[:<alias>]"` 형식의 컬럼 지정을 해석합니다.
//! 별칭이 없으면 필드 이름을 별칭으로 사용합니다.
//! 조인의 embed 이름이 있으면 별칭은 `"<embed>____<alias>"`가 되고,
//! 결과 변환 시 `embed` 하위 객체로 묶입니다.

use sea_query::{Expr, SimpleExpr};
use tbl_core::schema::ensure_identifier;
use tbl_core::{Error, Result};

use crate::statement::{column_ref, DynIden};

/// embed 이름과 별칭 사이 구분자
pub const EMBED_SEPARATOR: &str = "____";

/// 선택 컬럼 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub table: String,
    pub field: String,
    pub alias: String,
}

impl SelectedColumn {
    /// 컬럼 지정 파싱
    ///
    /// 테이블이 생략되면 `default_table`을 사용합니다.
    pub fn parse(spec: &str, default_table: &str) -> Result<Self> {
        let (path, alias) = match spec.split_once(':') {
            Some((path, alias)) => (path.trim(), Some(alias.trim())),
            None => (spec.trim(), None),
        };
        let (table, field) = match path.rsplit_once('.') {
            Some((table, field)) => (table, field),
            None => (default_table, path),
        };
        let alias = alias.unwrap_or(field);

        for part in [table, field, alias] {
            ensure_identifier(part).map_err(|_| Error::invalid_field(spec))?;
        }

        Ok(Self {
            table: table.to_string(),
            field: field.to_string(),
            alias: alias.to_string(),
        })
    }

    /// `table.field`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.field)
    }

    /// embed 이름을 붙인 별칭으로 변경
    pub fn embedded(mut self, embed: &str) -> Self {
        self.alias = format!("{}{}{}", embed, EMBED_SEPARATOR, self.alias);
        self
    }

    /// SELECT 목록 항목 (`"table"."field" AS "alias"`)
    pub(crate) fn select_expr(&self) -> (SimpleExpr, DynIden) {
        (
            Expr::col(column_ref(&self.table, &self.field)).into(),
            DynIden::new(self.alias.as_str()),
        )
    }
}

/// embed 별칭 분리 (`"profile____bio"` -> `("profile", "bio")`)
pub fn split_embedded(alias: &str) -> Option<(&str, &str)> {
    alias
        .split_once(EMBED_SEPARATOR)
        .filter(|(embed, key)| !embed.is_empty() && !key.is_empty())
}

/// embed 이름 검증
pub fn ensure_embed_name(name: &str) -> Result<()> {
    ensure_identifier(name)?;
    if name.contains(EMBED_SEPARATOR) {
        return Err(Error::bad_request(format!(
            "embed name must not contain '{}': {}",
            EMBED_SEPARATOR, name
        )));
    }
    Ok(())
}

/// 컬럼 목록 파싱 결과
#[derive(Debug, Clone, Default)]
pub struct ColumnList {
    columns: Vec<SelectedColumn>,
}

impl ColumnList {
    pub fn parse(specs: &[String], default_table: &str) -> Result<Self> {
        let columns = specs
            .iter()
            .map(|s| SelectedColumn::parse(s, default_table))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    /// 별칭을 뗀 `table.field` 목록
    pub fn base_fields(&self) -> Vec<String> {
        self.columns.iter().map(SelectedColumn::qualified).collect()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.alias.clone()).collect()
    }

    pub fn into_columns(self) -> Vec<SelectedColumn> {
        self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedColumn> {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution() {
        let specs = vec!["users.name".to_string(), "users.email:contact".to_string()];
        let list = ColumnList::parse(&specs, "users").unwrap();
        assert_eq!(list.base_fields(), vec!["users.name", "users.email"]);
        assert_eq!(list.aliases(), vec!["name", "contact"]);
    }

    #[test]
    fn test_default_table() {
        let col = SelectedColumn::parse("email", "users").unwrap();
        assert_eq!(col.qualified(), "users.email");
        assert_eq!(col.alias, "email");
    }

    #[test]
    fn test_embedded_alias() {
        let col = SelectedColumn::parse("profiles.bio", "users")
            .unwrap()
            .embedded("profile");
        assert_eq!(col.alias, "profile____bio");
        assert_eq!(split_embedded(&col.alias), Some(("profile", "bio")));
        assert_eq!(split_embedded("bio"), None);
    }

    #[test]
    fn test_rejects_non_identifiers() {
        assert!(SelectedColumn::parse("users.name:x y", "users").is_err());
        assert!(SelectedColumn::parse("users.name) --", "users").is_err());
        assert!(SelectedColumn::parse("", "users").is_err());
        assert!(ensure_embed_name("a____b").is_err());
        assert!(ensure_embed_name("profile").is_ok());
    }
}
