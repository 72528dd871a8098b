use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use thiserror::Error;

use super::{EvidenceStore, GrantRecord, RetractionRecord, TrialRecord};

static NAME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(dr\.?|professor|prof\.?|mr\.?|mrs\.?|ms\.?)\s+").expect("valid name prefix pattern")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// 基于 SQLite 的只读证据库
///
/// 每次查询单独打开只读连接，库文件不存在时直接视为未命中。
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Option<Connection>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Some(conn))
    }

    /// 执行查询，任何存储错误都降级为未命中
    fn best_effort<T>(
        &self,
        what: &str,
        key: &str,
        query: impl FnOnce(&Connection) -> Result<Option<T>, StoreError>,
    ) -> Option<T> {
        let result = self
            .open()
            .and_then(|conn| conn.map(|c| query(&c)).transpose().map(Option::flatten));
        match result {
            Ok(found) => {
                if found.is_some() {
                    tracing::debug!("🗄️ 本地库命中 {} {}", what, key);
                }
                found
            }
            Err(e) => {
                tracing::warn!("⚠️ 本地库查询失败 {} {}: {}", what, key, e);
                None
            }
        }
    }
}

/// 与入库时一致的姓名归一化
pub fn normalize_name(name: &str) -> String {
    let collapsed = WHITESPACE.replace_all(name.trim(), " ").to_lowercase();
    NAME_PREFIX.replace(&collapsed, "").to_string()
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT 0", table))?;
    Ok(stmt.column_names().into_iter().map(str::to_string).collect())
}

fn column_value(row: &Row<'_>, columns: &[String], name: &str) -> rusqlite::Result<Value> {
    match columns.iter().position(|c| c == name) {
        Some(idx) => row.get::<_, Value>(idx),
        None => Ok(Value::Null),
    }
}

fn text(row: &Row<'_>, columns: &[String], name: &str) -> rusqlite::Result<Option<String>> {
    let value = match column_value(row, columns, name)? {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    };
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn real(row: &Row<'_>, columns: &[String], name: &str) -> rusqlite::Result<Option<f64>> {
    Ok(match column_value(row, columns, name)? {
        Value::Real(f) => Some(f),
        Value::Integer(i) => Some(i as f64),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    })
}

fn integer(row: &Row<'_>, columns: &[String], name: &str) -> rusqlite::Result<Option<i64>> {
    Ok(match column_value(row, columns, name)? {
        Value::Integer(i) => Some(i),
        Value::Real(f) => Some(f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    })
}

fn grant_from_row(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<GrantRecord> {
    Ok(GrantRecord {
        project_num: text(row, columns, "project_num")?.unwrap_or_default(),
        pi_name: text(row, columns, "pi_name")?,
        org_name: text(row, columns, "org_name")?,
        total_cost: real(row, columns, "total_cost")?,
        fiscal_year: integer(row, columns, "fiscal_year")?,
        project_title: text(row, columns, "project_title")?,
    })
}

impl EvidenceStore for SqliteStore {
    fn lookup_trial(&self, nct_id: &str) -> Option<TrialRecord> {
        self.best_effort("trial", nct_id, |conn| {
            let columns = table_columns(conn, "clinical_trials")?;
            let found = conn
                .query_row(
                    "SELECT * FROM clinical_trials WHERE nct_id = ?1 LIMIT 1",
                    params![nct_id],
                    |row| {
                        Ok(TrialRecord {
                            nct_id: text(row, &columns, "nct_id")?
                                .unwrap_or_else(|| nct_id.to_string()),
                            title: text(row, &columns, "title")?,
                            status: text(row, &columns, "status")?,
                            principal_investigator: text(row, &columns, "principal_investigator")?,
                            sponsor: text(row, &columns, "sponsor")?,
                            funded_by: text(row, &columns, "funded_by")?,
                        })
                    },
                )
                .optional()?;
            Ok(found)
        })
    }

    fn lookup_publication(&self, pmid: &str) -> Option<RetractionRecord> {
        self.best_effort("publication", pmid, |conn| {
            let columns = table_columns(conn, "retractions")?;
            let pattern = format!("%{}%", pmid);
            let map_row = |row: &Row<'_>| -> rusqlite::Result<RetractionRecord> {
                Ok(RetractionRecord {
                    pmid: text(row, &columns, "pmid")?,
                    doi: text(row, &columns, "doi")?,
                    title: text(row, &columns, "title")?,
                    journal: text(row, &columns, "journal")?,
                    retraction_date: text(row, &columns, "retraction_date")?,
                    retraction_reason: text(row, &columns, "retraction_reason")?,
                })
            };
            // 早期入库的撤稿表没有 pmid 列
            let found = if columns.iter().any(|c| c == "pmid") {
                conn.query_row(
                    "SELECT * FROM retractions WHERE pmid = ?1 OR doi LIKE ?2 LIMIT 1",
                    params![pmid, pattern],
                    map_row,
                )
                .optional()?
            } else {
                conn.query_row(
                    "SELECT * FROM retractions WHERE doi LIKE ?1 LIMIT 1",
                    params![pattern],
                    map_row,
                )
                .optional()?
            };
            Ok(found)
        })
    }

    fn lookup_grant(&self, project_num: &str) -> Option<GrantRecord> {
        self.best_effort("grant", project_num, |conn| {
            let columns = table_columns(conn, "nih_grants")?;
            let found = conn
                .query_row(
                    "SELECT * FROM nih_grants WHERE REPLACE(project_num, ' ', '') LIKE ?1 LIMIT 1",
                    params![format!("%{}%", project_num.replace(' ', ""))],
                    |row| grant_from_row(row, &columns),
                )
                .optional()?;
            Ok(found)
        })
    }

    fn lookup_actor(&self, name: &str) -> Option<GrantRecord> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }
        self.best_effort("actor", name, |conn| {
            let columns = table_columns(conn, "nih_grants")?;
            let sql = if columns.iter().any(|c| c == "pi_name_normalized") {
                "SELECT * FROM nih_grants WHERE pi_name_normalized LIKE ?1 LIMIT 1"
            } else {
                "SELECT * FROM nih_grants WHERE LOWER(pi_name) LIKE ?1 LIMIT 1"
            };
            let found = conn
                .query_row(sql, params![format!("{}%", normalized)], |row| {
                    grant_from_row(row, &columns)
                })
                .optional()?;
            Ok(found)
        })
    }
}
