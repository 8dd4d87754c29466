//! `tokio-postgres` adapter.
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls).await?;
//! tokio::spawn(async move { let _ = connection.await; });
//!
//! let users: Vec<User> = sqlweave::select().model::<User>().scan_all(&client).await?;
//! ```

use crate::client::Conn;
use crate::dialect::{Dialect, PgDialect};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            // JSON arrives as already-encoded text.
            Value::Text(s) => match *ty {
                Type::JSON => {
                    out.put_slice(s.as_bytes());
                    Ok(IsNull::No)
                }
                Type::JSONB => {
                    out.put_u8(1);
                    out.put_slice(s.as_bytes());
                    Ok(IsNull::No)
                }
                Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
                Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Json(j) => j.to_sql(ty, out),
            Value::Timestamp(t) => match *ty {
                Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
                Type::DATE => t.date_naive().to_sql(ty, out),
                _ => t.to_sql(ty, out),
            },
            Value::Uuid(u) => u.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn convert_rows(rows: Vec<tokio_postgres::Row>) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| pg_value(row, idx))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}

fn pg_value(row: &tokio_postgres::Row, idx: usize) -> OrmResult<Value> {
    let column = &row.columns()[idx];
    let decode = |e: tokio_postgres::Error| OrmError::decode(column.name(), e.to_string());

    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(decode)?.map(Value::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(decode)?
            .map(|v| Value::Int(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(decode)?
            .map(|v| Value::Int(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(decode)?.map(Value::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map_err(decode)?
            .map(|v| Value::Int(v.into())),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(decode)?
            .map(|v| Value::Float(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(decode)?.map(Value::Float),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(decode)?.map(Value::Bytes),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(decode)?
            .map(Value::Json),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(decode)?
            .map(Value::Timestamp),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(decode)?
            .map(|t| Value::Timestamp(t.and_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(decode)?
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string())),
        Type::UUID => row.try_get::<_, Option<uuid::Uuid>>(idx).map_err(decode)?.map(Value::Uuid),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|_| {
                OrmError::decode(
                    column.name(),
                    format!("unsupported column type {}", column.type_()),
                )
            })?
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

macro_rules! impl_pg_conn {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Conn for $ty {
                fn dialect(&self) -> &dyn Dialect {
                    &PgDialect
                }

                fn query(
                    &self,
                    sql: &str,
                    params: &[Value],
                ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
                    async move {
                        let refs = param_refs(params);
                        let rows = <$ty>::query(self, sql, &refs)
                            .await
                            .map_err(OrmError::from_db_error)?;
                        convert_rows(rows)
                    }
                }

                fn execute(
                    &self,
                    sql: &str,
                    params: &[Value],
                ) -> impl Future<Output = OrmResult<u64>> + Send {
                    async move {
                        let refs = param_refs(params);
                        <$ty>::execute(self, sql, &refs)
                            .await
                            .map_err(OrmError::from_db_error)
                    }
                }

                fn batch_execute(&self, sql: &str) -> impl Future<Output = OrmResult<()>> + Send {
                    async move {
                        <$ty>::batch_execute(self, sql)
                            .await
                            .map_err(OrmError::from_db_error)
                    }
                }
            }
        )*
    };
}

impl_pg_conn!(tokio_postgres::Client, tokio_postgres::Transaction<'_>);
