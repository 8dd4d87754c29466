//! [`Conn`](crate::Conn) adapters for concrete drivers.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;
