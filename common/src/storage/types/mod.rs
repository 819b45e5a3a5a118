use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod item;
pub mod price_history;
pub mod system_settings;

/// Marker for structs persisted as a SurrealDB table.
pub trait StoredObject: Serialize + for<'de> Deserialize<'de> {
    fn table_name() -> &'static str;
}

/// Bridges `chrono` timestamps to native SurrealDB datetimes so range
/// queries and `ORDER BY timestamp` behave as datetime operations rather
/// than string comparisons.
pub fn serialize_datetime<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    Into::<surrealdb::sql::Datetime>::into(*date).serialize(serializer)
}

pub fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let dt = surrealdb::sql::Datetime::deserialize(deserializer)?;
    Ok(DateTime::<Utc>::from(dt))
}

/// Reads a record id back from the `Thing` SurrealDB returns it as,
/// yielding the bare key string the code originally assigned.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let thing = surrealdb::sql::Thing::deserialize(deserializer)?;
    Ok(thing.id.to_raw())
}

pub fn serialize_option_datetime<S>(
    date: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match date {
        Some(dt) => serializer.serialize_some(&Into::<surrealdb::sql::Datetime>::into(*dt)),
        None => serializer.serialize_none(),
    }
}
