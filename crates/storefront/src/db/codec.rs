//! JSON text codec for structured columns.
//!
//! Orders keep the customer details and the cart snapshot in TEXT columns.
//! An absent value is written as `{}` and `NULL`/empty text reads back as the
//! type's default, so old rows with missing blobs still load.

use serde::Serialize;
use serde::de::DeserializeOwned;

const EMPTY_OBJECT: &str = "{}";

/// Encode a value for a JSON text column.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode<T: Serialize>(value: Option<&T>) -> Result<String, serde_json::Error> {
    value.map_or_else(|| Ok(EMPTY_OBJECT.to_owned()), serde_json::to_string)
}

/// Decode a JSON text column.
///
/// # Errors
///
/// Returns an error if the text is present but is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned + Default>(text: Option<&str>) -> Result<T, serde_json::Error> {
    match text.map(str::trim) {
        None | Some("" | "null") => Ok(T::default()),
        Some(text) => serde_json::from_str(text),
    }
}
