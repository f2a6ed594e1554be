// Structured-text (JSON) encoding of application values stored in slots.
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::error::{Error, ErrorKind};

/// Encode a value into the compact text form that is persisted.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message("value is not representable as JSON")
            .with_source(err)
    })
}

/// Encode with object keys sorted, so values that are equal as JSON compare
/// equal as text regardless of in-memory map ordering.
pub fn canonical<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    let tree = serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message("value is not representable as JSON")
            .with_source(err)
    })?;
    encode(&tree)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("stored value does not decode")
            .with_source(err)
    })
}
