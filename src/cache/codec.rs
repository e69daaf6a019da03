// Cache value serialization using MessagePack
//
// Values stored through the facade are wrapped in a versioned envelope and
// written with named fields, so the payload is self-describing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::CacheError;

/// Serialization format version for schema evolution
const SERIALIZATION_VERSION: u8 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    version: u8,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u8,
    value: T,
}

/// Encodes a value to MessagePack bytes with a version marker
///
/// # Errors
/// Returns CacheError::Serialization if the value cannot be represented
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    let envelope = EnvelopeRef {
        version: SERIALIZATION_VERSION,
        value,
    };
    Ok(rmp_serde::to_vec_named(&envelope)?)
}

/// Decodes MessagePack bytes produced by [`encode`] into `T`
///
/// # Errors
/// Returns CacheError::Serialization if:
/// - Data is corrupt or truncated
/// - Version is unsupported
/// - The payload does not match the shape of `T`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    let envelope: Envelope<T> = rmp_serde::from_slice(bytes)?;

    if envelope.version != SERIALIZATION_VERSION {
        return Err(CacheError::Serialization(format!(
            "Unsupported schema version: {} (expected: {})",
            envelope.version, SERIALIZATION_VERSION
        )));
    }

    Ok(envelope.value)
}
