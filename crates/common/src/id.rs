//! Identifiers: row keys and request codes.

use chrono::{DateTime, Utc};
use ulid::Ulid;

/// Length of the random tail of a request code.
const REQUEST_CODE_SUFFIX: usize = 8;

/// ID generator for entities.
///
/// Row keys are lower-case ULIDs, so they sort by creation time.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new row key.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate the human-readable code of a permit request.
    ///
    /// Format: `PRM-YYYYMMDD-XXXXXXXX`, the suffix being the random tail of a
    /// ULID in Crockford base32.
    #[must_use]
    pub fn generate_request_code(&self, submitted_at: DateTime<Utc>) -> String {
        let ulid = Ulid::new().to_string();
        let suffix = &ulid[ulid.len() - REQUEST_CODE_SUFFIX..];
        format!("PRM-{}-{suffix}", submitted_at.format("%Y%m%d"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_keys_are_lowercase_ulids() {
        let id_gen = IdGenerator::new();
        let id = id_gen.generate();

        assert_eq!(id.len(), 26);
        assert_eq!(id, id.to_lowercase());
        assert!(Ulid::from_string(&id.to_uppercase()).is_ok());
        assert_ne!(id, id_gen.generate());
    }

    #[test]
    fn test_generate_request_code() {
        let id_gen = IdGenerator::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let code = id_gen.generate_request_code(at);

        let suffix = code.strip_prefix("PRM-20260314-").unwrap();
        assert_eq!(suffix.len(), REQUEST_CODE_SUFFIX);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(code, id_gen.generate_request_code(at));
    }
}
