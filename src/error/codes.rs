/// Error code registry for the randomizer
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Session errors
/// - 3000-3999: Persistence errors
/// - 4000-4999: Request / constraint errors
/// - 5000-5999: Transient I/O errors (fetching)
/// - 6000-6999: Map validation errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_MISSING_GAME_DIRECTORY: u16 = 1003;
    pub const CONFIG_INVALID_RULES: u16 = 1004;
    pub const CONFIG_INVALID_PRESET: u16 = 1005;

    // Session errors (2000-2999)
    pub const SESSION_GENERIC: u16 = 2000;
    pub const SESSION_SKIP_BUDGET_EXHAUSTED: u16 = 2001;
    pub const SESSION_NO_CURRENT_MAP: u16 = 2002;
    pub const SESSION_INVALID_TRANSITION: u16 = 2003;
    pub const SESSION_NOT_RUNNING: u16 = 2004;

    // Persistence errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 3002;
    pub const STORAGE_NOT_FOUND: u16 = 3003;

    // Request / constraint errors (4000-4999)
    pub const REQUEST_GENERIC: u16 = 4000;
    pub const REQUEST_NO_COMPATIBLE_SITE: u16 = 4001;
    pub const REQUEST_INVALID_URL: u16 = 4002;

    // Transient I/O errors (5000-5999)
    pub const FETCH_GENERIC: u16 = 5000;
    pub const FETCH_TRANSIENT: u16 = 5001;
    pub const FETCH_PERMANENT: u16 = 5002;

    // Map validation errors (6000-6999)
    pub const VALIDATION_GENERIC: u16 = 6000;
    pub const VALIDATION_CORRUPT: u16 = 6001;
    pub const VALIDATION_REJECTED: u16 = 6002;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description of an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_YAML => "Invalid YAML in configuration",
        ErrorCode::CONFIG_MISSING_GAME_DIRECTORY => "Game directory is not configured",
        ErrorCode::CONFIG_INVALID_RULES => "Rule set failed validation",
        ErrorCode::CONFIG_INVALID_PRESET => "Preset could not be used",

        ErrorCode::SESSION_GENERIC => "General session error",
        ErrorCode::SESSION_SKIP_BUDGET_EXHAUSTED => "Skip budget exhausted",
        ErrorCode::SESSION_NO_CURRENT_MAP => "No map is currently being played",
        ErrorCode::SESSION_INVALID_TRANSITION => "Invalid session state transition",
        ErrorCode::SESSION_NOT_RUNNING => "No session is running",

        ErrorCode::STORAGE_GENERIC => "General persistence error",
        ErrorCode::STORAGE_IO_ERROR => "I/O error while persisting session data",
        ErrorCode::STORAGE_SERIALIZATION_ERROR => "Failed to serialize session data",
        ErrorCode::STORAGE_NOT_FOUND => "Stored item not found",

        ErrorCode::REQUEST_GENERIC => "General request error",
        ErrorCode::REQUEST_NO_COMPATIBLE_SITE => "No site variant satisfies the rules",
        ErrorCode::REQUEST_INVALID_URL => "Request URL could not be built",

        ErrorCode::FETCH_GENERIC => "General fetch error",
        ErrorCode::FETCH_TRANSIENT => "Temporary network failure",
        ErrorCode::FETCH_PERMANENT => "Map could not be downloaded",

        ErrorCode::VALIDATION_GENERIC => "General map validation error",
        ErrorCode::VALIDATION_CORRUPT => "Downloaded map is corrupt",
        ErrorCode::VALIDATION_REJECTED => "Downloaded map does not satisfy the rules",

        ErrorCode::OTHER_GENERIC => "Unknown error",
        _ => "Unrecognized error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_have_descriptions() {
        assert_eq!(
            describe_error_code(ErrorCode::REQUEST_NO_COMPATIBLE_SITE),
            "No site variant satisfies the rules"
        );
        assert_eq!(
            describe_error_code(ErrorCode::SESSION_SKIP_BUDGET_EXHAUSTED),
            "Skip budget exhausted"
        );
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(describe_error_code(12345), "Unrecognized error code");
    }
}
