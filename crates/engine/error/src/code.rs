#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Malformed or missing query, or a persisted query hash that does not match its body.
    BadRequest,
    InternalServerError,
    // Used for APQ
    PersistedQueryNotFound,
    PersistedQueryNotSupported,
    // Operation preparation phases
    OperationParsingError,
    OperationValidationError,
    OperationResolutionError,
    // Raised by a plugin
    ExtensionError,
}

impl From<ErrorCode> for http::StatusCode {
    fn from(code: ErrorCode) -> http::StatusCode {
        code.into_http_status_code_with_priority().0
    }
}

impl ErrorCode {
    /// HTTP status for this error together with a priority used to pick one status when a
    /// response carries several errors. Higher wins.
    pub fn into_http_status_code_with_priority(self) -> (http::StatusCode, usize) {
        match self {
            ErrorCode::OperationParsingError
            | ErrorCode::OperationValidationError
            | ErrorCode::OperationResolutionError
            | ErrorCode::PersistedQueryNotFound
            | ErrorCode::PersistedQueryNotSupported
            | ErrorCode::BadRequest => (http::StatusCode::BAD_REQUEST, 1000),
            // least helpful error codes
            ErrorCode::ExtensionError | ErrorCode::InternalServerError => (http::StatusCode::INTERNAL_SERVER_ERROR, 0),
        }
    }
}
