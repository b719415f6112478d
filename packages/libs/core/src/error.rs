//! 공통 에러 타입
//!
//! 엔진 전체(컴파일러, 값 변환, 실행기, 디스패처)에서 사용되는 에러 타입을 정의합니다.
//! 모든 에러는 응답 envelope의 `error_code`/`error_msg`로 변환됩니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 에러 분류
///
/// 응답 envelope와 transport 상태 코드는 이 분류만으로 결정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 잘못된 입력 (400)
    BadInput,
    /// 인증되지 않은 호출 (401)
    NotAuthenticated,
    /// 컴파일/변환/DB 실패 (500)
    Internal,
}

/// 엔진 공통 에러
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Request Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("not authenticated")]
    NotAuthenticated,

    // ─────────────────────────────────────────────────────────────────────────────
    // Compiler Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("invalid field: {field}")]
    InvalidField { field: String },

    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },

    #[error("unknown condition type: {cond_type}")]
    UnknownConditionType { cond_type: String },

    #[error("condition group '{group}' has no sub-conditions")]
    EmptyConditionGroup { group: String },

    #[error("invalid data type: {type_name}")]
    InvalidDataType { type_name: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Coercion Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("unsupported conversion for field '{field}': {from} -> {to}")]
    UnsupportedConversion {
        field: String,
        from: String,
        to: String,
    },

    #[error("value out of range for field '{field}' ({target}): {value}")]
    OutOfRange {
        field: String,
        target: String,
        value: String,
    },

    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("field not found in type map: {field}")]
    FieldNotFound { field: String },

    #[error("database error: {message}")]
    Database { message: String },
}

impl Error {
    /// 잘못된 요청 에러 생성
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// 허용되지 않은 필드 에러 생성
    pub fn invalid_field(field: impl Into<String>) -> Self {
        Error::InvalidField {
            field: field.into(),
        }
    }

    /// DB 에러 생성
    pub fn database(message: impl Into<String>) -> Self {
        Error::Database {
            message: message.into(),
        }
    }

    pub fn unsupported_conversion(
        field: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Error::UnsupportedConversion {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn out_of_range(
        field: impl Into<String>,
        target: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Error::OutOfRange {
            field: field.into(),
            target: target.into(),
            value: value.to_string(),
        }
    }

    /// 에러 분류
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::BadRequest { .. } => ErrorClass::BadInput,
            Error::NotAuthenticated => ErrorClass::NotAuthenticated,
            _ => ErrorClass::Internal,
        }
    }

    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self.class() {
            // 400 Bad Request
            ErrorClass::BadInput => 400,

            // 401 Unauthorized
            ErrorClass::NotAuthenticated => 401,

            // 500 Internal Server Error
            ErrorClass::Internal => 500,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest { .. } => "BAD_REQUEST",
            Error::NotAuthenticated => "NOT_AUTHENTICATED",
            Error::InvalidField { .. } => "INVALID_FIELD",
            Error::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            Error::UnknownConditionType { .. } => "UNKNOWN_CONDITION_TYPE",
            Error::EmptyConditionGroup { .. } => "EMPTY_CONDITION_GROUP",
            Error::InvalidDataType { .. } => "INVALID_DATA_TYPE",
            Error::UnsupportedConversion { .. } => "UNSUPPORTED_CONVERSION",
            Error::OutOfRange { .. } => "OUT_OF_RANGE",
            Error::MissingRequiredField { .. } => "MISSING_REQUIRED_FIELD",
            Error::FieldNotFound { .. } => "FIELD_NOT_FOUND",
            Error::Database { .. } => "DATABASE_ERROR",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::bad_request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(Error::bad_request("x").status_code(), 400);
        assert_eq!(Error::NotAuthenticated.status_code(), 401);
        assert_eq!(Error::invalid_field("secret").status_code(), 500);
        assert_eq!(
            Error::out_of_range("age", "int16", 70000).status_code(),
            500
        );
        assert_eq!(Error::database("boom").status_code(), 500);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::invalid_field("a").code(), "INVALID_FIELD");
        assert_eq!(
            Error::MissingRequiredField {
                field: "email".to_string()
            }
            .code(),
            "MISSING_REQUIRED_FIELD"
        );
        assert_eq!(Error::NotAuthenticated.code(), "NOT_AUTHENTICATED");
    }

    #[test]
    fn test_json_error_is_bad_input() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.class(), ErrorClass::BadInput);
    }
}
