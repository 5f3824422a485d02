use crate::models::MemberId;
use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GymError {
    #[error("el {0} es inválido: debe tener 10 dígitos y comenzar con 3")]
    InvalidPhone(&'static str),

    #[error("falta el campo obligatorio: {0}")]
    MissingField(&'static str),

    #[error("la {0} no es una fecha válida")]
    InvalidDate(&'static str),

    #[error("el monto no puede ser negativo")]
    InvalidAmount,

    #[error("usuario {0} no encontrado")]
    MemberNotFound(MemberId),

    #[error("registro de {kind} {id} no encontrado")]
    RecordNotFound { kind: &'static str, id: i64 },

    #[error("falta la hoja requerida: {0}")]
    MissingSheet(String),

    #[error("no hay respaldo disponible")]
    NoBackup,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GymError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPhone(_)
            | Self::MissingField(_)
            | Self::InvalidDate(_)
            | Self::InvalidAmount => StatusCode::BAD_REQUEST,
            Self::MemberNotFound(_) | Self::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MissingSheet(_) | Self::NoBackup => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Serialization(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GymError> for AppError {
    fn from(err: GymError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!("{err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_status() {
        let cases = [
            (GymError::InvalidPhone("teléfono"), StatusCode::BAD_REQUEST),
            (GymError::InvalidDate("fecha de pago"), StatusCode::BAD_REQUEST),
            (GymError::MemberNotFound(MemberId(4)), StatusCode::NOT_FOUND),
            (
                GymError::MissingSheet("Pagos".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[test]
    fn io_failures_are_internal() {
        let err = GymError::from(std::io::Error::other("disk full"));
        let app = AppError::from(err);
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(app.message.contains("disk full"));
    }
}
