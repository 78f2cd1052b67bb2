use thiserror::Error;

/// Errors raised while registering types, serializing values or
/// reconstructing them from IR.
///
/// Every error aborts the whole call that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("there is already a registered type called {0}")]
    DuplicateRegistration(String),

    #[error("type name {0} is reserved")]
    ReservedTypeName(String),

    #[error("tried to serialize a function")]
    UnserializableValue,

    #[error("missing type name")]
    MissingTypeName,

    #[error("unknown type encountered: {0}")]
    UnknownType(String),

    #[error("got a raw object (missing cName); only tagged IR objects can be deserialized")]
    RawObjectWithoutTag,

    #[error("nesting exceeds the depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    #[error("invalid IR: {0}")]
    InvalidIr(String),

    #[error("field {0} is read-only")]
    ReadOnlyField(String),

    #[error("field {0} cannot be redefined")]
    FieldNotRedefinable(String),

    #[error("{type_name} has no method {method}")]
    NoSuchMethod { type_name: String, method: String },

    #[error("{0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
