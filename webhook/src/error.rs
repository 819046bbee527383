use rocket::http::Status;

/// A problem with the annotations describing the sidecar.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("Annotation '{0}' not found")]
    Missing(&'static str),
    #[error("annotation '{key}': parsing {value:?}: invalid boolean syntax")]
    InvalidBool { key: String, value: String },
    #[error("annotation '{key}': parsing {value:?}: {source}")]
    InvalidInt {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },
    #[error("annotation '{key}' has no name after its prefix")]
    EmptyName { key: String },
    #[error("annotation '{key}': invalid volume mount: {source}")]
    InvalidVolumeMount {
        key: String,
        source: serde_json::Error,
    },
    #[error("annotation '{key}': volume source must be a json object: {source}")]
    InvalidVolumeSource {
        key: String,
        source: serde_json::Error,
    },
}

/// Reasons to deny an admission request. The display text is what the
/// cluster operator sees in the pod's events.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("{0}")]
    PodDecode(#[source] serde_json::Error),
    #[error("error checking if a container should be injected: {0}")]
    InjectCheck(#[source] AnnotationError),
    #[error("error with request namespace: cannot inject into system namespaces: {0}")]
    NamespaceDenied(String),
    #[error(transparent)]
    Sidecar(#[from] AnnotationError),
    #[error("error serializing patch: {0}")]
    PatchSerialization(#[source] serde_json::Error),
}

/// Failures that prevent producing an AdmissionReview at all. They are
/// answered with a plain HTTP error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid content-type: {0}")]
    ContentType(String),
    #[error("Error reading request body: {0}")]
    ReadBody(#[source] std::io::Error),
    #[error("Error reading request body: exceeds {0}")]
    BodyTooLarge(rocket::data::ByteUnit),
    #[error("Empty request body")]
    EmptyBody,
    #[error("Error decoding admission request: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Error decoding admission request: unexpected {field} {value:?}")]
    UnexpectedType { field: &'static str, value: String },
}

impl ProtocolError {
    pub fn status(&self) -> Status {
        match self {
            ProtocolError::ContentType(_)
            | ProtocolError::ReadBody(_)
            | ProtocolError::BodyTooLarge(_)
            | ProtocolError::EmptyBody => Status::BadRequest,
            ProtocolError::Decode(_) | ProtocolError::UnexpectedType { .. } => {
                Status::InternalServerError
            }
        }
    }
}

impl<'r, 'o: 'r> rocket::response::Responder<'r, 'o> for ProtocolError {
    fn respond_to(self, request: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        tracing::error!(error = %self, "rejecting admission request");
        rocket::response::status::Custom(self.status(), self.to_string()).respond_to(request)
    }
}
