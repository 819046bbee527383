//! AdmissionReview wire format (`admission.k8s.io`).

use crate::error::ProtocolError;

pub const SUPPORTED_API_VERSIONS: &[&str] = &["admission.k8s.io/v1", "admission.k8s.io/v1beta1"];
pub const KIND: &str = "AdmissionReview";

#[derive(serde::Deserialize)]
pub struct AdmissionReviewRequest {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    pub request: Request,
}

impl AdmissionReviewRequest {
    /// Decodes and validates an envelope.
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let review: Self = serde_json::from_slice(body).map_err(ProtocolError::Decode)?;
        review.validate()?;
        Ok(review)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !SUPPORTED_API_VERSIONS.contains(&self.api_version.as_str()) {
            return Err(ProtocolError::UnexpectedType {
                field: "apiVersion",
                value: self.api_version.clone(),
            });
        }
        if self.kind != KIND {
            return Err(ProtocolError::UnexpectedType {
                field: "kind",
                value: self.kind.clone(),
            });
        }
        Ok(())
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }
}

#[derive(serde::Deserialize)]
pub struct Request {
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    /// Raw pod; absent means `null`.
    #[serde(default)]
    pub object: serde_json::Value,
}

#[derive(serde::Serialize, Debug)]
pub struct AdmissionReviewResponse {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    pub response: Response,
}

impl AdmissionReviewResponse {
    pub fn wrap(api_version: &str, response: Response) -> Self {
        AdmissionReviewResponse {
            api_version: api_version.to_string(),
            kind: KIND.to_string(),
            response,
        }
    }
}

#[derive(serde::Serialize, Debug)]
pub struct Response {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub patch: Option<Patch>,
}

impl Response {
    pub fn allow(uid: String) -> Self {
        Response {
            uid,
            allowed: true,
            status: None,
            patch: None,
        }
    }

    pub fn patched(uid: String, patch: &[u8]) -> Self {
        Response {
            patch: Some(Patch {
                patch_type: "JSONPatch".to_string(),
                patch: base64::encode(patch),
            }),
            ..Response::allow(uid)
        }
    }

    pub fn deny(uid: String, message: String) -> Self {
        Response {
            uid,
            allowed: false,
            status: Some(Status { message }),
            patch: None,
        }
    }
}

#[derive(serde::Serialize, Debug)]
pub struct Status {
    pub message: String,
}

#[derive(serde::Serialize, Debug)]
pub struct Patch {
    #[serde(rename = "patchType")]
    pub patch_type: String,
    pub patch: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_envelope() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {"uid": "abc", "namespace": "default", "object": {"kind": "Pod"}},
        });
        let review = AdmissionReviewRequest::decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(review.api_version(), "admission.k8s.io/v1");
        assert_eq!(review.request.uid, "abc");
        assert_eq!(review.request.namespace, "default");
        assert_eq!(review.request.object, json!({"kind": "Pod"}));
    }

    #[test]
    fn missing_object_is_null() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1beta1",
            "kind": "AdmissionReview",
            "request": {"uid": "abc"},
        });
        let review = AdmissionReviewRequest::decode(body.to_string().as_bytes()).unwrap();
        assert!(review.request.object.is_null());
        assert_eq!(review.request.namespace, "");
    }

    #[test]
    fn reject_unknown_version_or_kind() {
        let body = json!({
            "apiVersion": "v1",
            "kind": "AdmissionReview",
            "request": {"uid": "abc"},
        });
        assert!(matches!(
            AdmissionReviewRequest::decode(body.to_string().as_bytes()),
            Err(ProtocolError::UnexpectedType { field: "apiVersion", .. })
        ));
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "Pod",
            "request": {"uid": "abc"},
        });
        assert!(matches!(
            AdmissionReviewRequest::decode(body.to_string().as_bytes()),
            Err(ProtocolError::UnexpectedType { field: "kind", .. })
        ));
        assert!(matches!(
            AdmissionReviewRequest::decode(b"{\"request\": {}}"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn response_shapes() {
        let allowed = AdmissionReviewResponse::wrap("admission.k8s.io/v1", Response::allow("u".into()));
        assert_eq!(
            serde_json::to_value(&allowed).unwrap(),
            json!({
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "response": {"uid": "u", "allowed": true},
            })
        );

        let patched = Response::patched("u".into(), b"[]");
        assert_eq!(
            serde_json::to_value(&patched).unwrap(),
            json!({"uid": "u", "allowed": true, "patchType": "JSONPatch", "patch": "W10="})
        );

        let denied = Response::deny("u".into(), "no".into());
        assert_eq!(
            serde_json::to_value(&denied).unwrap(),
            json!({"uid": "u", "allowed": false, "status": {"message": "no"}})
        );
    }
}
