use crate::{
    admit::Injector,
    error::ProtocolError,
    typings::{AdmissionReviewRequest, AdmissionReviewResponse},
};
use rocket::{
    data::{ByteUnit, Data, ToByteUnit},
    http::Status,
    request::{self, FromRequest},
    serde::json::Json,
    Build, Rocket, State,
};

fn body_limit() -> ByteUnit {
    2.mebibytes()
}

/// Assembles the webhook application. `config` is any figment provider,
/// usually [`rocket::Config::figment`] merged with command line settings.
pub fn build<T: rocket::figment::Provider>(config: T, injector: Injector) -> Rocket<Build> {
    rocket::custom(config)
        .manage(injector)
        .mount("/", rocket::routes![health, mutate])
}

#[rocket::get("/health")]
fn health() -> Status {
    Status::NoContent
}

/// The `Content-Type` header exactly as sent.
struct RawContentType<'r>(Option<&'r str>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RawContentType<'r> {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r rocket::Request<'_>) -> request::Outcome<Self, Self::Error> {
        request::Outcome::Success(RawContentType(req.headers().get_one("Content-Type")))
    }
}

fn is_json(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case("application/json")
}

/// Admission verdicts, denials included, are answered with 200. Only
/// requests that are not AdmissionReviews get an HTTP error.
#[rocket::post("/mutate", data = "<data>")]
async fn mutate(
    content_type: RawContentType<'_>,
    data: Data<'_>,
    injector: &State<Injector>,
) -> Result<Json<AdmissionReviewResponse>, ProtocolError> {
    let content_type = content_type.0.unwrap_or_default();
    if !is_json(content_type) {
        return Err(ProtocolError::ContentType(content_type.to_string()));
    }

    let body = data
        .open(body_limit())
        .into_bytes()
        .await
        .map_err(ProtocolError::ReadBody)?;
    if !body.is_complete() {
        return Err(ProtocolError::BodyTooLarge(body_limit()));
    }
    let body = body.into_inner();
    if body.is_empty() {
        return Err(ProtocolError::EmptyBody);
    }

    let review = AdmissionReviewRequest::decode(&body)?;
    tracing::debug!(
        uid = %review.request.uid,
        namespace = %review.request.namespace,
        "received admission review"
    );
    let response = injector.review(&review.request);
    Ok(Json(AdmissionReviewResponse::wrap(
        review.api_version(),
        response,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations as ann;
    use rocket::{
        http::{ContentType, Header},
        local::blocking::Client,
    };
    use serde_json::{json, Value};

    fn client() -> Client {
        Client::tracked(build(rocket::Config::debug_default(), Injector::default()))
            .expect("valid rocket instance")
    }

    fn review(namespace: &str, annotations: Value) -> String {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "e911857d-c318-11e8-bbad-025000000001",
                "namespace": namespace,
                "object": {
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"annotations": annotations},
                    "spec": {"containers": [{"name": "web"}]},
                },
            },
        })
        .to_string()
    }

    #[test]
    fn readiness() {
        let client = client();
        let resp = client.get("/health").dispatch();
        assert_eq!(resp.status(), Status::NoContent);
    }

    #[test]
    fn wrong_content_type() {
        let client = client();
        let resp = client
            .post("/mutate")
            .header(Header::new("Content-Type", "text/plain"))
            .body(review("default", json!({})))
            .dispatch();
        assert_eq!(resp.status(), Status::BadRequest);
        assert_eq!(
            resp.into_string().unwrap(),
            "invalid content-type: text/plain"
        );

        let resp = client.post("/mutate").body("{}").dispatch();
        assert_eq!(resp.status(), Status::BadRequest);
        assert_eq!(resp.into_string().unwrap(), "invalid content-type: ");
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        let client = client();
        let resp = client
            .post("/mutate")
            .header(Header::new("Content-Type", "application/json; charset=utf-8"))
            .body(review("default", json!({})))
            .dispatch();
        assert_eq!(resp.status(), Status::Ok);
    }

    #[test]
    fn empty_body() {
        let client = client();
        let resp = client.post("/mutate").header(ContentType::JSON).dispatch();
        assert_eq!(resp.status(), Status::BadRequest);
        assert_eq!(resp.into_string().unwrap(), "Empty request body");

        let resp = client
            .post("/mutate")
            .header(Header::new("Content-Type", "text/html"))
            .dispatch();
        assert_eq!(resp.status(), Status::BadRequest);
    }

    #[test]
    fn malformed_envelope() {
        let client = client();
        let body = json!({
            "request": {"uid": "x", "namespace": "kube-system", "object": {}},
        });
        let resp = client
            .post("/mutate")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(resp.status(), Status::InternalServerError);
        assert!(resp
            .into_string()
            .unwrap()
            .starts_with("Error decoding admission request: "));

        let resp = client
            .post("/mutate")
            .header(ContentType::JSON)
            .body("not json")
            .dispatch();
        assert_eq!(resp.status(), Status::InternalServerError);
    }

    #[test]
    fn denial_is_still_ok() {
        let client = client();
        let resp = client
            .post("/mutate")
            .header(ContentType::JSON)
            .body(review("kube-system", json!({ "container-injector.uthng.me/inject": "true" })))
            .dispatch();
        assert_eq!(resp.status(), Status::Ok);
        let body: Value = resp.into_json().unwrap();
        assert_eq!(body["apiVersion"], "admission.k8s.io/v1");
        assert_eq!(body["kind"], "AdmissionReview");
        assert_eq!(body["response"]["uid"], "e911857d-c318-11e8-bbad-025000000001");
        assert_eq!(body["response"]["allowed"], false);
        assert_eq!(
            body["response"]["status"]["message"],
            "error with request namespace: cannot inject into system namespaces: kube-system"
        );
        assert!(body["response"].get("patch").is_none());
    }

    #[test]
    fn injection_round_trip() {
        let client = client();
        let mut anns = serde_json::Map::new();
        anns.insert(ann::INJECT.into(), "true".into());
        anns.insert(ann::NAME.into(), "curl-ssl".into());
        anns.insert(ann::IMAGE.into(), "govermentpaas/curl-ssl".into());
        let resp = client
            .post("/mutate")
            .header(ContentType::JSON)
            .body(review("container-injector", Value::Object(anns)))
            .dispatch();
        assert_eq!(resp.status(), Status::Ok);
        let body: Value = resp.into_json().unwrap();
        assert_eq!(body["response"]["allowed"], true);
        assert_eq!(body["response"]["patchType"], "JSONPatch");
        let patch = base64::decode(body["response"]["patch"].as_str().unwrap()).unwrap();
        let patch: Value = serde_json::from_slice(&patch).unwrap();
        assert_eq!(
            patch,
            json!([{
                "op": "add",
                "path": "/spec/containers/-",
                "value": {"name": "curl-ssl", "image": "govermentpaas/curl-ssl", "resources": {}},
            }])
        );
    }

    #[test]
    fn oversized_body() {
        let client = client();
        let resp = client
            .post("/mutate")
            .header(ContentType::JSON)
            .body(vec![b' '; 3 * 1024 * 1024])
            .dispatch();
        assert_eq!(resp.status(), Status::BadRequest);
    }

    #[test]
    fn only_post_mutates() {
        let client = client();
        assert_eq!(client.get("/mutate").dispatch().status(), Status::NotFound);
    }
}
