use crate::{
    annotations::{self as ann, Annotations},
    error::{AnnotationError, MutationError},
    sidecar::SidecarSpec,
    typings::{Request, Response},
};
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize as _;
use std::collections::BTreeSet;

pub const DEFAULT_EXCLUDED_NAMESPACES: &[&str] = &["kube-system", "kube-public"];

/// Decides whether a pod gets a sidecar and computes the patch adding it.
/// Holds no per-request state.
#[derive(Debug, Clone)]
pub struct Injector {
    excluded_namespaces: BTreeSet<String>,
}

impl Default for Injector {
    fn default() -> Self {
        Injector::new(DEFAULT_EXCLUDED_NAMESPACES.iter().map(|ns| ns.to_string()))
    }
}

impl Injector {
    pub fn new(excluded_namespaces: impl IntoIterator<Item = String>) -> Self {
        Injector {
            excluded_namespaces: excluded_namespaces.into_iter().collect(),
        }
    }

    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.excluded_namespaces.contains(namespace)
    }

    /// Always produces a response carrying the request's uid.
    pub fn review(&self, request: &Request) -> Response {
        let uid = request.uid.clone();
        match self.mutate(request) {
            Ok(Some(patch)) => {
                tracing::info!(uid = %uid, namespace = %request.namespace, "injecting sidecar");
                Response::patched(uid, &patch)
            }
            Ok(None) => Response::allow(uid),
            Err(e) => {
                tracing::warn!(uid = %uid, namespace = %request.namespace, error = %e, "denying admission");
                Response::deny(uid, e.to_string())
            }
        }
    }

    fn mutate(&self, request: &Request) -> Result<Option<Vec<u8>>, MutationError> {
        let pod = Pod::deserialize(&request.object).map_err(|e| {
            tracing::debug!(object = %request.object, "could not decode pod");
            MutationError::PodDecode(e)
        })?;
        let empty = Annotations::new();
        let anns = pod.metadata.annotations.as_ref().unwrap_or(&empty);

        tracing::debug!("checking if a container should be injected");
        if !should_inject(anns).map_err(MutationError::InjectCheck)? {
            return Ok(None);
        }

        tracing::debug!("checking namespace");
        if self.is_excluded(&request.namespace) {
            return Err(MutationError::NamespaceDenied(request.namespace.clone()));
        }

        let spec = SidecarSpec::from_annotations(anns)?;
        tracing::info!(
            name = %spec.name,
            image = %spec.image,
            init_container = spec.init_container,
            tls_secret = spec.tls_secret.as_deref().unwrap_or_default(),
            configmap = spec.configmap.as_deref().unwrap_or_default(),
            "built sidecar"
        );

        let ops = spec
            .patch(&pod)
            .map_err(MutationError::PatchSerialization)?;
        let patch = serde_json::to_vec(&json_patch::Patch(ops))
            .map_err(MutationError::PatchSerialization)?;
        Ok(Some(patch))
    }
}

/// Whether the pod asks for a sidecar it does not have yet.
///
/// A missing `inject` annotation means no. A pod whose status annotation is
/// `injected` is left alone; changing the status forces a new injection.
pub fn should_inject(anns: &Annotations) -> Result<bool, AnnotationError> {
    if !ann::get_bool(anns, ann::INJECT)?.unwrap_or(false) {
        return Ok(false);
    }
    Ok(anns.get(ann::STATUS).map(String::as_str) != Some(ann::STATUS_INJECTED))
}
