use crate::{
    annotations::{self as ann, Annotations},
    error::AnnotationError,
    patch,
};
use json_patch::PatchOperation;
use k8s_openapi::{
    api::core::v1::{
        Container, EnvVar, Pod, ResourceRequirements, SecurityContext, Volume, VolumeMount,
    },
    apimachinery::pkg::api::resource::Quantity,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sidecar container described by a pod's annotations.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SidecarSpec {
    pub inject: bool,
    pub name: String,
    pub image: String,
    /// Used as a single argv element, never split.
    pub command: Option<String>,
    pub args: Option<String>,
    pub init_container: bool,
    pub init_first: bool,
    pub pull_policy: Option<String>,
    pub limits_cpu: Option<String>,
    pub limits_mem: Option<String>,
    pub requests_cpu: Option<String>,
    pub requests_mem: Option<String>,
    pub run_as_user: Option<i64>,
    pub run_as_group: Option<i64>,
    pub tls_secret: Option<String>,
    pub configmap: Option<String>,
    pub env: Vec<EnvVar>,
    pub volume_mounts: Vec<VolumeMount>,
    /// Pod volumes the sidecar needs.
    pub volumes: Vec<Volume>,
}

fn owned(v: Option<&str>) -> Option<String> {
    v.map(str::to_string)
}

impl SidecarSpec {
    pub fn from_annotations(anns: &Annotations) -> Result<Self, AnnotationError> {
        let inject = ann::get_bool(anns, ann::INJECT)?
            .ok_or(AnnotationError::Missing(ann::INJECT))?;
        let name = ann::get_str(anns, ann::NAME).ok_or(AnnotationError::Missing(ann::NAME))?;
        let image = ann::get_str(anns, ann::IMAGE).ok_or(AnnotationError::Missing(ann::IMAGE))?;

        let env: Vec<EnvVar> = ann::family(anns, ann::ENV)
            .map(|item| -> Result<EnvVar, AnnotationError> {
                let (name, value) = item?;
                Ok(EnvVar {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                    ..Default::default()
                })
            })
            .collect::<Result<_, _>>()?;
        let volume_mounts: Vec<VolumeMount> = ann::family(anns, ann::VOLUME_MOUNT)
            .map(|item| -> Result<VolumeMount, AnnotationError> {
                let (name, value) = item?;
                volume_mount(name, value)
            })
            .collect::<Result<_, _>>()?;
        let volumes: Vec<Volume> = ann::family(anns, ann::VOLUME_SOURCE)
            .map(|item| -> Result<Volume, AnnotationError> {
                let (name, value) = item?;
                volume_source(name, value)
            })
            .collect::<Result<_, _>>()?;

        Ok(SidecarSpec {
            inject,
            name: name.to_string(),
            image: image.to_string(),
            command: owned(ann::get_str(anns, ann::COMMAND)),
            args: owned(ann::get_str(anns, ann::ARGS)),
            init_container: ann::get_bool(anns, ann::INIT_CONTAINER)?.unwrap_or(false),
            init_first: ann::get_bool(anns, ann::INIT_FIRST)?.unwrap_or(false),
            pull_policy: owned(ann::get_str(anns, ann::PULL_POLICY)),
            limits_cpu: owned(ann::get_str(anns, ann::LIMITS_CPU)),
            limits_mem: owned(ann::get_str(anns, ann::LIMITS_MEM)),
            requests_cpu: owned(ann::get_str(anns, ann::REQUESTS_CPU)),
            requests_mem: owned(ann::get_str(anns, ann::REQUESTS_MEM)),
            run_as_user: ann::get_i64(anns, ann::RUN_AS_USER)?,
            run_as_group: ann::get_i64(anns, ann::RUN_AS_GROUP)?,
            tls_secret: owned(ann::get_str(anns, ann::TLS_SECRET)),
            configmap: owned(ann::get_str(anns, ann::CONFIGMAP)),
            env,
            volume_mounts,
            volumes,
        })
    }

    pub fn container(&self) -> Container {
        Container {
            name: self.name.clone(),
            image: Some(self.image.clone()),
            image_pull_policy: self.pull_policy.clone(),
            command: self.command.clone().map(|c| vec![c]),
            args: self.args.clone().map(|a| vec![a]),
            env: non_empty(&self.env),
            volume_mounts: non_empty(&self.volume_mounts),
            resources: Some(self.resources()),
            security_context: self.security_context(),
            ..Default::default()
        }
    }

    fn resources(&self) -> ResourceRequirements {
        ResourceRequirements {
            limits: quantities(&self.limits_cpu, &self.limits_mem),
            requests: quantities(&self.requests_cpu, &self.requests_mem),
            ..Default::default()
        }
    }

    fn security_context(&self) -> Option<SecurityContext> {
        if self.run_as_user.is_none() && self.run_as_group.is_none() {
            return None;
        }
        let non_root = match (self.run_as_user, self.run_as_group) {
            (Some(user), Some(group)) if user != 0 && group != 0 => Some(true),
            _ => None,
        };
        Some(SecurityContext {
            run_as_user: self.run_as_user,
            run_as_group: self.run_as_group,
            run_as_non_root: non_root,
            ..Default::default()
        })
    }

    /// Operations adding the sidecar's volumes, then the sidecar itself, to
    /// `pod`.
    pub fn patch(&self, pod: &Pod) -> Result<Vec<PatchOperation>, serde_json::Error> {
        let spec = pod.spec.as_ref();
        let volumes = spec.and_then(|s| s.volumes.as_deref()).unwrap_or_default();
        let mut ops = patch::add_volumes(volumes, &self.volumes, "/spec/volumes")?;

        let (target, base) = if self.init_container {
            (
                spec.and_then(|s| s.init_containers.as_deref())
                    .unwrap_or_default(),
                "/spec/initContainers",
            )
        } else {
            (
                spec.map(|s| s.containers.as_slice()).unwrap_or_default(),
                "/spec/containers",
            )
        };
        let container = [self.container()];
        if self.init_first {
            ops.extend(patch::prepend_containers(target, &container, base)?);
        } else {
            ops.extend(patch::add_containers(target, &container, base)?);
        }
        Ok(ops)
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

fn quantities(cpu: &Option<String>, mem: &Option<String>) -> Option<BTreeMap<String, Quantity>> {
    let map: BTreeMap<String, Quantity> = [("cpu", cpu), ("memory", mem)]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), Quantity(v))))
        .collect();
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// A JSON value is read as a (partial) volume mount, anything else as the
/// mount path. The name always comes from the annotation key.
fn volume_mount(name: &str, value: &str) -> Result<VolumeMount, AnnotationError> {
    let mut json = match serde_json::from_str::<Value>(value) {
        Ok(json) => json,
        Err(_) => {
            return Ok(VolumeMount {
                name: name.to_string(),
                mount_path: value.to_string(),
                ..Default::default()
            })
        }
    };
    if let Value::Object(map) = &mut json {
        map.insert("name".to_string(), Value::String(name.to_string()));
    }
    serde_json::from_value(json).map_err(|source| AnnotationError::InvalidVolumeMount {
        key: format!("{}-{}", ann::VOLUME_MOUNT, name),
        source,
    })
}

fn volume_source(name: &str, value: &str) -> Result<Volume, AnnotationError> {
    let key = || format!("{}-{}", ann::VOLUME_SOURCE, name);
    let mut json = serde_json::from_str::<Value>(value)
        .map_err(|source| AnnotationError::InvalidVolumeSource { key: key(), source })?;
    if let Value::Object(map) = &mut json {
        map.insert("name".to_string(), Value::String(name.to_string()));
    }
    serde_json::from_value(json)
        .map_err(|source| AnnotationError::InvalidVolumeSource { key: key(), source })
}
