//! Pod annotations understood by the injector.
//!
//! Every key lives under the `container-injector.uthng.me/` prefix. Three
//! families carry a user-chosen name after their prefix: `env-<NAME>`, `volume-mount-<NAME>`
//! and `volume-source-<NAME>`.

use crate::error::AnnotationError;
use std::collections::BTreeMap;

pub type Annotations = BTreeMap<String, String>;

/// Set by the user to request an injection; must parse as a boolean.
pub const INJECT: &str = "container-injector.uthng.me/inject";
/// Injection status. `injected` suppresses further mutations.
pub const STATUS: &str = "container-injector.uthng.me/status";
pub const NAME: &str = "container-injector.uthng.me/name";
pub const IMAGE: &str = "container-injector.uthng.me/image";
pub const COMMAND: &str = "container-injector.uthng.me/command";
pub const ARGS: &str = "container-injector.uthng.me/args";
/// Inject the sidecar into `initContainers` instead of `containers`.
pub const INIT_CONTAINER: &str = "container-injector.uthng.me/init-container";
/// Put the sidecar in front of the existing containers.
pub const INIT_FIRST: &str = "container-injector.uthng.me/init-first";
pub const PULL_POLICY: &str = "container-injector.uthng.me/pull-policy";
pub const LIMITS_CPU: &str = "container-injector.uthng.me/limits-cpu";
pub const LIMITS_MEM: &str = "container-injector.uthng.me/limits-mem";
pub const REQUESTS_CPU: &str = "container-injector.uthng.me/requests-cpu";
pub const REQUESTS_MEM: &str = "container-injector.uthng.me/requests-mem";
pub const RUN_AS_USER: &str = "container-injector.uthng.me/run-as-user";
pub const RUN_AS_GROUP: &str = "container-injector.uthng.me/run-as-group";
pub const TLS_SECRET: &str = "container-injector.uthng.me/tls-secret";
pub const CONFIGMAP: &str = "container-injector.uthng.me/configmap";

pub const ENV: &str = "container-injector.uthng.me/env";
pub const VOLUME_MOUNT: &str = "container-injector.uthng.me/volume-mount";
pub const VOLUME_SOURCE: &str = "container-injector.uthng.me/volume-source";

/// Value of [`STATUS`] once a pod has been mutated.
pub const STATUS_INJECTED: &str = "injected";

/// Parses a boolean the way Kubernetes tooling accepts them:
/// `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, AnnotationError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(AnnotationError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn parse_i64(key: &str, value: &str) -> Result<i64, AnnotationError> {
    value
        .trim()
        .parse()
        .map_err(|source| AnnotationError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
            source,
        })
}

/// Looks up a boolean annotation. Absent keys yield `None`.
pub fn get_bool(anns: &Annotations, key: &str) -> Result<Option<bool>, AnnotationError> {
    anns.get(key).map(|v| parse_bool(key, v)).transpose()
}

pub fn get_i64(anns: &Annotations, key: &str) -> Result<Option<i64>, AnnotationError> {
    anns.get(key).map(|v| parse_i64(key, v)).transpose()
}

/// Looks up a string annotation, treating an empty value as absent.
pub fn get_str<'a>(anns: &'a Annotations, key: &str) -> Option<&'a str> {
    anns.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Iterates over `(name, value)` pairs of the family `prefix`, i.e. every key
/// of the form `<prefix>-<name>`, in key order.
pub fn family<'a>(
    anns: &'a Annotations,
    prefix: &'a str,
) -> impl Iterator<Item = Result<(&'a str, &'a str), AnnotationError>> + 'a {
    anns.iter().filter_map(move |(key, value)| {
        let name = key.strip_prefix(prefix)?.strip_prefix('-')?;
        if name.is_empty() {
            return Some(Err(AnnotationError::EmptyName { key: key.clone() }));
        }
        Some(Ok((name, value.as_str())))
    })
}
