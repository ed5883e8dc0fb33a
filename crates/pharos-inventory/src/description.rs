//! Application descriptions.
//!
//! An application is described by a compose-style YAML document with a
//! top-level `services` mapping. Each service names its container image.
//! The application id is derived from the raw document bytes, so the same
//! description always maps to the same app.

use serde_yaml::Value as YamlValue;
use sha2::{Digest, Sha256};

use pharos_state::AppId;
use pharos_state::id::ID_LEN;

use crate::error::{InventoryError, InventoryResult};

/// The parts of an app description the anchor keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescription {
    pub id: AppId,
    /// Images with their tag stripped, in service order, deduplicated.
    pub images: Vec<String>,
    /// Service names, in document order.
    pub services: Vec<String>,
}

impl AppDescription {
    /// Parse a raw description.
    pub fn parse(raw: &[u8]) -> InventoryResult<Self> {
        let doc: YamlValue = serde_yaml::from_slice(raw)
            .map_err(|e| InventoryError::InvalidYaml(e.to_string()))?;

        let services = doc
            .get("services")
            .and_then(YamlValue::as_mapping)
            .ok_or_else(|| InventoryError::InvalidYaml("missing `services` mapping".to_string()))?;
        if services.is_empty() {
            return Err(InventoryError::InvalidYaml("`services` is empty".to_string()));
        }

        let mut names = Vec::with_capacity(services.len());
        let mut images: Vec<String> = Vec::with_capacity(services.len());
        for (name, service) in services {
            let name = name
                .as_str()
                .ok_or_else(|| InventoryError::InvalidYaml("service names must be strings".to_string()))?;
            let image = service
                .get("image")
                .and_then(YamlValue::as_str)
                .ok_or_else(|| InventoryError::InvalidYaml(format!("service `{name}` has no image")))?;

            let image = strip_tag(image);
            if !images.iter().any(|known| known == image) {
                images.push(image.to_string());
            }
            names.push(name.to_string());
        }

        Ok(Self {
            id: app_id(raw),
            images,
            services: names,
        })
    }
}

/// Stable app id for a raw description: the leading 12 bytes of its
/// SHA-256, hex encoded.
pub fn app_id(raw: &[u8]) -> AppId {
    let digest = Sha256::digest(raw);
    hex::encode(&digest[..ID_LEN / 2])
}

/// Drop the `:tag` and `@digest` suffixes from an image reference.
///
/// Only the last path segment is inspected, so a registry port such as
/// `registry:5000/name` survives.
pub fn strip_tag(image: &str) -> &str {
    let image = image.trim();
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    let last_segment = image.rfind('/').map_or(0, |slash| slash + 1);
    match image[last_segment..].find(':') {
        Some(colon) => &image[..last_segment + colon],
        None => image,
    }
}
