//! Model artifact discovery and loading
//!
//! Scans artifact directories into an ordered registry and assembles
//! [`ModelBundle`]s (model plus optional scaler, preprocessor, feature
//! importances and metadata) with a deterministic fallback chain.
//!
//! The registry is published by swapping an `Arc`, so readers never hold
//! the lock while touching the filesystem.


use crate::artifacts::{self, FeatureTransform, ScoringModel, DOCUMENT_EXTENSION};
use crate::error::PredictError;
use crate::observability::ServiceMetrics;
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Default directory holding model artifacts, relative to the base dir
pub const DEFAULT_MODEL_PATH: &str = "static/models";

/// Model loaded when the caller does not name one
pub const DEFAULT_MODEL: &str = "rf_model.model";

/// Generic metadata file shared by every model in a directory
const SHARED_METADATA_FILE: &str = "model_metadata.json";

/// Generic feature importance table
const SHARED_IMPORTANCE_FILE: &str = "feature_importance.json";

/// Configuration for the model manager
#[derive(Debug, Clone)]
pub struct ModelManagerConfig {
    /// Relative search paths are resolved against this directory
    pub base_dir: PathBuf,
    /// Primary artifact directory
    pub model_path: PathBuf,
    /// Extra directories searched after the primary one
    pub additional_paths: Vec<PathBuf>,
    /// Name (with or without extension) used when none is requested
    pub default_model: String,
    /// Recognized model extensions, in discovery order
    pub extensions: Vec<String>,
}

impl Default for ModelManagerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            additional_paths: Vec::new(),
            default_model: DEFAULT_MODEL.to_string(),
            extensions: vec![".model".to_string(), ".onnx".to_string()],
        }
    }
}

impl ModelManagerConfig {
    /// Search directories in priority order, resolved against `base_dir`
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(&self.model_path)
            .chain(self.additional_paths.iter())
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.base_dir.join(p)
                }
            })
            .collect()
    }

    /// Drop a trailing configured extension, leaving other dots alone
    pub fn strip_extension<'a>(&self, name: &'a str) -> &'a str {
        self.extensions
            .iter()
            .find_map(|ext| {
                name.strip_suffix(ext.as_str())
                    .filter(|stem| !stem.is_empty())
            })
            .unwrap_or(name)
    }

    /// Logical name of the default model
    pub fn default_name(&self) -> &str {
        self.strip_extension(&self.default_model)
    }
}

/// Model type used to find feature importance tables: the name's prefix
/// before its first `_`, or the whole name
pub fn model_type(name: &str) -> &str {
    name.split_once('_').map(|(prefix, _)| prefix).unwrap_or(name)
}

/// Companion artifacts that live next to models but are not models
fn is_companion(stem: &str) -> bool {
    stem == "scaler"
        || stem.ends_with("_scaler")
        || stem.starts_with("preprocessor")
        || stem.ends_with("_preprocessor")
}

/// One discoverable model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRegistryEntry {
    pub name: String,
    pub file_name: String,
    pub path: PathBuf,
    pub directory: PathBuf,
    pub model_type: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Ordered set of discovered models keyed by logical name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRegistry {
    entries: Vec<ModelRegistryEntry>,
}

impl ModelRegistry {
    /// Add an entry; a duplicate name takes over the existing slot
    pub fn insert(&mut self, entry: ModelRegistryEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                debug!(model = %entry.name, path = ?entry.path, "Duplicate model name, replacing");
                *existing = entry;
            }
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelRegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn first(&self) -> Option<&ModelRegistryEntry> {
        self.entries.first()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelRegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loaded model and its companions. Never mutated after construction.
#[derive(Default)]
pub struct ModelBundle {
    /// Resolved logical name; `None` for the empty bundle
    pub name: Option<String>,
    pub model: Option<Box<dyn ScoringModel>>,
    pub scaler: Option<Box<dyn FeatureTransform>>,
    pub preprocessor: Option<Box<dyn FeatureTransform>>,
    pub feature_importances: HashMap<String, f64>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// SHA-256 of the model file
    pub checksum: Option<String>,
    pub source_path: Option<PathBuf>,
}

impl ModelBundle {
    /// Bundle with nothing loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Name reported as `model_used`
    pub fn model_used(&self) -> &str {
        self.name.as_deref().unwrap_or("none")
    }
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("name", &self.name)
            .field("model", &self.model.as_ref().map(|m| m.kind().to_string()))
            .field("scaler", &self.scaler.as_ref().map(|s| s.kind().to_string()))
            .field(
                "preprocessor",
                &self.preprocessor.as_ref().map(|p| p.kind().to_string()),
            )
            .field("feature_importances", &self.feature_importances.len())
            .field("checksum", &self.checksum)
            .field("source_path", &self.source_path)
            .finish()
    }
}

/// Discovers and loads model artifacts
pub struct ModelManager {
    config: ModelManagerConfig,
    registry: RwLock<Arc<ModelRegistry>>,
    metrics: ServiceMetrics,
}

impl ModelManager {
    /// Create a manager with an empty registry; call [`discover`](Self::discover)
    /// to populate it
    pub fn new(config: ModelManagerConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Arc::new(ModelRegistry::default())),
            metrics: ServiceMetrics::new(),
        }
    }

    pub fn config(&self) -> &ModelManagerConfig {
        &self.config
    }

    /// Current registry snapshot
    pub fn registry(&self) -> Arc<ModelRegistry> {
        match self.registry.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, registry: ModelRegistry) -> Arc<ModelRegistry> {
        let registry = Arc::new(registry);
        let mut guard = match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = registry.clone();
        self.metrics.set_models_discovered(registry.len() as i64);
        registry
    }

    /// Scan every search directory and publish the resulting registry.
    ///
    /// Directories that cannot be created or read are skipped. When none
    /// of them could be scanned the previous registry stays published.
    pub fn discover(&self) -> Arc<ModelRegistry> {
        let dirs = self.config.search_dirs();
        let mut registry = ModelRegistry::default();
        let mut scanned = 0usize;

        for dir in &dirs {
            match self.scan_directory(dir, &mut registry) {
                Ok(found) => {
                    scanned += 1;
                    debug!(directory = ?dir, found, "Scanned model directory");
                }
                Err(e) => {
                    warn!(
                        directory = ?dir,
                        error = %format!("{:#}", e),
                        "Failed to scan model directory"
                    );
                }
            }
        }

        if scanned == 0 && !dirs.is_empty() {
            warn!("No model directory could be scanned, keeping previous registry");
            return self.registry();
        }

        info!(
            models = registry.len(),
            directories = scanned,
            "Model discovery complete"
        );
        self.publish(registry)
    }

    /// Explicit rediscovery entry point
    pub fn reload(&self) -> Arc<ModelRegistry> {
        info!("Reloading model registry");
        self.discover()
    }

    fn scan_directory(&self, dir: &Path, registry: &mut ModelRegistry) -> Result<usize> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create model directory {}", dir.display()))?;

        let mut file_names: Vec<String> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read model directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        file_names.sort();

        let mut found = 0;
        for ext in &self.config.extensions {
            for file_name in &file_names {
                let stem = match file_name.strip_suffix(ext.as_str()) {
                    Some(stem) if !stem.is_empty() => stem,
                    _ => continue,
                };
                if is_companion(stem) {
                    continue;
                }

                registry.insert(ModelRegistryEntry {
                    name: stem.to_string(),
                    file_name: file_name.clone(),
                    path: dir.join(file_name),
                    directory: dir.to_path_buf(),
                    model_type: model_type(stem).to_string(),
                    metadata: read_metadata(dir, stem),
                });
                found += 1;
            }
        }
        Ok(found)
    }

    /// Logical names in registry order
    pub fn get_available_models(&self) -> Vec<String> {
        self.registry().names()
    }

    /// Registry entry for `name` (default model when unset)
    pub fn get_model_info(&self, name: Option<&str>) -> Option<ModelRegistryEntry> {
        let name = self.resolve_name(name);
        self.registry().get(name).cloned()
    }

    fn resolve_name<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name {
            Some(name) => self.config.strip_extension(name),
            None => self.config.default_name(),
        }
    }

    /// Load a bundle, degrading every failure to the empty bundle
    pub fn load(&self, name: Option<&str>) -> ModelBundle {
        match self.try_load(name) {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(requested = ?name, error = %e, "Model load failed, using empty bundle");
                ModelBundle::empty()
            }
        }
    }

    /// Resolve and load a bundle, reporting why nothing could be loaded
    pub fn try_load(&self, name: Option<&str>) -> Result<ModelBundle, PredictError> {
        let requested = self.resolve_name(name);

        let entry = match self.registry().get(requested) {
            Some(entry) => entry.clone(),
            None => {
                debug!(model = %requested, "Model not in registry, rediscovering");
                let registry = self.discover();
                match registry.get(requested).or_else(|| registry.first()) {
                    Some(entry) => {
                        if entry.name != requested {
                            warn!(
                                requested = %requested,
                                fallback = %entry.name,
                                "Requested model not found, falling back to first available"
                            );
                        }
                        entry.clone()
                    }
                    None => return Err(PredictError::NoModelAvailable),
                }
            }
        };

        self.load_entry(&entry)
    }

    fn load_entry(&self, entry: &ModelRegistryEntry) -> Result<ModelBundle, PredictError> {
        let model = artifacts::load_model(&entry.path)
            .map_err(|e| PredictError::model_load(format!("{}: {:#}", entry.name, e)))?;

        let dir = &entry.directory;
        let scaler = load_companion(
            dir,
            &[
                format!("scaler.{}", DOCUMENT_EXTENSION),
                format!("{}_scaler.{}", entry.name, DOCUMENT_EXTENSION),
            ],
        );
        let preprocessor = load_companion(
            dir,
            &[
                format!("preprocessor.{}", DOCUMENT_EXTENSION),
                format!("{}_preprocessor.{}", entry.name, DOCUMENT_EXTENSION),
            ],
        );
        let feature_importances = read_importances(dir, &entry.name, &entry.model_type);
        let checksum = file_checksum(&entry.path);

        info!(
            model = %entry.name,
            kind = %model.kind(),
            scaler = scaler.is_some(),
            preprocessor = preprocessor.is_some(),
            importances = feature_importances.len(),
            "Loaded model bundle"
        );
        self.metrics.set_model_info(&entry.name, model.kind());

        Ok(ModelBundle {
            name: Some(entry.name.clone()),
            model: Some(model),
            scaler,
            preprocessor,
            feature_importances,
            metadata: entry.metadata.clone(),
            checksum,
            source_path: Some(entry.path.clone()),
        })
    }
}

/// First candidate that exists and loads; load errors count as absent
fn load_companion(dir: &Path, candidates: &[String]) -> Option<Box<dyn FeatureTransform>> {
    for file_name in candidates {
        let path = dir.join(file_name);
        if !path.is_file() {
            continue;
        }
        match artifacts::load_transform(&path) {
            Ok(transform) => {
                debug!(path = ?path, kind = %transform.kind(), "Loaded feature transform");
                return Some(transform);
            }
            Err(e) => warn!(
                path = ?path,
                error = %format!("{:#}", e),
                "Skipping unreadable transform"
            ),
        }
    }
    None
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// `<name>_metadata.json` then the shared file; the first that parses wins
fn read_metadata(dir: &Path, name: &str) -> serde_json::Map<String, serde_json::Value> {
    let candidates = [
        dir.join(format!("{}_metadata.json", name)),
        dir.join(SHARED_METADATA_FILE),
    ];
    for path in candidates.iter().filter(|p| p.is_file()) {
        match read_json(path) {
            Ok(metadata) => return metadata,
            Err(e) => warn!(error = %format!("{:#}", e), "Ignoring model metadata"),
        }
    }
    serde_json::Map::new()
}

fn read_importances(dir: &Path, name: &str, model_type: &str) -> HashMap<String, f64> {
    let candidates = [
        dir.join(format!("{}_feature_importance.json", model_type)),
        dir.join(format!("{}_feature_importance.json", name)),
        dir.join(SHARED_IMPORTANCE_FILE),
    ];
    for path in candidates.iter().filter(|p| p.is_file()) {
        match read_json(path) {
            Ok(importances) => return importances,
            Err(e) => warn!(error = %format!("{:#}", e), "Ignoring feature importance table"),
        }
    }
    HashMap::new()
}

fn file_checksum(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to checksum model file");
            None
        }
    }
}
