//! # Configuration Module
//!
//! Server configuration loaded from TOML with environment overrides.
//!
//! ## File
//!
//! The path comes from `FACETRY_CONFIG` (default `facetry.toml`). A missing
//! default file is not an error; a missing file named explicitly is.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! path = "facetry.redb"
//!
//! [bootstrap]
//! owner = "0x00000000000000000000000000000000000000aa"
//! install = ["0x0000000000000000000000000000000000000001"]
//!
//! [[modules]]
//! handle = "0x0000000000000000000000000000000000000001"
//! kind = "whitelist"
//!
//! [[modules]]
//! handle = "0x0000000000000000000000000000000000000003"
//! kind = "constant"
//! selector = "addr(bytes32)"
//! value = "0x0000000000000000000000000000000000000003"
//! ```
//!
//! ## Environment Overrides
//!
//! - `FACETRY_HOST`, `FACETRY_PORT`: listen address
//! - `FACETRY_DB`: redb database path (enables persistence)
//!
//! Security settings (`FACETRY_API_KEY`, `FACETRY_RATE_LIMIT`,
//! `FACETRY_CORS_ORIGINS`) are read by the HTTP layer directly.

use facetry_core::facets::{ConstantFacet, RecordFacet, WhitelistGate};
use facetry_core::{
    Address, Facet, FacetCut, FacetHandle, Registry, RegistryError, Selector, Session, decode_hex,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "facetry.toml";

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub bootstrap: BootstrapConfig,
    pub modules: Vec<ModuleConfig>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[storage]` section. No path means an in-memory registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

/// `[bootstrap]` section.
///
/// When the registry is empty at startup and `owner` is set, a root
/// instance is created for it and every module in `install` is attached
/// with all of its selectors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub owner: Option<String>,
    pub install: Vec<String>,
}

/// Built-in module kinds that can be deployed from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Whitelist,
    Record,
    Constant,
}

/// One `[[modules]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// 20-byte hex handle the module is deployed under.
    pub handle: String,
    pub kind: ModuleKind,
    /// `constant` only: a canonical signature or a 4-byte hex selector.
    pub selector: Option<String>,
    /// `constant` only: hex answer.
    pub value: Option<String>,
}

impl ModuleConfig {
    fn build(&self) -> Result<(FacetHandle, Arc<dyn Facet>), RegistryError> {
        let handle: FacetHandle = self.handle.parse()?;
        let module: Arc<dyn Facet> = match self.kind {
            ModuleKind::Whitelist => Arc::new(WhitelistGate::new()),
            ModuleKind::Record => Arc::new(RecordFacet::new()),
            ModuleKind::Constant => {
                let selector = self.selector.as_deref().ok_or_else(|| {
                    RegistryError::InvalidInput(format!(
                        "constant module {} needs a selector",
                        self.handle
                    ))
                })?;
                let value = self.value.as_deref().ok_or_else(|| {
                    RegistryError::InvalidInput(format!(
                        "constant module {} needs a value",
                        self.handle
                    ))
                })?;
                Arc::new(ConstantFacet::new(
                    parse_selector(selector)?,
                    decode_hex(value)?,
                ))
            }
        };
        Ok((handle, module))
    }
}

/// Parse a selector given either as a canonical signature
/// (`addr(bytes32)`) or as 4 bytes of hex.
pub fn parse_selector(s: &str) -> Result<Selector, RegistryError> {
    if s.contains('(') {
        Ok(Selector::from_signature(s))
    } else {
        s.parse()
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, RegistryError> {
        toml::from_str(s)
            .map_err(|e| RegistryError::DeserializationError(format!("config: {}", e)))
    }

    /// Load the configuration file and apply environment overrides.
    pub fn load() -> Result<Self, RegistryError> {
        let explicit = std::env::var("FACETRY_CONFIG").ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(RegistryError::IoError(format!(
                "config file not found: {}",
                path.display()
            )));
        } else {
            tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::IoError(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Apply `FACETRY_*` overrides looked up through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("FACETRY_HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("FACETRY_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => tracing::warn!("Ignoring FACETRY_PORT '{}': {}", port, e),
            }
        }
        if let Some(db) = lookup("FACETRY_DB").filter(|d| !d.is_empty()) {
            self.storage.path = Some(PathBuf::from(db));
        }
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    // =========================================================================
    // STARTUP WIRING
    // =========================================================================

    /// A registry with every configured module deployed.
    pub fn build_registry(&self) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();
        for module in &self.modules {
            let (handle, facet) = module.build()?;
            registry.deploy_module(handle, facet)?;
        }
        Ok(registry)
    }

    /// Build the registry, open the configured backend and bootstrap.
    pub fn open_session(&self) -> Result<Session, RegistryError> {
        let registry = self.build_registry()?;
        let mut session = match &self.storage.path {
            Some(path) => Session::with_redb(path, registry)?,
            None => Session::with_registry(registry),
        };
        session.commit(|reg| self.bootstrap(reg))?;
        Ok(session)
    }

    /// Create the bootstrap instance if the registry is empty.
    ///
    /// Returns whether anything was created.
    pub fn bootstrap(&self, registry: &mut Registry) -> Result<bool, RegistryError> {
        let Some(owner) = self.bootstrap.owner.as_deref() else {
            return Ok(false);
        };
        if registry.instance_count() > 0 {
            return Ok(false);
        }
        let owner: Address = owner.parse()?;

        let mut cuts = Vec::with_capacity(self.bootstrap.install.len());
        for raw in &self.bootstrap.install {
            let handle: FacetHandle = raw.parse()?;
            let module = registry
                .module(handle)
                .ok_or(RegistryError::ModuleNotFound(handle))?;
            cuts.push(FacetCut::add(handle, module.selectors()));
        }

        let root = registry.create_instance(owner)?;
        if !cuts.is_empty() {
            registry.apply_cuts(root, &cuts, None, owner)?;
        }
        tracing::info!(instance = %root, owner = %owner, installed = cuts.len(), "bootstrap instance created");
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================
