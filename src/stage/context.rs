//! Loading contexts and the units they resolve.
//!
//! Every successful stage load gets a new [`LoadingContext`] holding the unit
//! table of exactly one artifact version. Contexts form a chain back to the host
//! context. Resolution asks the host first, so shared framework units always come
//! from the host; after that a context's own table wins over its ancestors, so a
//! newer stage never picks up same-named units from an older one.

use crate::checksum::ContentHash;
use crate::error::LoaderError;
use crate::stage::entry::{Stage, StageFactory, StageHandle};
use crate::version::Version;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type UnitTable = HashMap<String, Arc<dyn StageFactory>>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The artifact a context was created for
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub package: String,
    pub version: Option<Version>,
    pub checksum: ContentHash,
}

/// A unit found by [`LoadingContext::resolve`], with the context that defined it
#[derive(Clone)]
pub struct ResolvedUnit {
    pub factory: Arc<dyn StageFactory>,
    pub context_id: u64,
    pub context_label: String,
}

pub struct LoadingContext {
    id: u64,
    label: String,
    artifact: Option<ArtifactInfo>,
    parent: Option<Arc<LoadingContext>>,
    units: UnitTable,
}

impl LoadingContext {
    /// Root context of the embedding host. Its units are shared with every descendant.
    pub fn host(units: UnitTable) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            label: "host".to_string(),
            artifact: None,
            parent: None,
            units,
        })
    }

    /// New context for `artifact`, below `parent`
    pub fn child(parent: &Arc<Self>, artifact: ArtifactInfo, units: UnitTable) -> Arc<Self> {
        let label = format!(
            "{}@{}",
            artifact.package,
            artifact
                .version
                .as_ref()
                .map(Version::as_str)
                .unwrap_or("unversioned")
        );
        Arc::new(Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            label,
            artifact: Some(artifact),
            parent: Some(Arc::clone(parent)),
            units,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn artifact(&self) -> Option<&ArtifactInfo> {
        self.artifact.as_ref()
    }

    pub fn parent(&self) -> Option<&Arc<LoadingContext>> {
        self.parent.as_ref()
    }

    /// Number of contexts above this one
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Whether this context's own table defines `name`
    pub fn defines(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Resolve a unit: host first, then this context, then the remaining ancestors
    pub fn resolve(&self, name: &str) -> Option<ResolvedUnit> {
        let host = self.ancestors().last().unwrap_or(self);
        host.lookup(name)
            .or_else(|| self.lookup(name))
            .or_else(|| {
                self.ancestors()
                    .filter(|ancestor| ancestor.parent.is_some())
                    .find_map(|ancestor| ancestor.lookup(name))
            })
    }

    fn lookup(&self, name: &str) -> Option<ResolvedUnit> {
        self.units.get(name).map(|factory| ResolvedUnit {
            factory: Arc::clone(factory),
            context_id: self.id,
            context_label: self.label.clone(),
        })
    }

    fn ancestors(&self) -> impl Iterator<Item = &LoadingContext> {
        std::iter::successors(self.parent.as_deref(), |context| context.parent.as_deref())
    }
}

impl fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut units: Vec<_> = self.units.keys().collect();
        units.sort();
        f.debug_struct("LoadingContext")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("depth", &self.depth())
            .field("units", &units)
            .finish()
    }
}

/// Supplies the unit table of an artifact
pub trait UnitProvider: Send + Sync {
    fn units_for(&self, artifact: &ArtifactInfo) -> Result<UnitTable, LoaderError>;
}

struct Registration {
    package: String,
    version: Option<Version>,
    unit: String,
    factory: Arc<dyn StageFactory>,
}

/// Units compiled into the host process, registered per package.
///
/// A registration pinned to a version only applies to artifacts of exactly that
/// version and takes precedence over an unpinned registration of the same unit.
#[derive(Default)]
pub struct StaticUnitProvider {
    registrations: Vec<Registration>,
}

impl StaticUnitProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(self, package: &str, unit: &str, factory: F) -> Self
    where
        F: Fn(StageHandle) -> Result<Box<dyn Stage>, LoaderError> + Send + Sync + 'static,
    {
        self.push(package, None, unit, Arc::new(factory))
    }

    pub fn register_version<F>(self, package: &str, version: &str, unit: &str, factory: F) -> Self
    where
        F: Fn(StageHandle) -> Result<Box<dyn Stage>, LoaderError> + Send + Sync + 'static,
    {
        self.push(package, Some(Version::new(version)), unit, Arc::new(factory))
    }

    pub fn register_factory(self, package: &str, unit: &str, factory: Arc<dyn StageFactory>) -> Self {
        self.push(package, None, unit, factory)
    }

    fn push(
        mut self,
        package: &str,
        version: Option<Version>,
        unit: &str,
        factory: Arc<dyn StageFactory>,
    ) -> Self {
        self.registrations.push(Registration {
            package: package.to_string(),
            version,
            unit: unit.to_string(),
            factory,
        });
        self
    }
}

impl UnitProvider for StaticUnitProvider {
    fn units_for(&self, artifact: &ArtifactInfo) -> Result<UnitTable, LoaderError> {
        let mut table = UnitTable::new();
        for registration in self
            .registrations
            .iter()
            .filter(|r| r.package == artifact.package)
        {
            match &registration.version {
                Some(pinned) if artifact.version.as_ref() == Some(pinned) => {
                    table.insert(registration.unit.clone(), Arc::clone(&registration.factory));
                }
                Some(_) => {}
                None => {
                    table
                        .entry(registration.unit.clone())
                        .or_insert_with(|| Arc::clone(&registration.factory));
                }
            }
        }
        Ok(table)
    }
}
