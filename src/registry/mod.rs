//! Maven class registry built from the cached index
//!
//! # Modules
//!
//! - [`parser`]: tolerant decoding of index bytes into lookup maps
//! - [`manager`]: single-flight, invalidate-on-update registry cache
//! - [`types`]: import data, coordinates and function names
//! - [`error`]: build errors

pub mod error;
pub mod manager;
pub mod parser;
pub mod types;

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::index::IndexProvider;
use crate::index::error::IndexError;
use crate::registry::parser::parse_index;
use crate::registry::types::{FunctionSpecifier, LibraryImportData, RegistryLookup};

/// Language of the file that needs the import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Java,
    Kotlin,
}

/// How [`MavenClassRegistry::find_library_data`] filters and rewrites candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// When false, `androidx.*` artifacts are not suggested.
    pub use_androidx: bool,
    /// Kotlin consumers get the ktx companion of an artifact when one exists.
    pub language: Option<SourceLanguage>,
    /// Fold platform-specific KMP artifacts into their base artifact.
    pub map_kmp_artifacts: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            use_androidx: true,
            language: None,
            map_kmp_artifacts: false,
        }
    }
}

/// Immutable snapshot of the parsed index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MavenClassRegistry {
    lookup: RegistryLookup,
}

impl MavenClassRegistry {
    pub fn parse(bytes: &[u8]) -> Self {
        Self {
            lookup: parse_index(bytes),
        }
    }

    /// Builds a registry from the provider's current index.
    pub fn create_from(provider: &dyn IndexProvider) -> Result<Self, IndexError> {
        Ok(Self::parse(&provider.load_index()?))
    }

    pub fn lookup(&self) -> &RegistryLookup {
        &self.lookup
    }

    pub fn class_name_map(&self) -> &HashMap<String, Vec<LibraryImportData>> {
        &self.lookup.class_name_map
    }

    pub fn top_level_functions_map(&self) -> &HashMap<String, Vec<LibraryImportData>> {
        &self.lookup.top_level_functions_map
    }

    pub fn ktx_map(&self) -> &HashMap<String, String> {
        &self.lookup.ktx_map
    }

    pub fn find_import_data_by_class_name(&self, class_name: &str) -> &[LibraryImportData] {
        self.lookup
            .class_name_map
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Top-level function candidates, or extension function candidates when `receiver` is set.
    pub fn find_import_data_by_function(
        &self,
        simple_name: &str,
        receiver: Option<&str>,
    ) -> &[LibraryImportData] {
        let candidates = match receiver {
            Some(receiver) => self
                .lookup
                .extension_functions_map
                .get(&FunctionSpecifier::new(simple_name, receiver)),
            None => self.lookup.top_level_functions_map.get(simple_name),
        };
        candidates.map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_package_indexed(&self, package_name: &str) -> bool {
        self.lookup.indexed_packages.contains(package_name)
    }

    /// Candidate imports for an unresolved `name`, as offered to the user.
    pub fn find_library_data(
        &self,
        name: &str,
        receiver: Option<&str>,
        options: &LookupOptions,
    ) -> Vec<LibraryImportData> {
        let classes = match receiver {
            Some(_) => &[][..],
            None => self.find_import_data_by_class_name(name),
        };
        let functions = self.find_import_data_by_function(name, receiver);

        let candidates: IndexSet<LibraryImportData> = classes
            .iter()
            .chain(functions)
            .filter(|data| options.use_androidx || !data.artifact.starts_with("androidx."))
            .filter_map(|data| {
                if !options.map_kmp_artifacts {
                    return Some(data.clone());
                }
                match self.lookup.kmp_artifact_map.get(&data.artifact) {
                    None => Some(data.clone()),
                    Some(Some(base)) => Some(LibraryImportData {
                        artifact: base.clone(),
                        ..data.clone()
                    }),
                    Some(None) => None,
                }
            })
            .map(|data| match options.language {
                Some(SourceLanguage::Kotlin) => match self.lookup.ktx_map.get(&data.artifact) {
                    Some(ktx) => LibraryImportData {
                        artifact: ktx.clone(),
                        ..data
                    },
                    None => data,
                },
                _ => data,
            })
            .collect();

        candidates.into_iter().collect()
    }
}
