use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// A class or function that can be imported from a Maven artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryImportData {
    /// `groupId:artifactId`
    pub artifact: String,
    pub imported_item_fq_name: String,
    pub imported_item_package_name: String,
    pub version: String,
}

/// Maven coordinate of an indexed artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl Coordinate {
    /// `groupId:artifactId`, the form used as key throughout the registry
    pub fn artifact(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

/// Key of an extension function: its simple name and receiver type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSpecifier {
    pub simple_name: String,
    pub receiver: String,
}

impl FunctionSpecifier {
    pub fn new(simple_name: &str, receiver: &str) -> Self {
        Self {
            simple_name: simple_name.to_string(),
            receiver: receiver.to_string(),
        }
    }
}

/// Top-level (or extension) function recovered from its JVM name.
///
/// The compiler places top-level functions in a synthetic facade class, so the
/// JVM name looks like `com.example.FileFacadeKt.foo`. The segment right before the
/// function name is the facade class; it is dropped and whatever precedes it is the
/// package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KotlinTopLevelFunction {
    pub simple_name: String,
    pub package_name: String,
    pub receiver: Option<String>,
}

impl KotlinTopLevelFunction {
    /// Returns `None` when `jvm_name` has no facade segment (no dot) or an empty segment.
    pub fn from_jvm_qualified_name(jvm_name: &str, receiver: Option<&str>) -> Option<Self> {
        let (facade_qualified_name, simple_name) = jvm_name.rsplit_once('.')?;
        let (package_name, facade) = facade_qualified_name
            .rsplit_once('.')
            .unwrap_or(("", facade_qualified_name));

        if simple_name.is_empty() || facade.is_empty() {
            return None;
        }

        Some(Self {
            simple_name: simple_name.to_string(),
            package_name: package_name.to_string(),
            receiver: receiver.map(str::to_string),
        })
    }

    /// Name as written in source: `package.simpleName`, or just `simpleName` at the root.
    pub fn kotlin_fq_name(&self) -> String {
        qualify(&self.package_name, &self.simple_name)
    }
}

fn qualify(package_name: &str, simple_name: &str) -> String {
    if package_name.is_empty() {
        simple_name.to_string()
    } else {
        format!("{}.{}", package_name, simple_name)
    }
}

/// Lookup tables of one parsed index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryLookup {
    /// Simple class name → candidates in index order
    pub class_name_map: HashMap<String, Vec<LibraryImportData>>,
    /// Top-level function simple name → candidates in index order
    pub top_level_functions_map: HashMap<String, Vec<LibraryImportData>>,
    /// Extension function name and receiver → candidates in index order
    pub extension_functions_map: HashMap<FunctionSpecifier, Vec<LibraryImportData>>,
    /// Base artifact → its ktx companion
    pub ktx_map: HashMap<String, String>,
    /// Platform-specific KMP artifact → base artifact, `None` when their versions differ
    pub kmp_artifact_map: HashMap<String, Option<String>>,
    /// Every valid record in index order
    pub coordinates: Vec<Coordinate>,
    /// Packages containing at least one indexed class or function
    pub indexed_packages: HashSet<String>,
}
