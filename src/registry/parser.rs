//! Tolerant decoding of the index document into [`RegistryLookup`]
//!
//! Records are decoded one at a time; a record that lacks a mandatory field is
//! dropped without affecting its siblings. Unknown keys are never read.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::registry::types::{
    Coordinate, FunctionSpecifier, KotlinTopLevelFunction, LibraryImportData, RegistryLookup,
};

/// Artifact-id suffixes of platform-specific Kotlin Multiplatform publications
pub const KMP_PLATFORM_SUFFIXES: &[&str] = &[
    "android",
    "desktop",
    "jvm",
    "jvmstubs",
    "linuxx64stubs",
    "linuxx64",
    "linuxarm64",
    "iosx64",
    "iosarm64",
    "iossimulatorarm64",
    "macosx64",
    "macosarm64",
    "js",
    "wasmjs",
];

#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(rename = "Index")]
    index: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRecord {
    group_id: String,
    artifact_id: String,
    version: String,
    ktx_targets: Vec<String>,
    fqcns: Vec<String>,
    #[serde(default)]
    ktlfns: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    fqn: Option<String>,
    xfqn: Option<String>,
    rcvr: Option<String>,
}

/// Decodes raw index bytes. Never fails: unusable input yields empty maps.
pub fn parse_index(bytes: &[u8]) -> RegistryLookup {
    let records = match serde_json::from_slice::<IndexDocument>(bytes) {
        Ok(IndexDocument {
            index: Some(records),
        }) => records,
        Ok(IndexDocument { index: None }) => {
            warn!("Index document has no \"Index\" array");
            return RegistryLookup::default();
        }
        Err(e) => {
            warn!("Failed to decode index document: {}", e);
            return RegistryLookup::default();
        }
    };

    let total = records.len();
    let mut builder = LookupBuilder::default();
    for value in records {
        match serde_json::from_value::<IndexRecord>(value) {
            Ok(record) => builder.add_record(record),
            Err(e) => debug!("Skipping index record: {}", e),
        }
    }

    let lookup = builder.finish();
    debug!(
        "Parsed {} of {} index records: {} class names, {} functions, {} ktx targets",
        lookup.coordinates.len(),
        total,
        lookup.class_name_map.len(),
        lookup.top_level_functions_map.len() + lookup.extension_functions_map.len(),
        lookup.ktx_map.len()
    );
    lookup
}

#[derive(Default)]
struct LookupBuilder {
    lookup: RegistryLookup,
}

impl LookupBuilder {
    fn add_record(&mut self, record: IndexRecord) {
        let coordinate = Coordinate {
            group_id: record.group_id,
            artifact_id: record.artifact_id,
            version: record.version,
        };
        let artifact = coordinate.artifact();

        for fqcn in &record.fqcns {
            let (package_name, simple_name) =
                fqcn.rsplit_once('.').unwrap_or(("", fqcn.as_str()));
            if simple_name.is_empty() {
                continue;
            }
            let data = LibraryImportData {
                artifact: artifact.clone(),
                imported_item_fq_name: fqcn.clone(),
                imported_item_package_name: package_name.to_string(),
                version: coordinate.version.clone(),
            };
            self.add_package(package_name);
            self.lookup
                .class_name_map
                .entry(simple_name.to_string())
                .or_default()
                .push(data);
        }

        let entries = record
            .ktlfns
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in entries {
            if let Some(function) = decode_function(entry) {
                self.add_function(function, &artifact, &coordinate.version);
            }
        }

        for base in record.ktx_targets {
            self.lookup.ktx_map.insert(base, artifact.clone());
        }

        self.lookup.coordinates.push(coordinate);
    }

    fn add_function(&mut self, function: KotlinTopLevelFunction, artifact: &str, version: &str) {
        let data = LibraryImportData {
            artifact: artifact.to_string(),
            imported_item_fq_name: function.kotlin_fq_name(),
            imported_item_package_name: function.package_name.clone(),
            version: version.to_string(),
        };
        self.add_package(&function.package_name);

        let candidates = match function.receiver {
            Some(receiver) => self
                .lookup
                .extension_functions_map
                .entry(FunctionSpecifier {
                    simple_name: function.simple_name,
                    receiver,
                })
                .or_default(),
            None => self
                .lookup
                .top_level_functions_map
                .entry(function.simple_name)
                .or_default(),
        };
        candidates.push(data);
    }

    fn add_package(&mut self, package_name: &str) {
        if !package_name.is_empty() {
            self.lookup
                .indexed_packages
                .insert(package_name.to_string());
        }
    }

    fn finish(mut self) -> RegistryLookup {
        self.lookup.kmp_artifact_map = kmp_artifact_map(&self.lookup.coordinates);
        self.lookup
    }
}

fn decode_function(entry: &serde_json::Value) -> Option<KotlinTopLevelFunction> {
    let entry = serde_json::from_value::<FunctionEntry>(entry.clone()).ok()?;
    match entry {
        FunctionEntry { fqn: Some(fqn), .. } => {
            KotlinTopLevelFunction::from_jvm_qualified_name(&fqn, None)
        }
        FunctionEntry {
            xfqn: Some(xfqn),
            rcvr: Some(rcvr),
            ..
        } => KotlinTopLevelFunction::from_jvm_qualified_name(&xfqn, Some(&rcvr)),
        _ => None,
    }
}

/// Maps `group:base-<platform>` to `group:base` when the base artifact is indexed.
fn kmp_artifact_map(coordinates: &[Coordinate]) -> HashMap<String, Option<String>> {
    let versions: HashMap<(&str, &str), &str> = coordinates
        .iter()
        .map(|c| ((c.group_id.as_str(), c.artifact_id.as_str()), c.version.as_str()))
        .collect();

    let mut map = HashMap::new();
    for coordinate in coordinates {
        let base_id = KMP_PLATFORM_SUFFIXES.iter().find_map(|suffix| {
            coordinate
                .artifact_id
                .strip_suffix(*suffix)
                .and_then(|rest| rest.strip_suffix('-'))
        });
        let Some(base_id) = base_id else {
            continue;
        };
        let Some(base_version) = versions.get(&(coordinate.group_id.as_str(), base_id)) else {
            continue;
        };

        let base = (*base_version == coordinate.version)
            .then(|| qualify_artifact(&coordinate.group_id, base_id));
        map.insert(coordinate.artifact(), base);
    }
    map
}

fn qualify_artifact(group_id: &str, artifact_id: &str) -> String {
    format!("{}:{}", group_id, artifact_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(artifact: &str, fq_name: &str, package_name: &str, version: &str) -> LibraryImportData {
        LibraryImportData {
            artifact: artifact.to_string(),
            imported_item_fq_name: fq_name.to_string(),
            imported_item_package_name: package_name.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn parse_index_builds_class_map_for_single_record() {
        let lookup = parse_index(
            br#"{"Index":[{"groupId":"g","artifactId":"a","version":"1","ktxTargets":[],"fqcns":["p.C"]}]}"#,
        );

        assert_eq!(
            lookup.class_name_map,
            HashMap::from([("C".to_string(), vec![data("g:a", "p.C", "p", "1")])])
        );
        assert!(lookup.top_level_functions_map.is_empty());
        assert!(lookup.ktx_map.is_empty());
    }

    #[test]
    fn parse_index_accumulates_classes_in_encounter_order() {
        let lookup = parse_index(
            br#"{
              "Index": [
                {
                  "groupId": "androidx.activity",
                  "artifactId": "activity",
                  "version": "1.1.0",
                  "ktxTargets": [],
                  "fqcns": ["androidx.activity.ComponentActivity", "androidx.activity.Fake"]
                },
                {
                  "groupId": "androidx.activity",
                  "artifactId": "activity-ktx",
                  "version": "1.1.0",
                  "ktxTargets": ["androidx.activity:activity"],
                  "fqcns": []
                },
                {
                  "groupId": "androidx.annotation",
                  "artifactId": "annotation",
                  "version": "1.1.0",
                  "ktxTargets": [],
                  "fqcns": ["androidx.annotation.AnimRes", "androidx.annotation.Fake"]
                }
              ]
            }"#,
        );

        assert_eq!(
            lookup.class_name_map,
            HashMap::from([
                (
                    "ComponentActivity".to_string(),
                    vec![data(
                        "androidx.activity:activity",
                        "androidx.activity.ComponentActivity",
                        "androidx.activity",
                        "1.1.0"
                    )]
                ),
                (
                    "Fake".to_string(),
                    vec![
                        data(
                            "androidx.activity:activity",
                            "androidx.activity.Fake",
                            "androidx.activity",
                            "1.1.0"
                        ),
                        data(
                            "androidx.annotation:annotation",
                            "androidx.annotation.Fake",
                            "androidx.annotation",
                            "1.1.0"
                        ),
                    ]
                ),
                (
                    "AnimRes".to_string(),
                    vec![data(
                        "androidx.annotation:annotation",
                        "androidx.annotation.AnimRes",
                        "androidx.annotation",
                        "1.1.0"
                    )]
                ),
            ])
        );
        assert_eq!(
            lookup.ktx_map,
            HashMap::from([(
                "androidx.activity:activity".to_string(),
                "androidx.activity:activity-ktx".to_string()
            )])
        );
    }

    #[test]
    fn parse_index_without_index_key_is_empty() {
        let lookup = parse_index(br#"{"Indices":[]}"#);

        assert_eq!(lookup, RegistryLookup::default());
    }

    #[test]
    fn parse_index_of_invalid_json_is_empty() {
        let lookup = parse_index(b"not json at all");

        assert_eq!(lookup, RegistryLookup::default());
    }

    #[test]
    fn parse_index_drops_records_missing_mandatory_fields() {
        let lookup = parse_index(
            br#"{
              "Index": [
                {"artifactId":"no-group","version":"1","ktxTargets":[],"fqcns":["p.A"]},
                {"groupId":"g","version":"1","ktxTargets":[],"fqcns":["p.B"]},
                {"groupId":"g","artifactId":"no-version","ktxTargets":["g:base"],"fqcns":["p.C"]},
                {"groupId":"g","artifactId":"no-fqcns","version":"1","ktxTargets":["g:base"]},
                {"groupId":"g","artifactId":"no-ktx","version":"1","fqcns":["p.D"]},
                {"groupId":"g","artifactId":"valid","version":"2","ktxTargets":[],"fqcns":["p.E"]}
              ]
            }"#,
        );

        assert_eq!(
            lookup.class_name_map,
            HashMap::from([("E".to_string(), vec![data("g:valid", "p.E", "p", "2")])])
        );
        assert!(lookup.ktx_map.is_empty());
        assert_eq!(lookup.coordinates.len(), 1);
    }

    #[test]
    fn parse_index_reads_top_level_and_extension_functions() {
        let lookup = parse_index(
            br#"{
              "Index": [
                {
                  "groupId": "group1",
                  "artifactId": "artifact1",
                  "version": "1",
                  "ktxTargets": [],
                  "fqcns": ["class1"]
                },
                {
                  "groupId": "group3",
                  "artifactId": "artifact3",
                  "version": "1",
                  "ktxTargets": [],
                  "fqcns": ["class3"],
                  "ktlfns": [
                    {"fqn": "FacadeFileKt.someFqn", "unrecognized": "should be ignored"},
                    {"has_no_fqn": "should be ignored"},
                    {"fqn": "noFacade"},
                    {"xfqn": "foo.bar.baz.FacadeFileKt.someExtensionFunction", "rcvr": "amazingReceiver"},
                    {"xfqn": "foo.bar.baz.FacadeFileKt.missingReceiver"}
                  ]
                }
              ]
            }"#,
        );

        assert_eq!(
            lookup.top_level_functions_map,
            HashMap::from([(
                "someFqn".to_string(),
                vec![data("group3:artifact3", "someFqn", "", "1")]
            )])
        );
        assert_eq!(
            lookup.extension_functions_map,
            HashMap::from([(
                FunctionSpecifier::new("someExtensionFunction", "amazingReceiver"),
                vec![data(
                    "group3:artifact3",
                    "foo.bar.baz.someExtensionFunction",
                    "foo.bar.baz",
                    "1"
                )]
            )])
        );
    }

    #[test]
    fn parse_index_ignores_malformed_function_list() {
        let lookup = parse_index(
            br#"{"Index":[{"groupId":"g","artifactId":"a","version":"1","ktxTargets":[],"fqcns":["p.C"],"ktlfns":"oops"}]}"#,
        );

        assert_eq!(lookup.class_name_map.len(), 1);
        assert!(lookup.top_level_functions_map.is_empty());
    }

    #[test]
    fn parse_index_skips_unknown_keys() {
        let lookup = parse_index(
            br#"{
              "UnKnown1": [],
              "UnKnown2": [{"a": "", "b": ""}],
              "Index": [
                {
                  "groupId": "androidx.activity",
                  "artifactId": "activity",
                  "version": "1.1.0",
                  "ktxTargets": [],
                  "unKnown3": "unknown content",
                  "fqcns": ["androidx.activity.ComponentActivity"]
                }
              ],
              "UnKnown6": "unknown content"
            }"#,
        );

        assert_eq!(lookup.class_name_map.len(), 1);
        assert!(lookup.class_name_map.contains_key("ComponentActivity"));
    }

    #[test]
    fn parse_index_collects_indexed_packages() {
        let lookup = parse_index(
            br#"{
              "Index": [
                {"groupId":"g1","artifactId":"a1","version":"1","ktxTargets":[],"fqcns":["com.example.class1"]},
                {"groupId":"g2","artifactId":"a2","version":"1","ktxTargets":[],"fqcns":[],
                 "ktlfns":[{"xfqn":"com.example2.toplevel.FacadeFileKt.ext","rcvr":"R"}]}
              ]
            }"#,
        );

        let mut packages: Vec<_> = lookup.indexed_packages.iter().cloned().collect();
        packages.sort();
        assert_eq!(packages, vec!["com.example", "com.example2.toplevel"]);
    }

    #[test]
    fn parse_index_maps_kmp_platform_artifacts_to_base() {
        let lookup = parse_index(
            br#"{
              "Index": [
                {"groupId":"androidx.activity","artifactId":"activity","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.activity","artifactId":"activity-android","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.activity","artifactId":"activity-desktop","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.activity","artifactId":"activity-jvmstubs","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.activity","artifactId":"activity-linuxx64stubs","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.activity","artifactId":"activity-unknownsuffix","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.artifact.without.base","artifactId":"foo-desktop","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.different.version","artifactId":"foo","version":"1.1.0","ktxTargets":[],"fqcns":[]},
                {"groupId":"androidx.different.version","artifactId":"foo-desktop","version":"1.2.0","ktxTargets":[],"fqcns":[]}
              ]
            }"#,
        );

        let base = Some("androidx.activity:activity".to_string());
        assert_eq!(
            lookup.kmp_artifact_map,
            HashMap::from([
                ("androidx.activity:activity-android".to_string(), base.clone()),
                ("androidx.activity:activity-desktop".to_string(), base.clone()),
                ("androidx.activity:activity-jvmstubs".to_string(), base.clone()),
                ("androidx.activity:activity-linuxx64stubs".to_string(), base),
                ("androidx.different.version:foo-desktop".to_string(), None),
            ])
        );
    }
}
