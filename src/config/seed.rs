use std::borrow::Cow;

use hashlink::LinkedHashMap;
use saphyr::{Scalar, Yaml};
use tracing::warn;

/// Initial tree to populate a store with.
///
/// In YAML a mapping is a directory, a string is a file holding that text and
/// a null is an empty file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedNode {
    Directory(Vec<(String, SeedNode)>),
    File(String),
}

impl SeedNode {
    /// The sample tree used when no seed is configured.
    pub fn demo() -> Self {
        fn file(path: &str) -> SeedNode {
            SeedNode::File(format!("Contents of {path}"))
        }
        fn dir(children: Vec<(&str, SeedNode)>) -> SeedNode {
            SeedNode::Directory(
                children
                    .into_iter()
                    .map(|(name, node)| (name.to_string(), node))
                    .collect(),
            )
        }

        dir(vec![
            (
                "a",
                dir(vec![
                    ("c", dir(vec![("e", file("/a/c/e"))])),
                    ("d", file("/a/d")),
                    ("f", dir(vec![])),
                ]),
            ),
            ("b", file("/b")),
            ("c", dir(vec![])),
        ])
    }

    pub fn from_yaml_mapping(mapping: &LinkedHashMap<Yaml, Yaml>) -> Self {
        let children = mapping
            .iter()
            .filter_map(|(key, value)| {
                let name = match key {
                    Yaml::Value(Scalar::String(name)) if valid_name(name) => name.to_string(),
                    _ => {
                        warn!("Skipping seed entry with invalid name: {:?}", key);
                        return None;
                    }
                };
                match Self::from_yaml_value(value) {
                    Some(node) => Some((name, node)),
                    None => {
                        warn!("Skipping seed entry '{}': unsupported value {:?}", name, value);
                        None
                    }
                }
            })
            .collect();
        SeedNode::Directory(children)
    }

    fn from_yaml_value(value: &Yaml) -> Option<Self> {
        match value {
            Yaml::Mapping(mapping) => Some(Self::from_yaml_mapping(mapping)),
            Yaml::Value(Scalar::String(text)) => Some(SeedNode::File(text.to_string())),
            Yaml::Value(Scalar::Null) => Some(SeedNode::File(String::new())),
            _ => None,
        }
    }
}

fn valid_name(name: &Cow<'_, str>) -> bool {
    !name.is_empty() && !name.contains('/')
}
