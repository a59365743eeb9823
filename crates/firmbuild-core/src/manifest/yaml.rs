//! Raw manifest document handling
//!
//! Loading happens in two steps before any rule is built:
//! 1. parse the YAML and apply `<<` merge keys
//! 2. resolve `key+` / `key-` postfix keys inside every folder mapping

use std::collections::BTreeSet;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::ManifestError;

/// Parse a manifest document and resolve merges and postfixes
pub fn load_document(path: &Path, content: &str) -> Result<Mapping, ManifestError> {
    let mut doc: Value = serde_yaml::from_str(content).map_err(|source| ManifestError::Yaml {
        file: path.to_path_buf(),
        source,
    })?;
    doc.apply_merge().map_err(|source| ManifestError::Yaml {
        file: path.to_path_buf(),
        source,
    })?;

    let mapping = match doc {
        Value::Null => Mapping::new(),
        Value::Mapping(m) => m,
        _ => return Err(ManifestError::invalid(path, "top level must be a mapping")),
    };

    let mut resolved = Mapping::new();
    for (key, value) in mapping {
        let Some(folder) = key.as_str() else {
            return Err(ManifestError::invalid(path, format!("folder key must be a string, got {:?}", key)));
        };

        if folder.starts_with('.') {
            continue;
        }

        let value = match value {
            Value::Mapping(rule) => Value::Mapping(resolve_postfixes(path, folder, rule)?),
            Value::Null => Value::Null,
            other => {
                return Err(ManifestError::invalid(
                    path,
                    format!("rule of folder \"{}\" must be a mapping, got {:?}", folder, other),
                ))
            }
        };
        resolved.insert(key, value);
    }

    Ok(resolved)
}

/// Apply `key+` / `key-` entries onto their base keys
pub fn resolve_postfixes(path: &Path, folder: &str, rule: Mapping) -> Result<Mapping, ManifestError> {
    let mut updated = Mapping::new();
    let mut postfixed = Vec::new();

    for (key, value) in rule {
        match key.as_str().and_then(split_postfix) {
            Some((base, op)) => postfixed.push((base.to_string(), op, value)),
            None => {
                updated.insert(key, value);
            }
        }
    }

    for (base, op, value) in postfixed {
        let entries = as_sequence(path, folder, &format!("{}{}", base, op), value)?;
        let base_key = Value::String(base.clone());
        let current = match updated.remove(&base_key) {
            Some(v) => as_sequence(path, folder, &base, v)?,
            None => Vec::new(),
        };
        updated.insert(base_key, Value::Sequence(apply_postfix(current, entries, op)));
    }

    Ok(updated)
}

fn split_postfix(key: &str) -> Option<(&str, char)> {
    let op = key.chars().last()?;
    if op == '+' || op == '-' {
        Some((&key[..key.len() - 1], op))
    } else {
        None
    }
}

fn as_sequence(path: &Path, folder: &str, key: &str, value: Value) -> Result<Vec<Value>, ManifestError> {
    match value {
        Value::Sequence(seq) => Ok(seq),
        Value::Null => Ok(Vec::new()),
        other => Err(ManifestError::invalid(
            path,
            format!("\"{}\" of folder \"{}\" must be a list, got {:?}", key, folder, other),
        )),
    }
}

fn if_key(value: &Value) -> Option<String> {
    let stmt = value.as_mapping()?.get("if")?;
    Some(match stmt.as_str() {
        Some(s) => s.chars().filter(|c| !c.is_whitespace()).collect(),
        None => format!("{:?}", stmt),
    })
}

fn apply_postfix(current: Vec<Value>, entries: Vec<Value>, op: char) -> Vec<Value> {
    let mut if_entries = Vec::new();
    let mut other_entries = Vec::new();
    let mut strings = BTreeSet::new();

    for entry in current {
        if if_key(&entry).is_some() {
            if_entries.push(entry);
        } else if entry.is_mapping() {
            other_entries.push(entry);
        } else {
            strings.insert(scalar_string(entry));
        }
    }

    for entry in entries {
        if let Some(key) = if_key(&entry) {
            if_entries.retain(|existing| if_key(existing).as_deref() != Some(key.as_str()));
            if op == '+' {
                if_entries.push(entry);
            }
        } else if entry.is_mapping() {
            if op == '+' {
                other_entries.push(entry);
            } else {
                other_entries.retain(|existing| existing != &entry);
            }
        } else if op == '+' {
            strings.insert(scalar_string(entry));
        } else {
            strings.remove(&scalar_string(entry));
        }
    }

    if_entries
        .into_iter()
        .chain(other_entries)
        .chain(strings.into_iter().map(Value::String))
        .collect()
}

fn scalar_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(content: &str) -> Mapping {
        load_document(Path::new("test.yml"), content).unwrap()
    }

    fn strings(doc: &Mapping, folder: &str, key: &str) -> Vec<String> {
        doc[folder][key]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_anchor_keys_skipped_and_merged() {
        let doc = load(
            r#"
.base: &base
  depends_components:
    - soc
foo:
  <<: *base
  disable:
    - if: IDF_TARGET == "esp32"
"#,
        );
        assert_eq!(doc.len(), 1);
        assert_eq!(strings(&doc, "foo", "depends_components"), vec!["soc"]);
        assert!(doc["foo"]["disable"].is_sequence());
    }

    #[test]
    fn test_postfix_strings() {
        let doc = load(
            r#"
.base: &base
  depends_components:
    - soc
    - esp_wifi
foo:
  <<: *base
  depends_components+:
    - bt
    - soc
  depends_components-:
    - esp_wifi
    - not_there
"#,
        );
        assert_eq!(strings(&doc, "foo", "depends_components"), vec!["bt", "soc"]);
        assert!(doc["foo"].get("depends_components+").is_none());
    }

    #[test]
    fn test_postfix_without_base() {
        let doc = load(
            r#"
foo:
  depends_filepatterns+:
    - "b/**"
    - "a/**"
"#,
        );
        assert_eq!(strings(&doc, "foo", "depends_filepatterns"), vec!["a/**", "b/**"]);
    }

    #[test]
    fn test_postfix_replaces_matching_if() {
        let doc = load(
            r#"
.base: &base
  disable:
    - if: IDF_TARGET == "esp32"
      reason: old
    - if: IDF_TARGET == "esp32c3"
foo:
  <<: *base
  disable+:
    - if: IDF_TARGET=="esp32"
      reason: new
  disable-:
    - if: IDF_TARGET == "esp32c3"
"#,
        );
        let disable = doc["foo"]["disable"].as_sequence().unwrap();
        assert_eq!(disable.len(), 1);
        assert_eq!(disable[0]["reason"].as_str(), Some("new"));
    }

    #[test]
    fn test_postfix_result_order() {
        let doc = load(
            r#"
foo:
  depends_components:
    - default: ["d"]
  depends_components+:
    - if: IDF_TARGET == "esp32"
      content: ["a"]
"#,
        );
        let deps = doc["foo"]["depends_components"].as_sequence().unwrap();
        assert!(deps[0].get("if").is_some());
        assert!(deps[1].get("default").is_some());
    }

    #[test]
    fn test_empty_and_invalid_documents() {
        assert!(load("").is_empty());
        assert!(load_document(Path::new("x.yml"), "- a\n- b\n").is_err());
        assert!(load_document(Path::new("x.yml"), "foo: [1, 2]\n").is_err());
        assert!(matches!(
            load_document(Path::new("x.yml"), "foo: {bar: [\n"),
            Err(ManifestError::Yaml { .. })
        ));
    }
}
