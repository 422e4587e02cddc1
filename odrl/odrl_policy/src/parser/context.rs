//! `@context` reading.

use serde_json::{Map, Value as JsonValue};

use crate::error::ParseError;
use crate::vocab::{ContextEntry, Iri};

/// Read a `@context` value into dictionary entries.
///
/// Within one context object, terms mapped to absolute IRIs come first so
/// that compact IRIs in the same object can use them as prefixes; `@vocab`
/// comes last.
pub(crate) fn read_context(value: &JsonValue, path: &str) -> Result<Vec<ContextEntry>, ParseError> {
    let mut entries = Vec::new();

    match value {
        JsonValue::Null => {}
        JsonValue::String(iri) => entries.push(ContextEntry::Remote(Iri::new(iri.as_str()))),
        JsonValue::Object(map) => entries.extend(read_context_object(map, path)?),
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match item {
                    JsonValue::Null => {}
                    JsonValue::String(iri) => {
                        entries.push(ContextEntry::Remote(Iri::new(iri.as_str())))
                    }
                    JsonValue::Object(map) => entries.extend(read_context_object(map, &item_path)?),
                    _ => {
                        return Err(ParseError::InvalidField {
                            path: item_path,
                            reason: "expected a context IRI or object".to_string(),
                        })
                    }
                }
            }
        }
        _ => {
            return Err(ParseError::InvalidField {
                path: path.to_string(),
                reason: "expected a context IRI, object or array".to_string(),
            })
        }
    }

    Ok(entries)
}

fn read_context_object(
    map: &Map<String, JsonValue>,
    path: &str,
) -> Result<Vec<ContextEntry>, ParseError> {
    let mut absolute = Vec::new();
    let mut relative = Vec::new();
    let mut vocab = None;

    for (key, value) in map {
        let entry_path = format!("{}.{}", path, key);

        if key == "@vocab" {
            vocab = Some(match value {
                JsonValue::Null => ContextEntry::Vocab(None),
                JsonValue::String(v) => ContextEntry::Vocab(Some(v.clone())),
                _ => {
                    return Err(ParseError::InvalidField {
                        path: entry_path,
                        reason: "@vocab must be a string or null".to_string(),
                    })
                }
            });
            continue;
        }

        // Other keywords (@version, @base, @language, @protected) do not
        // affect term resolution.
        if key.starts_with('@') {
            continue;
        }

        let iri = match value {
            JsonValue::Null => None,
            JsonValue::String(v) => Some(v.clone()),
            JsonValue::Object(definition) => match definition.get("@id") {
                Some(JsonValue::String(v)) => Some(v.clone()),
                Some(JsonValue::Null) => None,
                // A definition without @id only adds coercion rules
                None => continue,
                Some(_) => {
                    return Err(ParseError::InvalidField {
                        path: format!("{}.@id", entry_path),
                        reason: "@id must be a string or null".to_string(),
                    })
                }
            },
            _ => {
                return Err(ParseError::InvalidField {
                    path: entry_path,
                    reason: "expected a term definition".to_string(),
                })
            }
        };

        let is_absolute = iri
            .as_deref()
            .map(|v| v.contains("://") || v.starts_with("urn:"))
            .unwrap_or(true);
        let entry = ContextEntry::Term {
            name: key.clone(),
            iri,
        };
        if is_absolute {
            absolute.push(entry);
        } else {
            relative.push(entry);
        }
    }

    absolute.extend(relative);
    absolute.extend(vocab);
    Ok(absolute)
}
