//! `$ref` resolution, local and cross-file.
//!
//! A reference is one of `"file.json#/definitions/Foo"`, `"#/parameters/Bar"`,
//! or a bare relative file path. Pointer lookup is an explicit walk over the
//! pointer's slash-delimited segments; the path is never evaluated as code.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::SpecError;
use crate::loader::{join_spec_path, parent_dir, DocumentCache};

/// A reference split into its file and local-pointer parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// Relative path or URL of the target document, if any.
    pub file_path: Option<String>,
    /// Local JSON pointer (e.g. `"#/definitions/Foo"`), if any.
    pub pointer: Option<String>,
}

/// Split a reference string on `#` into file and pointer segments.
pub fn parse_reference(reference: &str) -> Result<ParsedReference, SpecError> {
    if reference.trim().is_empty() {
        return Err(SpecError::Internal {
            message: "reference cannot be an empty string".to_string(),
        });
    }

    match reference.find('#') {
        Some(idx) => {
            let (file, pointer) = reference.split_at(idx);
            Ok(ParsedReference {
                file_path: if file.is_empty() {
                    None
                } else {
                    Some(file.to_string())
                },
                pointer: Some(pointer.to_string()),
            })
        }
        // A bare relative file path.
        None => Ok(ParsedReference {
            file_path: Some(reference.to_string()),
            pointer: None,
        }),
    }
}

/// Walk a JSON pointer through a document.
///
/// Segments are unescaped per RFC 6901 (`~1` is `/`, `~0` is `~`) and looked
/// up as object keys or array indices. A missing segment fails with
/// `ObjectNotFound` naming the full reference and the document searched.
pub fn walk_pointer<'a>(
    doc: &'a Value,
    pointer: &str,
    reference: &str,
    document: &str,
) -> Result<&'a Value, SpecError> {
    let path = pointer.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(doc);
    }

    let mut current = doc;
    for segment in path.split('/') {
        let key = segment.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Object(map) => map.get(&key),
            Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| SpecError::ObjectNotFound {
            reference: reference.to_string(),
            document: document.to_string(),
        })?;
    }
    Ok(current)
}

/// Resolves references against a spec document, loading other documents
/// through the shared cache as needed.
#[derive(Debug, Clone)]
pub struct RefResolver<'a> {
    cache: &'a DocumentCache,
    spec_path: &'a str,
    spec_dir: &'a str,
}

impl<'a> RefResolver<'a> {
    pub fn new(cache: &'a DocumentCache, spec_path: &'a str, spec_dir: &'a str) -> Self {
        RefResolver {
            cache,
            spec_path,
            spec_dir,
        }
    }

    /// Resolve a reference to the object it names, cloning it out of its
    /// document. `current` is the document the reference appears in.
    pub fn resolve(&self, reference: &str, current: &Value) -> Result<Value, SpecError> {
        let (value, _) = self.resolve_with_context(reference, current)?;
        Ok(value)
    }

    /// Like [`resolve`](Self::resolve), but also returns the path of the
    /// document the object was found in, so the caller can keep resolving
    /// nested references in that document's context.
    pub fn resolve_with_context(
        &self,
        reference: &str,
        current: &Value,
    ) -> Result<(Value, String), SpecError> {
        let parsed = parse_reference(reference)?;

        match parsed.file_path {
            Some(file) => {
                let full_path = join_spec_path(self.spec_dir, &file);
                let doc = self.cache.load(&full_path)?;
                let value = match parsed.pointer {
                    Some(pointer) => walk_pointer(&doc, &pointer, reference, &full_path)?.clone(),
                    None => (*doc).clone(),
                };
                Ok((value, full_path))
            }
            None => {
                let pointer = parsed.pointer.unwrap_or_default();
                let value = walk_pointer(current, &pointer, reference, self.spec_path)?.clone();
                Ok((value, self.spec_path.to_string()))
            }
        }
    }

    pub fn cache(&self) -> &'a DocumentCache {
        self.cache
    }

    pub fn spec_path(&self) -> &str {
        self.spec_path
    }
}

/// Inline every cross-document `$ref` in `value`, in place.
///
/// Local pointers in the root document stay as they are; they keep resolving
/// against the document itself. Fragments pulled in from another document are
/// dereferenced deeply, including their own local pointers, since those would
/// dangle once the fragment is relocated. `x-ms-examples` entries are left
/// untouched; example files load lazily at validation time.
pub fn inline_external_refs(
    value: &mut Value,
    doc_path: &str,
    cache: &DocumentCache,
) -> Result<(), SpecError> {
    let mut in_flight = HashSet::new();
    inline_refs(value, doc_path, cache, false, &mut in_flight)
}

fn inline_refs(
    value: &mut Value,
    doc_path: &str,
    cache: &DocumentCache,
    inline_local: bool,
    in_flight: &mut HashSet<String>,
) -> Result<(), SpecError> {
    let reference = match &*value {
        Value::Object(map) => map.get("$ref").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    if let Some(reference) = reference {
        let parsed = parse_reference(&reference)?;
        if parsed.file_path.is_some() || inline_local {
            let key = format!("{doc_path}|{reference}");
            // A reference already on the inlining stack is cyclic; it stays
            // a `$ref` rather than expanding forever.
            if !in_flight.insert(key.clone()) {
                return Ok(());
            }
            let (target_path, mut fragment) = match parsed.file_path {
                Some(file) => {
                    let full = join_spec_path(&parent_dir(doc_path), &file);
                    let doc = cache.load(&full)?;
                    let fragment = match &parsed.pointer {
                        Some(pointer) => walk_pointer(&doc, pointer, &reference, &full)?.clone(),
                        None => (*doc).clone(),
                    };
                    (full, fragment)
                }
                None => {
                    let doc = cache.load(doc_path)?;
                    let pointer = parsed.pointer.unwrap_or_default();
                    let fragment = walk_pointer(&doc, &pointer, &reference, doc_path)?.clone();
                    (doc_path.to_string(), fragment)
                }
            };
            inline_refs(&mut fragment, &target_path, cache, true, in_flight)?;
            in_flight.remove(&key);
            *value = fragment;
            return Ok(());
        }
    }

    match value {
        Value::Object(map) => {
            for (name, child) in map.iter_mut() {
                if name == "x-ms-examples" {
                    continue;
                }
                inline_refs(child, doc_path, cache, inline_local, in_flight)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                inline_refs(item, doc_path, cache, inline_local, in_flight)?;
            }
        }
        _ => {}
    }
    Ok(())
}
