//! Append-only metadata merging.
//!
//! Record metadata accumulates provider diagnostics across callback and
//! poll cycles without schema migration. Updates must merge into the
//! existing map; a patch never discards keys it does not mention.

use serde_json::{Map, Value};

/// Merge `patch` into `base`, returning the merged value.
///
/// Objects merge recursively; scalars and arrays in the patch replace the
/// base value at the same key. Persisted patches go through Postgres
/// `jsonb ||`, which merges top-level keys only, so writers use this to
/// pre-merge a nested object before patching its key.
pub fn merge_metadata(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged: Map<String, Value> = a.clone();
            for (key, value) in b {
                let entry = merged
                    .get(key)
                    .map(|existing| merge_metadata(existing, value))
                    .unwrap_or_else(|| value.clone());
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        // A non-object base (including null) is replaced wholesale.
        (_, patch) => patch.clone(),
    }
}
