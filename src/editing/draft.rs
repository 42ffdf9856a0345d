use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::size::SlotSizeMap;

/// Schema version written into every persisted draft.
pub const DRAFT_VERSION: u32 = 1;

/// Fields excluded from dirtiness comparison.
const VOLATILE_FIELDS: [&str; 2] = ["updatedAt", "version"];

/// Current time in the ISO-8601 form drafts carry, e.g. `2024-05-01T12:00:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A slot edit as persisted locally and sent on publish.
///
/// Every field is optional: a draft only records what differs, and
/// [`normalize_draft`] fills the rest in from the base state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditableDraft {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<SlotSizeMap>,
    #[serde(rename = "propsJSON", skip_serializing_if = "Option::is_none")]
    pub props_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Default for EditableDraft {
    fn default() -> Self {
        Self {
            version: DRAFT_VERSION,
            editable_id: None,
            slot_key: None,
            variant: None,
            sizes: None,
            props_json: None,
            updated_at: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn props_value(value: Option<&Value>) -> Option<Value> {
    value
        .filter(|v| matches!(v, Value::Object(_) | Value::Array(_)))
        .cloned()
}

impl EditableDraft {
    /// Drop blank strings, empty size entries and non-object props.
    pub fn sanitized(&self) -> EditableDraft {
        EditableDraft {
            version: DRAFT_VERSION,
            editable_id: non_blank(&self.editable_id),
            slot_key: non_blank(&self.slot_key),
            variant: non_blank(&self.variant),
            sizes: self.sizes.as_ref().and_then(SlotSizeMap::sanitized),
            props_json: props_value(self.props_json.as_ref()),
            updated_at: non_blank(&self.updated_at),
        }
    }

    /// Lenient read of a stored draft: unusable fields are ignored, and a
    /// draft written under another schema version is rejected outright.
    pub fn from_stored(value: &Value) -> Option<EditableDraft> {
        let object = value.as_object()?;
        if let Some(version) = object.get("version") {
            if version.as_u64() != Some(u64::from(DRAFT_VERSION)) {
                return None;
            }
        }
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let sizes = object
            .get("sizes")
            .and_then(|raw| serde_json::from_value::<SlotSizeMap>(raw.clone()).ok());
        let props = object.get("propsJSON").or_else(|| object.get("props"));

        let draft = EditableDraft {
            version: DRAFT_VERSION,
            editable_id: text("editableId"),
            slot_key: text("slotKey"),
            variant: text("variant"),
            sizes,
            props_json: props_value(props),
            updated_at: text("updatedAt"),
        };
        Some(draft.sanitized())
    }

    /// Canonical form used to decide dirtiness.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut value = serde_json::to_value(self.sanitized()).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            for field in VOLATILE_FIELDS {
                map.remove(field);
            }
        }
        Fingerprint::of(stable_stringify(&value))
    }
}

/// Layer `candidate` over `base`, field by field, after sanitizing both.
///
/// The timestamp comes from the candidate, then the base, then the clock.
pub fn normalize_draft(base: &EditableDraft, candidate: &EditableDraft) -> EditableDraft {
    let base = base.sanitized();
    let candidate = candidate.sanitized();
    EditableDraft {
        version: DRAFT_VERSION,
        editable_id: candidate.editable_id.or(base.editable_id),
        slot_key: candidate.slot_key.or(base.slot_key),
        variant: candidate.variant.or(base.variant),
        sizes: candidate.sizes.or(base.sizes),
        props_json: candidate.props_json.or(base.props_json),
        updated_at: candidate
            .updated_at
            .or(base.updated_at)
            .or_else(|| Some(timestamp_now())),
    }
}

/// JSON text with object keys sorted at every depth.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(item) = map.get(key) {
                    write_stable(item, out);
                }
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Stable text of a draft plus its blake3 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    canonical: String,
    digest: String,
}

impl Fingerprint {
    pub fn of(canonical: String) -> Self {
        let digest = blake3::hash(canonical.as_bytes()).to_hex().to_string();
        Self { canonical, digest }
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::Breakpoint;
    use crate::size::PartialSize;
    use serde_json::json;

    fn base() -> EditableDraft {
        EditableDraft {
            editable_id: Some("hero-1".into()),
            slot_key: Some("hero.banner".into()),
            variant: Some("default".into()),
            ..EditableDraft::default()
        }
    }

    #[test]
    fn stable_stringify_sorts_keys_at_every_depth() {
        let a = json!({"b": 1, "a": {"z": [1, {"y": 2, "x": 1}], "c": "s"}});
        assert_eq!(
            stable_stringify(&a),
            r#"{"a":{"c":"s","z":[1,{"x":1,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn fingerprint_ignores_timestamp_and_version() {
        let mut stamped = base();
        stamped.updated_at = Some("2024-01-01T00:00:00.000Z".into());
        stamped.version = 7;
        assert_eq!(stamped.fingerprint(), base().fingerprint());

        let mut changed = base();
        changed.variant = Some("tall".into());
        assert_ne!(changed.fingerprint().digest(), base().fingerprint().digest());
    }

    #[test]
    fn normalize_fills_missing_fields_from_base() {
        let candidate = EditableDraft {
            sizes: Some(
                SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().block("30rem")),
            ),
            variant: Some(String::new()),
            ..EditableDraft::default()
        };
        let merged = normalize_draft(&base(), &candidate);
        assert_eq!(merged.variant.as_deref(), Some("default"));
        assert_eq!(merged.editable_id.as_deref(), Some("hero-1"));
        assert!(merged.sizes.is_some());
        assert!(merged.updated_at.is_some());
    }

    #[test]
    fn stored_drafts_are_read_leniently() {
        let stored = json!({
            "version": 1,
            "editableId": "hero-1",
            "variant": "",
            "sizes": {"md": {"inline": "40rem"}, "huge": {"inline": "1rem"}},
            "propsJSON": "not an object",
            "updatedAt": "2024-02-02T00:00:00.000Z"
        });
        let draft = EditableDraft::from_stored(&stored).unwrap();
        assert_eq!(draft.variant, None);
        assert_eq!(draft.props_json, None);
        assert_eq!(draft.sizes.unwrap().len(), 1);

        assert!(EditableDraft::from_stored(&json!({"version": 2})).is_none());
        assert!(EditableDraft::from_stored(&json!([1, 2])).is_none());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let draft = EditableDraft {
            props_json: Some(json!({"title": "Hi"})),
            ..base()
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["propsJSON"], json!({"title": "Hi"}));
        assert_eq!(value["slotKey"], json!("hero.banner"));
        assert_eq!(value["version"], json!(1));
    }
}
