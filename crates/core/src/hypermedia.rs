//! Hypermedia link resolution over decoded payloads.
//!
//! The release-service API exposes related resources as sibling fields
//! named `<relation>_url`. [`resolve_links`] collects those into a
//! `links: { relation: url }` map on the same object so the typed-entity
//! layer can deserialize relations from one place. Source fields are kept.
//!
//! Resolution is idempotent: running it on an already-resolved payload
//! recomputes every `links` map from the untouched `_url` fields.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::types::LinkMap;

/// Field suffix marking a hypermedia link.
pub const URL_SUFFIX: &str = "_url";

/// Name of the synthesized link map field.
pub const LINKS_FIELD: &str = "links";

/// Relation name for a `<relation>_url` key, or `None` when the key is not
/// a link. A bare `_url` key has an empty relation and is not a link.
pub fn relation_name(key: &str) -> Option<&str> {
    key.strip_suffix(URL_SUFFIX)
        .filter(|relation| !relation.is_empty())
}

/// Resolve links in place across the whole payload tree.
pub fn resolve_links(payload: &mut Value) {
    match payload {
        Value::Array(items) => items.iter_mut().for_each(resolve_links),
        Value::Object(object) => resolve_object(object),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Owned variant of [`resolve_links`].
pub fn resolved(mut payload: Value) -> Value {
    resolve_links(&mut payload);
    payload
}

fn resolve_object(object: &mut Map<String, Value>) {
    // Children first, so a link whose target is itself an object copies the
    // resolved form and stays equal to its source field.
    for value in object.values_mut() {
        resolve_links(value);
    }

    let links: Map<String, Value> = object
        .iter()
        .filter_map(|(key, value)| {
            relation_name(key).map(|relation| (relation.to_string(), value.clone()))
        })
        .collect();

    if !links.is_empty() {
        object.insert(LINKS_FIELD.to_string(), Value::Object(links));
    }
}

/// Deserialize a resolved `links` map into [`LinkMap`], keeping only
/// relations whose target is a string. A `null` map reads as empty.
///
/// Resolution copies `_url` values verbatim, so a relation the server
/// sends as `null` shows up here too; it has no URL to follow.
pub fn string_links<'de, D>(deserializer: D) -> Result<LinkMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .flatten()
        .filter_map(|(relation, target)| match target {
            Value::String(url) => Some((relation, url)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relation_name_strips_suffix() {
        assert_eq!(relation_name("buildScripts_url"), Some("buildScripts"));
        assert_eq!(relation_name("a_url"), Some("a"));
    }

    #[test]
    fn bare_suffix_is_not_a_link() {
        assert_eq!(relation_name("_url"), None);
        assert_eq!(resolved(json!({"_url": "x"})), json!({"_url": "x"}));
    }

    #[test]
    fn suffix_must_be_at_the_end() {
        assert_eq!(relation_name("url_builder"), None);
        assert_eq!(relation_name("my_urls"), None);
        assert_eq!(relation_name("url"), None);
    }

    #[test]
    fn end_to_end_execution_payload() {
        let payload = json!({
            "id": "e1",
            "buildScripts_url": "/api/v1/executions/e1/scripts",
            "status": "QUEUED",
        });

        let expected = json!({
            "id": "e1",
            "buildScripts_url": "/api/v1/executions/e1/scripts",
            "status": "QUEUED",
            "links": { "buildScripts": "/api/v1/executions/e1/scripts" },
        });

        assert_eq!(resolved(payload), expected);
    }

    #[test]
    fn arrays_resolve_each_element_independently() {
        let payload = json!([{"a_url": "x"}, {"b_url": "y"}]);
        let expected = json!([
            {"a_url": "x", "links": {"a": "x"}},
            {"b_url": "y", "links": {"b": "y"}},
        ]);
        assert_eq!(resolved(payload), expected);
    }

    #[test]
    fn objects_without_links_get_no_links_field() {
        let payload = json!({"id": "c1", "name": "International"});
        let result = resolved(payload.clone());
        assert_eq!(result, payload);
        assert!(result.get(LINKS_FIELD).is_none());
    }

    #[test]
    fn scalars_pass_through() {
        for scalar in [json!("text_url"), json!(42), json!(true), json!(null)] {
            assert_eq!(resolved(scalar.clone()), scalar);
        }
    }

    #[test]
    fn nested_objects_resolve_at_their_own_level() {
        let payload = json!({
            "id": "b1",
            "url": "/builds/b1",
            "config": { "id": "cfg", "packages_url": "/builds/b1/packages" },
        });

        let result = resolved(payload);

        assert!(result.get(LINKS_FIELD).is_none(), "no links merged upward");
        assert_eq!(
            result["config"][LINKS_FIELD],
            json!({"packages": "/builds/b1/packages"})
        );
    }

    #[test]
    fn link_to_an_object_equals_its_resolved_source() {
        let payload = json!({
            "parent_url": { "self_url": "/centers/c1" },
        });

        let result = resolved(payload);

        assert_eq!(result["links"]["parent"], result["parent_url"]);
        assert_eq!(result["parent_url"]["links"], json!({"self": "/centers/c1"}));
    }

    #[test]
    fn existing_links_field_is_overwritten_when_links_found() {
        let payload = json!({"links": {"stale": "/old"}, "fresh_url": "/new"});
        let result = resolved(payload);
        assert_eq!(result["links"], json!({"fresh": "/new"}));
    }

    #[test]
    fn existing_links_field_is_kept_when_no_links_found() {
        let payload = json!({"links": {"kept": "/here"}});
        assert_eq!(resolved(payload.clone()), payload);
    }

    #[test]
    fn resolution_is_idempotent() {
        let payload = json!({
            "id": "p1",
            "builds_url": "/products/p1/builds",
            "children": [
                {"id": "b1", "executions_url": "/builds/b1/executions", "n": 1},
                "plain",
                [ {"deep_url": "/deep"} ],
            ],
            "_url": "ignored",
        });

        let once = resolved(payload);
        let twice = resolved(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn links_field_is_appended_after_source_fields() {
        let result = resolved(json!({"self_url": "/x", "name": "n"}));
        let keys: Vec<&str> = result
            .as_object()
            .expect("object payload")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["self_url", "name", "links"]);
    }
}
