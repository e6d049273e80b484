/// Release-service entities are keyed by opaque string ids
/// (business keys such as `snomed_ct_international_edition`).
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Decoded wire data as delivered by the REST transport, before any
/// typed-entity mapping.
pub type Payload = serde_json::Value;

/// Relation name -> URL, synthesized from `<relation>_url` fields.
pub type LinkMap = std::collections::BTreeMap<String, String>;
