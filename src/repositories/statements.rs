//! Cypher statements issued by [`CodeGraphRepository`](super::CodeGraphRepository).
//!
//! Kept in one place so every backend sees exactly the same text.

/// Idempotent uniqueness constraints for the two node labels.
pub const SCHEMA_CONSTRAINTS: &[&str] = &[
    "CREATE CONSTRAINT sourcefile_path IF NOT EXISTS FOR (f:SourceFile) REQUIRE f.path IS UNIQUE",
    "CREATE CONSTRAINT entity_uid IF NOT EXISTS FOR (e:Entity) REQUIRE e.uid IS UNIQUE",
];

/// Upserts a file node; `created` is only written on first sight.
pub const UPSERT_FILE: &str = "MERGE (f:SourceFile {path: $path}) \
     ON CREATE SET f.created = $now";

/// Upserts an entity and its containment edge.
///
/// `SET e = $props` replaces every property, so nothing from a previous
/// ingestion survives except `uid` and the original `created`.
pub const UPSERT_ENTITY: &str = "MATCH (f:SourceFile {path: $path}) \
     MERGE (e:Entity {uid: $uid}) \
     ON CREATE SET e.created = $now \
     WITH f, e, e.created AS created \
     SET e = $props \
     SET e.uid = $uid, e.created = created \
     MERGE (f)-[:CONTAINS]->(e)";

pub const COUNT_FILES: &str = "MATCH (f:SourceFile) RETURN count(f) AS count";

pub const COUNT_ENTITIES: &str = "MATCH (e:Entity) RETURN count(e) AS count";

pub const COUNT_CONTAINS: &str =
    "MATCH (:SourceFile)-[r:CONTAINS]->(:Entity) RETURN count(r) AS count";

/// Entities without exactly one owning file, or whose owner's path differs
/// from the entity's recorded path.
pub const COUNT_CONTAINMENT_VIOLATIONS: &str = "MATCH (e:Entity) \
     OPTIONAL MATCH (f:SourceFile)-[:CONTAINS]->(e) \
     WITH e, collect(f.path) AS owners \
     WHERE size(owners) <> 1 OR owners[0] <> e.path \
     RETURN count(e) AS count";

pub const FIND_ENTITY: &str = "MATCH (e:Entity {uid: $uid}) RETURN properties(e) AS entity";

pub const ENTITY_UIDS_FOR_FILE: &str =
    "MATCH (:SourceFile {path: $path})-[:CONTAINS]->(e:Entity) RETURN e.uid AS uid ORDER BY uid";
