//! Permission payload resolution
//!
//! The applications permission payload has changed shape over time. Old sessions carry
//! `manageProfiles`/`viewProfiles`, newer ones `manageApplications`, and both may be present at
//! once. [`resolve_grant`] reads every known alias and never fails: anything it does not
//! understand degrades to "no access".
//!
//! | Grant field | Aliases, first non-null wins |
//! |---|---|
//! | `manage_all` | `manageAllApplications`, `manageAll`, `viewAll` |
//! | `manage_scoped` | `manageApplications`, `manageProfiles`, `viewProfiles` |
//! | `check_scoped` | `checkApplications`, `checkProfiles` |
//! | `check_all` | `checkAllApplications`, `checkAll` |

use crate::grant::AccessGrant;
use appdesk_row::ProfileId;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Literal payload granting management of every application
pub const ALL_ACCESS: &str = "all";

const MANAGE_ALL: &[&str] = &["manageAllApplications", "manageAll", "viewAll"];
const MANAGE_SCOPED: &[&str] = &["manageApplications", "manageProfiles", "viewProfiles"];
const CHECK_SCOPED: &[&str] = &["checkApplications", "checkProfiles"];
const CHECK_ALL: &[&str] = &["checkAllApplications", "checkAll"];

/// Resolve a raw applications permission payload into a grant
///
/// The profiles level is left at its default; callers that know it set it with
/// [`AccessGrant::with_profile_access`].
#[must_use]
pub fn resolve_grant(raw: Option<&Value>) -> AccessGrant {
    match raw {
        Some(Value::String(marker)) if marker == ALL_ACCESS => AccessGrant::manage_everything(),
        Some(Value::Object(map)) => AccessGrant {
            manage_all: first_present(map, MANAGE_ALL).is_some_and(truthy),
            manage_scoped: normalize_id_list(first_present(map, MANAGE_SCOPED)),
            check_all: first_present(map, CHECK_ALL).is_some_and(truthy),
            check_scoped: normalize_id_list(first_present(map, CHECK_SCOPED)),
            ..AccessGrant::default()
        },
        _ => AccessGrant::none(),
    }
}

/// Normalize a list of profile references into a sorted, deduplicated id set
///
/// Accepts trimmed non-empty strings and objects carrying `_id` or `id`. Numbers, booleans,
/// nulls, nested arrays and objects without a usable id are dropped. A non-array input yields
/// an empty set.
#[must_use]
pub fn normalize_id_list(raw: Option<&Value>) -> BTreeSet<ProfileId> {
    let Some(Value::Array(items)) = raw else {
        return BTreeSet::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => non_empty(s),
            Value::Object(map) => object_id(map),
            _ => None,
        })
        .map(ProfileId::new)
        .collect()
}

/// First alias whose value is present and not null
fn first_present<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|alias| map.get(*alias).filter(|v| !v.is_null()))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Id of a reference object: `_id` first, then `id`
fn object_id(map: &Map<String, Value>) -> Option<String> {
    ["_id", "id"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(scalar_id)
}

fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        // Extended JSON object id
        Value::Object(inner) => inner.get("$oid").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    }
}
