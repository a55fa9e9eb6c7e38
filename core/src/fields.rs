//! Field heuristics over schema-less records.
//!
//! # Design
//! The remote service has no first-class description, completion or due
//! date fields — only dynamically-named custom fields whose meaning is
//! inferred from the key suffix and the value shape. Everything here is a
//! pure function over a `Record`; iteration follows the record's field
//! insertion order, which breaks ties among candidate fields. The three
//! read heuristics are independent: each scans a different key suffix and
//! none short-circuits another.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::types::{EntryPatch, ItemStatus, NormalizedItem, PatchField, Record};

/// Category color the service convention reserves for "Completed".
pub const COMPLETED_COLOR: &str = "#3ba744";

/// Fixed calendar-date pattern used by date fields.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Completion state: any `*_categories_sort` field containing a category
/// tagged with the completed color marks the entry as done.
pub fn completion_status(record: &Record) -> ItemStatus {
    for (key, value) in record.fields() {
        if !key.ends_with("_categories_sort") {
            continue;
        }
        let Some(categories) = value.as_array() else {
            continue;
        };
        let completed = categories
            .iter()
            .any(|category| category.get("colorHex").and_then(Value::as_str) == Some(COMPLETED_COLOR));
        if completed {
            return ItemStatus::Completed;
        }
    }
    ItemStatus::NeedsAction
}

/// Description: the first `*_text` field whose value differs from the
/// record's `displayString`. The title itself lives in one `*_text` field,
/// which this excludes.
pub fn description(record: &Record) -> Option<&str> {
    let display = record.display_string();
    for (key, value) in record.fields() {
        if !key.ends_with("_text") {
            continue;
        }
        let Some(text) = value.as_str() else {
            continue;
        };
        if Some(text) != display {
            return Some(text);
        }
    }
    None
}

/// Due date: the first `*_date` field with a non-null value parsing as
/// `YYYY-MM-DD`. A candidate that fails to parse is logged and skipped,
/// not fatal — later candidates are still examined.
pub fn due_date(record: &Record) -> Option<NaiveDate> {
    for (key, value) in record.fields() {
        if !key.ends_with("_date") {
            continue;
        }
        let Some(raw) = value.as_str() else {
            continue;
        };
        match NaiveDate::parse_from_str(raw, DUE_DATE_FORMAT) {
            Ok(due) => return Some(due),
            Err(_) => warn!("unable to parse due date {raw:?} in field {key}"),
        }
    }
    None
}

/// Derive the typed item view from a record. A record without a parseable
/// uuid cannot be addressed by consumers and is dropped with a warning.
pub fn normalize(record: &Record) -> Option<NormalizedItem> {
    let Some(uid) = record.uuid() else {
        warn!("skipping entry without a parseable uuid: {:?}", record.display_string());
        return None;
    };
    Some(NormalizedItem {
        uid,
        title: record.display_string().unwrap_or_default().to_string(),
        status: completion_status(record),
        description: description(record).map(str::to_string),
        due: due_date(record),
    })
}

/// Resolve a single-field patch against a fetched record to the concrete
/// field key and value for the single-key PUT.
///
/// Only the title is resolvable today: it maps to the `*_text` field whose
/// value equals `displayString` (or the first `*_text` field when the
/// record has no display string yet, as a freshly created shell does).
/// Description, completion and due date have no known write mapping and
/// fail as explicitly unsupported rather than silently no-oping.
pub fn resolve_update(record: &Record, patch: &EntryPatch) -> Result<(String, Value), Error> {
    match patch.single()? {
        PatchField::Name(name) => {
            let display = record.display_string();
            for (key, value) in record.fields() {
                if key.ends_with("_text") && (display.is_none() || value.as_str() == display) {
                    return Ok((key.to_string(), Value::String(name.to_string())));
                }
            }
            Err(Error::Validation("no title field found on entry".to_string()))
        }
        PatchField::Description(_) => Err(Error::Validation(
            "updating the description field is not supported".to_string(),
        )),
        PatchField::Completed(_) => Err(Error::Validation(
            "updating the completion field is not supported".to_string(),
        )),
        PatchField::DueDate(_) => Err(Error::Validation(
            "updating the due date field is not supported".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn completed_color_maps_to_completed() {
        let r = record(json!({
            "uuid": "9b30d1a2-6951-4e83-ab5f-46626ee8d53e",
            "displayString": "Done task",
            "fd3bb8c3_categories_sort": [
                {"id": 12691260, "uuid": "aaaa", "name": "Completed", "colorHex": "#3ba744"}
            ]
        }));
        assert_eq!(completion_status(&r), ItemStatus::Completed);
    }

    #[test]
    fn other_color_maps_to_needs_action() {
        let r = record(json!({
            "displayString": "In progress",
            "fd3bb8c3_categories_sort": [
                {"name": "In progress", "colorHex": "#ff0000"}
            ]
        }));
        assert_eq!(completion_status(&r), ItemStatus::NeedsAction);
    }

    #[test]
    fn no_categories_field_maps_to_needs_action() {
        let r = record(json!({"displayString": "Plain"}));
        assert_eq!(completion_status(&r), ItemStatus::NeedsAction);
    }

    #[test]
    fn description_excludes_the_title_field() {
        let r = record(json!({
            "displayString": "Buy milk",
            "aaa_text": "Buy milk",
            "bbb_text": "Two liters, semi-skimmed"
        }));
        assert_eq!(description(&r), Some("Two liters, semi-skimmed"));
    }

    #[test]
    fn single_text_field_yields_no_description() {
        let r = record(json!({
            "displayString": "Buy milk",
            "aaa_text": "Buy milk"
        }));
        assert_eq!(description(&r), None);
    }

    #[test]
    fn description_respects_field_order() {
        let r = record(json!({
            "displayString": "Buy milk",
            "zzz_text": "first candidate wins",
            "aaa_text": "later candidate ignored"
        }));
        assert_eq!(description(&r), Some("first candidate wins"));
    }

    #[test]
    fn due_date_parses_fixed_pattern() {
        let r = record(json!({
            "displayString": "Dated",
            "ccc_date": "2026-08-24"
        }));
        assert_eq!(
            due_date(&r),
            Some(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap())
        );
    }

    #[test]
    fn unparseable_due_date_is_skipped_not_fatal() {
        let r = record(json!({
            "displayString": "Dated",
            "bad_date": "24/08/2026",
            "good_date": "2026-08-24"
        }));
        assert_eq!(
            due_date(&r),
            Some(NaiveDate::from_ymd_opt(2026, 8, 24).unwrap())
        );
    }

    #[test]
    fn unparseable_due_date_alone_yields_none() {
        let r = record(json!({
            "displayString": "Dated",
            "bad_date": "next tuesday"
        }));
        assert_eq!(due_date(&r), None);
    }

    #[test]
    fn null_due_date_is_skipped() {
        let r = record(json!({
            "displayString": "Dated",
            "empty_date": null
        }));
        assert_eq!(due_date(&r), None);
    }

    #[test]
    fn normalize_assembles_all_heuristics() {
        let r = record(json!({
            "id": 7,
            "uuid": "9b30d1a2-6951-4e83-ab5f-46626ee8d53e",
            "displayString": "Buy milk",
            "aaa_text": "Buy milk",
            "bbb_text": "Two liters",
            "ccc_date": "2026-08-24",
            "ddd_categories_sort": [{"name": "Completed", "colorHex": "#3ba744"}]
        }));
        let item = normalize(&r).unwrap();
        assert_eq!(item.title, "Buy milk");
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.description.as_deref(), Some("Two liters"));
        assert_eq!(item.due, NaiveDate::from_ymd_opt(2026, 8, 24));
    }

    #[test]
    fn normalize_drops_record_without_uuid() {
        let r = record(json!({"displayString": "Orphan"}));
        assert!(normalize(&r).is_none());
    }

    #[test]
    fn resolve_name_targets_the_display_string_field() {
        let r = record(json!({
            "displayString": "Buy milk",
            "notes_text": "Two liters",
            "title_text": "Buy milk"
        }));
        let patch = EntryPatch::name("Buy oat milk");
        let (key, value) = resolve_update(&r, &patch).unwrap();
        // notes_text comes first but differs from displayString.
        assert_eq!(key, "title_text");
        assert_eq!(value, json!("Buy oat milk"));
    }

    #[test]
    fn resolve_name_on_bare_shell_takes_first_text_field() {
        let r = record(json!({
            "uuid": "9b30d1a2-6951-4e83-ab5f-46626ee8d53e",
            "displayString": null,
            "title_text": null
        }));
        let patch = EntryPatch::name("Buy milk");
        let (key, _) = resolve_update(&r, &patch).unwrap();
        assert_eq!(key, "title_text");
    }

    #[test]
    fn resolve_without_text_field_is_a_validation_error() {
        let r = record(json!({"displayString": "No text fields", "a_date": null}));
        let err = resolve_update(&r, &EntryPatch::name("x")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn unsupported_logical_fields_fail_explicitly() {
        let r = record(json!({"displayString": "t", "a_text": "t"}));
        let description = EntryPatch {
            description: Some("d".to_string()),
            ..EntryPatch::default()
        };
        let completed = EntryPatch {
            completed: Some(true),
            ..EntryPatch::default()
        };
        let due = EntryPatch {
            due_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..EntryPatch::default()
        };
        for patch in [description, completed, due] {
            assert!(matches!(
                resolve_update(&r, &patch),
                Err(Error::Validation(_))
            ));
        }
    }
}
