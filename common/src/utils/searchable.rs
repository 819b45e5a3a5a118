//! Canonical text shapes shared between indexing and querying.
//!
//! Items are embedded from a single formatted string, and every incoming
//! query is rewritten into the same textual shape before it is embedded, so
//! vector similarity always compares like with like.

/// Marker segment appended for members-only items.
const MEMBERS_MARKER: &str = "Members only item";
/// Segment delimiter used when joining the indexable parts.
const SEGMENT_DELIMITER: &str = " | ";

const NAME_PREFIX: &str = "item name:";
const DESCRIPTION_PREFIX: &str = "description:";

/// Builds the canonical searchable text for an item's indexable fields.
///
/// Segments are emitted in a fixed order and absent/empty fields are simply
/// omitted; an item with nothing to index yields an empty string.
pub fn build_indexable_text(name: &str, examine: Option<&str>, members: bool) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !name.is_empty() {
        parts.push(format!("Item Name: {name}"));
    }

    if let Some(examine) = examine {
        if !examine.is_empty() {
            parts.push(format!("Description: {examine}"));
        }
    }

    if members {
        parts.push(MEMBERS_MARKER.to_string());
    }

    parts.join(SEGMENT_DELIMITER)
}

/// Canonicalizes a free-form query into the textual shape used at indexing
/// time.
///
/// A query may address a field explicitly ("description: shiny sword") and is
/// re-wrapped under the matching canonical segment; everything else is
/// treated as an item-name query. A recognized prefix with no trailing
/// content falls back to the empty item-name form.
pub fn format_query(query: &str) -> String {
    let trimmed = query.trim();
    let lowered = trimmed.to_lowercase();

    if lowered.starts_with(DESCRIPTION_PREFIX) {
        let rest = trimmed
            .get(DESCRIPTION_PREFIX.len()..)
            .unwrap_or_default()
            .trim();
        if rest.is_empty() {
            return "Item Name: ".to_string();
        }
        return format!("Description: {rest}");
    }

    if lowered.starts_with(NAME_PREFIX) {
        let rest = trimmed.get(NAME_PREFIX.len()..).unwrap_or_default().trim();
        if rest.is_empty() {
            return "Item Name: ".to_string();
        }
        return format!("Item Name: {rest}");
    }

    format!("Item Name: {trimmed}")
}
