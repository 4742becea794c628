//! Serialized-entity format
//!
//! Clients sync entities (notes, folders, resource metadata) as plain text:
//! an optional body, a blank line, then a trailing block of `key: value`
//! property lines. Anything that does not parse is stored as an opaque blob.

use std::collections::HashSet;

use regex::Regex;

use crate::models::{EntityFields, EntityKind};

/// A successfully parsed serialized entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntity {
    /// Mirrored fields extracted from the property block
    pub fields: EntityFields,
    /// Text body preceding the property block (empty for folders/resources)
    pub body: String,
}

/// Try to parse content as a serialized entity.
///
/// Returns `None` when the content is not valid UTF-8, has no property
/// block, or the block lacks the required `id`/`type_` keys.
#[must_use]
pub fn parse_entity(content: &[u8]) -> Option<ParsedEntity> {
    let text = std::str::from_utf8(content).ok()?;
    let (body, props) = split_property_block(text)?;

    let mut fields = EntityFields::default();
    let mut has_id = false;
    let mut has_kind = false;

    for line in props.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = parse_property_line(line)?;
        match key {
            "id" => {
                if value.is_empty() {
                    return None;
                }
                fields.id = value.to_string();
                has_id = true;
            }
            "type_" => {
                fields.kind = Some(EntityKind::from_type_property(value)?);
                has_kind = true;
            }
            "parent_id" => fields.parent_id = value.to_string(),
            "share_id" => fields.share_id = value.to_string(),
            "encryption_applied" => fields.encrypted = value == "1",
            "updated_time" => fields.updated_at = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    if !(has_id && has_kind) {
        return None;
    }

    Some(ParsedEntity {
        fields,
        body: body.to_string(),
    })
}

/// Extract linked resource ids from a note body
///
/// Links use the `:/<32-hex-id>` convention. Ids are deduplicated and
/// returned in first-seen order.
///
/// # Examples
///
/// ```
/// use silt_core::format::linked_resource_ids;
///
/// let ids = linked_resource_ids("![pic](:/0123456789abcdef0123456789abcdef)");
/// assert_eq!(ids, vec!["0123456789abcdef0123456789abcdef".to_string()]);
/// ```
#[must_use]
pub fn linked_resource_ids(body: &str) -> Vec<String> {
    let re = Regex::new(r":/([a-zA-Z0-9]{32})").expect("Invalid regex");
    let mut seen = HashSet::new();
    re.captures_iter(body)
        .map(|cap| cap[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Split serialized text into (body, property block).
///
/// The property block is the text after the last blank-line separator; when
/// there is no separator the whole text must be the block.
fn split_property_block(text: &str) -> Option<(&str, &str)> {
    let (body, props) = text
        .rfind("\n\n")
        .map_or(("", text), |pos| (&text[..pos], &text[pos + 2..]));

    if props.trim().is_empty() {
        return None;
    }

    // Every non-empty line must be a property line, otherwise this is just
    // prose that happens to end without a trailing newline.
    for line in props.lines() {
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            parse_property_line(line)?;
        }
    }

    Some((body, props))
}

fn parse_property_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
    {
        return None;
    }
    Some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const NOTE: &str = "Shopping list\n\nMilk and eggs.\n\nid: 11aa11aa11aa11aa11aa11aa11aa11aa\ntype_: 1\nparent_id: 22bb22bb22bb22bb22bb22bb22bb22bb\nshare_id: \nencryption_applied: 0\nupdated_time: 1700000000000";

    #[test]
    fn test_parse_note() {
        let parsed = parse_entity(NOTE.as_bytes()).unwrap();
        assert_eq!(parsed.fields.id, "11aa11aa11aa11aa11aa11aa11aa11aa");
        assert_eq!(parsed.fields.kind, Some(EntityKind::Note));
        assert_eq!(parsed.fields.parent_id, "22bb22bb22bb22bb22bb22bb22bb22bb");
        assert_eq!(parsed.fields.share_id, "");
        assert!(!parsed.fields.encrypted);
        assert_eq!(parsed.fields.updated_at, 1_700_000_000_000);
        assert_eq!(parsed.body, "Shopping list\n\nMilk and eggs.");
    }

    #[test]
    fn test_parse_folder_without_body() {
        let folder = "Work\n\nid: 33cc33cc33cc33cc33cc33cc33cc33cc\ntype_: 2\nparent_id: \nshare_id: s1";
        let parsed = parse_entity(folder.as_bytes()).unwrap();
        assert_eq!(parsed.fields.kind, Some(EntityKind::Folder));
        assert_eq!(parsed.fields.share_id, "s1");
        assert_eq!(parsed.body, "Work");
    }

    #[test]
    fn test_parse_rejects_opaque_blob() {
        assert_eq!(parse_entity(b"\x00\xff\x00binary"), None);
        assert_eq!(parse_entity(b"just some text without properties"), None);
    }

    #[test]
    fn test_parse_requires_id_and_type() {
        let missing_type = "body\n\nid: 11aa11aa11aa11aa11aa11aa11aa11aa";
        assert_eq!(parse_entity(missing_type.as_bytes()), None);

        let missing_id = "body\n\ntype_: 1";
        assert_eq!(parse_entity(missing_id.as_bytes()), None);
    }

    #[test]
    fn test_parse_rejects_prose_tail() {
        let prose = "First paragraph.\n\nSecond paragraph: with a colon but Capital Key";
        assert_eq!(parse_entity(prose.as_bytes()), None);
    }

    #[test]
    fn test_linked_resource_ids_dedupes_in_order() {
        let body = "a :/0123456789abcdef0123456789abcdef b :/ffffffffffffffffffffffffffffffff c :/0123456789abcdef0123456789abcdef";
        let ids = linked_resource_ids(body);
        assert_eq!(
            ids,
            vec![
                "0123456789abcdef0123456789abcdef".to_string(),
                "ffffffffffffffffffffffffffffffff".to_string(),
            ]
        );
    }

    #[test]
    fn test_linked_resource_ids_ignores_short_ids() {
        assert!(linked_resource_ids("see :/abc123").is_empty());
    }
}
