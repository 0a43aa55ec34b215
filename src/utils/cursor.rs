use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Keyset position of the last row on a page: `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

pub fn encode_cursor(cursor: &ListCursor) -> String {
    let raw = format!("{}|{}", cursor.created_at.to_rfc3339(), cursor.id);
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Returns `None` for anything that is not a cursor we produced.
pub fn decode_cursor(encoded: &str) -> Option<ListCursor> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
    let raw = String::from_utf8(bytes).ok()?;
    let (ts, id) = raw.split_once('|')?;
    Some(ListCursor {
        created_at: DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc),
        id: Uuid::parse_str(id).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_survives_encoding() {
        let cursor = ListCursor {
            created_at: Utc::now(),
            id: Uuid::new_v4(),
        };
        assert_eq!(decode_cursor(&encode_cursor(&cursor)), Some(cursor));
    }

    #[test]
    fn garbage_cursor_is_rejected() {
        assert!(decode_cursor("not a cursor").is_none());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode("2024-01-01|nope")).is_none());
    }
}
