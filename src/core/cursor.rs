// Opaque pagination cursor over a (timestamp, id)-ordered descending listing.
//
// The wire format is "<timestamp_ms>|<id>". Clients treat the token as
// opaque; internally it is a small struct so the two halves never get
// re-parsed out of a raw string at call sites.

use crate::core::TimestampMs;

/// Decoded cursor position. An empty cursor (both fields `None`) means
/// "first page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub timestamp: Option<TimestampMs>,
    pub id: Option<i64>,
}

impl Cursor {
    /// Parse a cursor token. Null/blank input yields the empty cursor, and so
    /// does any malformed token — parsing is deliberately permissive so a
    /// garbled cursor restarts the listing instead of failing the request.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Cursor::default(),
        };

        let mut parts = raw.splitn(2, '|');
        let (ts, id) = match (parts.next(), parts.next()) {
            (Some(ts), Some(id)) => (ts, id),
            _ => return Cursor::default(),
        };

        match (ts.parse::<TimestampMs>(), id.parse::<i64>()) {
            (Ok(ts), Ok(id)) => Cursor {
                timestamp: Some(ts),
                id: Some(id),
            },
            _ => Cursor::default(),
        }
    }

    /// Encode a position as a cursor token.
    pub fn build(timestamp: TimestampMs, id: i64) -> String {
        format!("{}|{}", timestamp, id)
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.id.is_none()
    }

    /// Position as a pair, or `None` for the first page.
    pub fn position(&self) -> Option<(TimestampMs, i64)> {
        match (self.timestamp, self.id) {
            (Some(ts), Some(id)) => Some((ts, id)),
            _ => None,
        }
    }
}

/// Whether a row at `(timestamp, id)` sorts strictly after the cursor position
/// in `(timestamp DESC, id DESC)` order, i.e. belongs to the requested page.
pub fn before_cursor(cursor: &Cursor, timestamp: TimestampMs, id: i64) -> bool {
    match cursor.position() {
        None => true,
        Some((cts, cid)) => timestamp < cts || (timestamp == cts && id < cid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let token = Cursor::build(1736500000123, 42);
        let cursor = Cursor::parse(Some(&token));
        assert_eq!(cursor.timestamp, Some(1736500000123));
        assert_eq!(cursor.id, Some(42));
    }

    #[test]
    fn blank_and_missing_are_empty() {
        assert!(Cursor::parse(None).is_empty());
        assert!(Cursor::parse(Some("")).is_empty());
        assert!(Cursor::parse(Some("   ")).is_empty());
    }

    #[test]
    fn malformed_is_treated_as_empty() {
        assert!(Cursor::parse(Some("no-delimiter")).is_empty());
        assert!(Cursor::parse(Some("abc|def")).is_empty());
        assert!(Cursor::parse(Some("123|")).is_empty());
    }

    #[test]
    fn ordering_predicate() {
        let c = Cursor::parse(Some(&Cursor::build(100, 5)));
        assert!(before_cursor(&c, 99, 100));
        assert!(before_cursor(&c, 100, 4));
        assert!(!before_cursor(&c, 100, 5));
        assert!(!before_cursor(&c, 101, 1));
    }
}
