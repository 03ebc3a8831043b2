//! Cursor-based pagination for catalog listings.
//!
//! A cursor is the base64 encoding of `{"page":<int>,"pageSize":<int>}`. It
//! is opaque to peers: absent on the first page, absent again once the final
//! page has been served. A cursor that fails to decode is a caller error and
//! is reported as invalid params, never silently reset to the first page.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::utils::error::{McpError, McpResult};

/// Decoded pagination continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Zero-based page index to serve next
    pub page: usize,
    /// Page size the client started the walk with
    #[serde(rename = "pageSize")]
    pub page_size: usize,
}

impl Cursor {
    /// Encodes the cursor as an opaque base64 token.
    pub fn encode(&self) -> String {
        let json = serde_json::json!({"page": self.page, "pageSize": self.page_size});
        BASE64.encode(json.to_string())
    }

    /// Decodes an opaque token back into a cursor.
    ///
    /// Foreign or corrupted tokens are an invalid-params error.
    pub fn decode(token: &str) -> McpResult<Cursor> {
        let bytes = BASE64
            .decode(token)
            .map_err(|_| McpError::InvalidParams("malformed pagination cursor".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| McpError::InvalidParams("malformed pagination cursor".to_string()))
    }
}

/// One page of an ordered listing plus the continuation token, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items of this page, in catalog order
    pub items: Vec<T>,
    /// Token for the next page; `None` on the final page
    pub next_cursor: Option<String>,
}

/// Splits an ordered listing into one page plus an opaque continuation.
///
/// An absent cursor starts at page zero with `default_page_size`. A present
/// cursor's stored page size wins over the default, so the size a client
/// declared on its first request is carried across the whole walk.
pub fn paginate<T: Clone>(
    items: &[T],
    cursor: Option<&str>,
    default_page_size: usize,
) -> McpResult<Page<T>> {
    let (page, page_size) = match cursor {
        Some(token) => {
            let cursor = Cursor::decode(token)?;
            (cursor.page, cursor.page_size)
        }
        None => (0, default_page_size),
    };

    if page_size == 0 {
        return Err(McpError::InvalidParams(
            "pageSize must be positive".to_string(),
        ));
    }

    let start = page.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    let next_cursor = if end < items.len() {
        Some(
            Cursor {
                page: page + 1,
                page_size,
            }
            .encode(),
        )
    } else {
        None
    };

    Ok(Page {
        items: items[start..end].to_vec(),
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cursor_round_trip() {
        let cursor = Cursor {
            page: 3,
            page_size: 25,
        };
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn malformed_cursor_is_invalid_params() {
        assert!(matches!(
            Cursor::decode("!!not-base64!!"),
            Err(McpError::InvalidParams(_))
        ));
        // Valid base64, foreign payload.
        let foreign = BASE64.encode("{\"offset\":10}");
        assert!(matches!(
            Cursor::decode(&foreign),
            Err(McpError::InvalidParams(_))
        ));
    }

    #[test]
    fn first_page_uses_default_size() {
        let items: Vec<u32> = (0..10).collect();
        let page = paginate(&items, None, 4).unwrap();
        assert_eq!(page.items, vec![0, 1, 2, 3]);
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn stored_page_size_wins_over_default() {
        let items: Vec<u32> = (0..10).collect();
        let token = Cursor {
            page: 1,
            page_size: 3,
        }
        .encode();
        // Default of 100 must not override the client's declared size.
        let page = paginate(&items, Some(&token), 100).unwrap();
        assert_eq!(page.items, vec![3, 4, 5]);
    }

    #[test]
    fn final_page_has_no_cursor() {
        let items: Vec<u32> = (0..6).collect();
        let page = paginate(&items, None, 6).unwrap();
        assert_eq!(page.items.len(), 6);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn page_past_the_end_is_empty_and_terminal() {
        let items: Vec<u32> = (0..4).collect();
        let token = Cursor {
            page: 9,
            page_size: 4,
        }
        .encode();
        let page = paginate(&items, Some(&token), 4).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn zero_page_size_rejected() {
        let items: Vec<u32> = (0..4).collect();
        assert!(matches!(
            paginate(&items, None, 0),
            Err(McpError::InvalidParams(_))
        ));
    }

    proptest! {
        /// Walking from no cursor until the cursor runs out reconstructs the
        /// listing exactly, without gaps or duplicates, for any positive
        /// page size.
        #[test]
        fn walk_reconstructs_items(len in 0usize..200, page_size in 1usize..40) {
            let items: Vec<usize> = (0..len).collect();
            let mut collected = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let page = paginate(&items, cursor.as_deref(), page_size).unwrap();
                collected.extend(page.items);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            prop_assert_eq!(collected, items);
        }
    }
}
