use super::RecordId;
use serde::{Deserialize, Serialize};

/// How many leading tokens are checked when classifying stored content
pub const CHECK_AT_LEAST: usize = 5;

/// Membership descriptor of a playlist
///
/// Either an explicit, ordered list of record identifiers or a query
/// evaluated by the store. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Content {
    /// No members and no query
    #[default]
    Empty,

    /// Explicit identifiers, in display order
    Ids(Vec<RecordId>),

    /// Opaque query string run against the store
    Query(String),
}

impl Content {
    /// Classify stored content text
    ///
    /// The text is split on single spaces. If each of the first
    /// `min(N, check_at_least)` tokens is made of decimal digits only, the
    /// whole field is an identifier list; otherwise it is a query.
    pub fn classify(text: &str, check_at_least: usize) -> Content {
        if text.is_empty() {
            return Content::Empty;
        }

        let tokens: Vec<&str> = text.split(' ').collect();
        let all_numeric = tokens
            .iter()
            .take(check_at_least)
            .all(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()));

        if !all_numeric {
            return Content::Query(text.to_string());
        }

        let mut ids = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token.parse::<RecordId>() {
                Ok(id) => ids.push(id),
                Err(_) => log::warn!("Dropping non-identifier token {:?} from id list", token),
            }
        }
        Content::Ids(ids)
    }

    /// Serialize to the single-line stored form
    pub fn to_text(&self) -> String {
        match self {
            Content::Empty => String::new(),
            Content::Ids(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Content::Query(query) => query.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Empty => true,
            Content::Ids(ids) => ids.is_empty(),
            Content::Query(query) => query.trim().is_empty(),
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Content::Query(_))
    }

    /// Identifiers, if this is an identifier list
    pub fn ids(&self) -> Option<&[RecordId]> {
        match self {
            Content::Ids(ids) => Some(ids),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ids() {
        assert_eq!(
            Content::classify("10 22 7", CHECK_AT_LEAST),
            Content::Ids(vec![RecordId(10), RecordId(22), RecordId(7)])
        );
    }

    #[test]
    fn test_classify_query() {
        assert_eq!(
            Content::classify("MATCH (n) RETURN n", CHECK_AT_LEAST),
            Content::Query("MATCH (n) RETURN n".to_string())
        );
    }

    #[test]
    fn test_classify_checks_third_token() {
        assert_eq!(
            Content::classify("10 22 abc", 3),
            Content::Query("10 22 abc".to_string())
        );
        // Only the first two tokens are looked at
        assert_eq!(
            Content::classify("10 22 abc", 2),
            Content::Ids(vec![RecordId(10), RecordId(22)])
        );
    }

    #[test]
    fn test_classify_empty_and_double_space() {
        assert_eq!(Content::classify("", CHECK_AT_LEAST), Content::Empty);
        assert!(Content::classify("10  22", CHECK_AT_LEAST).is_query());
    }

    #[test]
    fn test_to_text_preserves_order() {
        let content = Content::Ids(vec![RecordId(5), RecordId(1), RecordId(3)]);
        assert_eq!(content.to_text(), "5 1 3");
        assert_eq!(Content::classify(&content.to_text(), CHECK_AT_LEAST), content);
    }
}
