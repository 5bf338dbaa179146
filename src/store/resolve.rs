//! Turning playlist content into a store query

use super::query::Params;
use crate::model::{Content, Record, RecordId};
use std::collections::HashMap;

/// Query synthesized for identifier-list playlists
pub const ID_QUERY: &str = "MATCH (n) WHERE id(n) IN $ids RETURN n";

/// A query ready to run, plus the order to impose on its result
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub text: String,
    pub params: Params,

    /// Display order for identifier lists; the store guarantees none
    pub order: Option<Vec<RecordId>>,
}

/// Produce the query for a playlist's content
///
/// Returns `None` for empty content, in which case the store must not be
/// contacted at all.
pub fn resolve(content: &Content) -> Option<ResolvedQuery> {
    if content.is_empty() {
        return None;
    }
    match content {
        Content::Empty => None,
        Content::Query(text) => Some(ResolvedQuery {
            text: text.clone(),
            params: Params::new(),
            order: None,
        }),
        Content::Ids(ids) => {
            let mut params = Params::new();
            params.insert(
                "ids".to_string(),
                serde_json::Value::from(ids.iter().map(|id| id.0).collect::<Vec<u64>>()),
            );
            Some(ResolvedQuery {
                text: ID_QUERY.to_string(),
                params,
                order: Some(ids.clone()),
            })
        }
    }
}

/// Reindex fetched records by identifier-list order
///
/// Identifiers the store no longer knows are dropped, not padded.
pub fn reorder_by_ids(records: Vec<Record>, ids: &[RecordId]) -> Vec<Record> {
    let mut by_id: HashMap<RecordId, Record> =
        records.into_iter().map(|r| (r.id, r)).collect();

    let ordered: Vec<Record> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
    if ordered.len() < ids.len() {
        log::debug!(
            "{} of {} listed records no longer exist",
            ids.len() - ordered.len(),
            ids.len()
        );
    }
    ordered
}
