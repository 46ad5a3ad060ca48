use time::OffsetDateTime;

use crate::label::Label;
use crate::record::CatalogItem;

/// Bulk selection over catalogued items.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CatalogQuery {
    #[default]
    All,
    /// Items carrying exactly this label.
    Label(Label),
    /// Items with any label.
    Labeled,
    Unlabeled,
    /// Items whose window contains the instant (`t_0 <= at <= t_1`).
    At(OffsetDateTime),
    IdentifierContains(String),
    CommentContains(String),
    /// Items matching every sub-query. An empty list matches everything.
    And(Vec<CatalogQuery>),
}

impl CatalogQuery {
    /// Conjunction of `queries`, collapsed to a single query when possible.
    pub fn all_of(mut queries: Vec<CatalogQuery>) -> Self {
        match queries.len() {
            0 => CatalogQuery::All,
            1 => queries.remove(0),
            _ => CatalogQuery::And(queries),
        }
    }

    pub fn matches(&self, item: &CatalogItem) -> bool {
        match self {
            CatalogQuery::All => true,
            CatalogQuery::Label(label) => item.label == Some(*label),
            CatalogQuery::Labeled => item.label.is_some(),
            CatalogQuery::Unlabeled => item.label.is_none(),
            CatalogQuery::At(at) => item.t_0 <= *at && *at <= item.t_1,
            CatalogQuery::IdentifierContains(text) => item.id.contains(text.as_str()),
            CatalogQuery::CommentContains(text) => item
                .comment
                .as_deref()
                .is_some_and(|c| c.contains(text.as_str())),
            CatalogQuery::And(queries) => queries.iter().all(|q| q.matches(item)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn item(id: &str, label: Option<Label>, comment: Option<&str>) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            geometry: "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))".into(),
            t_0: datetime!(2020-01-01 0:00 UTC),
            t_1: datetime!(2020-01-10 0:00 UTC),
            label,
            comment: comment.map(str::to_string),
            kind: None,
            certainty: None,
            source: None,
            metadata: None,
        }
    }

    #[test]
    fn label_queries() {
        let labeled = item("a", Some(Label::Present), None);
        let unlabeled = item("b", None, None);
        assert!(CatalogQuery::Label(Label::Present).matches(&labeled));
        assert!(!CatalogQuery::Label(Label::Absent).matches(&labeled));
        assert!(CatalogQuery::Labeled.matches(&labeled));
        assert!(!CatalogQuery::Labeled.matches(&unlabeled));
        assert!(CatalogQuery::Unlabeled.matches(&unlabeled));
    }

    #[test]
    fn time_query_is_inclusive() {
        let i = item("a", None, None);
        assert!(CatalogQuery::At(datetime!(2020-01-01 0:00 UTC)).matches(&i));
        assert!(CatalogQuery::At(datetime!(2020-01-10 0:00 UTC)).matches(&i));
        assert!(!CatalogQuery::At(datetime!(2020-01-10 0:01 UTC)).matches(&i));
    }

    #[test]
    fn text_and_conjunction() {
        let i = item("tromso_01", Some(Label::Unsure), Some("wet slab"));
        assert!(CatalogQuery::IdentifierContains("tromso".into()).matches(&i));
        assert!(CatalogQuery::CommentContains("slab".into()).matches(&i));
        assert!(!CatalogQuery::CommentContains("slab".into()).matches(&item("x", None, None)));
        let q = CatalogQuery::all_of(vec![
            CatalogQuery::Labeled,
            CatalogQuery::CommentContains("dry".into()),
        ]);
        assert!(!q.matches(&i));
        assert_eq!(CatalogQuery::all_of(Vec::new()), CatalogQuery::All);
    }
}
