//! Predicate assembler
//!
//! Turns [`Criteria`] into typed predicate fragments and renders them into
//! `sqlx::QueryBuilder`s. Every user-supplied value goes through `push_bind`;
//! only fixed SQL text is pushed verbatim. The same rendering serves SQLite
//! and MySQL since both use `?` placeholders.

use sqlx::{Database, Encode, QueryBuilder, Type};

use super::criteria::Criteria;

/// Escape character used in LIKE patterns
pub const LIKE_ESCAPE: char = '!';

/// Columns selected for a page of posts, without tags
pub const POST_COLUMNS: &str =
    "p.id, p.title, p.text, p.image_path, p.likes_count, p.comments_count, p.created_at";

/// One filter condition on posts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match on the title, against the stored
    /// lowercase copy `posts.title_folded`
    TitleContains(String),
    /// The post is linked to every one of these distinct tag names
    HasAllTags(Vec<String>),
}

impl Predicate {
    /// Active predicates for the criteria, title first.
    pub fn from_criteria(criteria: &Criteria) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(2);
        if criteria.has_title() {
            predicates.push(Predicate::TitleContains(criteria.title().to_string()));
        }
        if criteria.has_tags() {
            predicates.push(Predicate::HasAllTags(criteria.tags().iter().cloned().collect()));
        }
        predicates
    }

    /// Render this predicate as a boolean SQL expression over `posts p`.
    pub fn push_to<'args, DB>(&self, qb: &mut QueryBuilder<'args, DB>)
    where
        DB: Database,
        String: Encode<'args, DB> + Type<DB>,
        i64: Encode<'args, DB> + Type<DB>,
    {
        match self {
            Predicate::TitleContains(phrase) => {
                qb.push("p.title_folded LIKE ");
                qb.push_bind(title_pattern(phrase));
                qb.push(" ESCAPE '");
                qb.push(LIKE_ESCAPE);
                qb.push("'");
            }
            Predicate::HasAllTags(tags) => {
                qb.push(
                    "p.id IN (SELECT pt.post_id FROM posts_tags pt \
                     JOIN tags t ON t.id = pt.tag_id WHERE t.name IN (",
                );
                let mut names = qb.separated(", ");
                for tag in tags {
                    names.push_bind(tag.clone());
                }
                names.push_unseparated(") GROUP BY pt.post_id HAVING COUNT(DISTINCT t.name) = ");
                qb.push_bind(tags.len() as i64);
                qb.push(")");
            }
        }
    }
}

/// Append ` WHERE a AND b ...`, or nothing when there are no predicates.
pub fn push_where<'args, DB>(qb: &mut QueryBuilder<'args, DB>, predicates: &[Predicate])
where
    DB: Database,
    String: Encode<'args, DB> + Type<DB>,
    i64: Encode<'args, DB> + Type<DB>,
{
    for (idx, predicate) in predicates.iter().enumerate() {
        qb.push(if idx == 0 { " WHERE " } else { " AND " });
        predicate.push_to(qb);
    }
}

/// Render the total-count query for the criteria into an empty builder.
pub fn push_count_query<'args, DB>(qb: &mut QueryBuilder<'args, DB>, criteria: &Criteria)
where
    DB: Database,
    String: Encode<'args, DB> + Type<DB>,
    i64: Encode<'args, DB> + Type<DB>,
{
    qb.push("SELECT COUNT(DISTINCT p.id) AS total FROM posts p");
    push_where(qb, &Predicate::from_criteria(criteria));
}

/// Render the bounded page select for the criteria into an empty builder.
/// Rows come back in ascending id order.
pub fn push_select_query<'args, DB>(qb: &mut QueryBuilder<'args, DB>, criteria: &Criteria)
where
    DB: Database,
    String: Encode<'args, DB> + Type<DB>,
    i64: Encode<'args, DB> + Type<DB>,
{
    qb.push("SELECT ");
    qb.push(POST_COLUMNS);
    qb.push(" FROM posts p");
    push_where(qb, &Predicate::from_criteria(criteria));
    qb.push(" ORDER BY p.id ASC LIMIT ");
    qb.push_bind(criteria.limit());
    qb.push(" OFFSET ");
    qb.push_bind(criteria.offset());
}

/// Render the batched `(post_id, tag name)` lookup for a page of post ids.
/// Callers skip the query entirely when `post_ids` is empty.
pub fn push_tag_batch_query<'args, DB>(qb: &mut QueryBuilder<'args, DB>, post_ids: &[i64])
where
    DB: Database,
    i64: Encode<'args, DB> + Type<DB>,
{
    debug_assert!(!post_ids.is_empty(), "empty id batch must not be queried");

    qb.push(
        "SELECT pt.post_id, t.name FROM posts_tags pt \
         JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in post_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY pt.post_id, t.name");
}

/// LIKE pattern matching the phrase anywhere in a folded title
pub fn title_pattern(phrase: &str) -> String {
    format!("%{}%", escape_like(&phrase.to_lowercase()))
}

/// Escape LIKE wildcards so the phrase matches literally.
pub fn escape_like(phrase: &str) -> String {
    let mut escaped = String::with_capacity(phrase.len());
    for c in phrase.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
