use sea_orm::{
    ColumnTrait, ConnectionTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};

use crate::db::entities::{prelude::Tag, tag};

/// Trims whitespace and a leading `#`. Returns `None` when nothing is left.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('#').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Normalizes a list of tag names, dropping empties and duplicates while keeping first-seen order.
pub fn normalize_tag_names(raw: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for candidate in raw.iter().filter_map(|r| normalize_tag_name(r)) {
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    names
}

/// Looks a tag up by its exact name, creating it if it does not exist.
///
/// The insert ignores a conflicting name, so concurrent callers creating the same
/// tag both end up with the single stored row.
pub async fn find_or_create_tag<C>(db: &C, name: &str) -> Result<tag::Model, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_tag(db, name).await? {
        return Ok(existing);
    }

    Tag::insert(tag::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    })
    .on_conflict(OnConflict::column(tag::Column::Name).do_nothing().to_owned())
    .exec_without_returning(db)
    .await?;

    find_tag(db, name)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("tag '{name}' missing after insert")))
}

async fn find_tag<C>(db: &C, name: &str) -> Result<Option<tag::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Tag::find().filter(tag::Column::Name.eq(name)).one(db).await
}

/// Every tag name in the store, alphabetically.
pub async fn all_tag_names(db: &DbConn) -> Result<Vec<String>, DbErr> {
    let tags = Tag::find()
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await?;
    Ok(tags.into_iter().map(|t| t.name).collect())
}
