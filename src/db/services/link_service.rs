use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, LoaderTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Query,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::entities::{
    link, link_tag,
    prelude::{Link, LinkTag, Tag},
    tag,
};
use crate::db::services::tag_service::{find_or_create_tag, normalize_tag_name, normalize_tag_names};
use crate::metadata::Metadata;

#[derive(Debug, thiserror::Error)]
pub enum LinkStoreError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Link not found: {0}")]
    LinkNotFound(i32),
    #[error("A tag name is required")]
    TagRequired,
}

/// A stored link together with the names of its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkWithTags {
    pub id: i32,
    pub chat_id: String,
    pub link: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub price: String,
    pub images: Vec<String>,
    pub site_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl LinkWithTags {
    fn from_models(model: link::Model, tags: Vec<tag::Model>) -> Self {
        let images = model.image_list();
        let mut tags: Vec<String> = tags.into_iter().map(|t| t.name).collect();
        tags.sort();
        Self {
            id: model.id,
            title: model.title.unwrap_or_else(|| model.link.clone()),
            url: model.url.unwrap_or_else(|| model.link.clone()),
            description: model.description.unwrap_or_default(),
            price: model.price.unwrap_or_default(),
            images,
            site_name: model.site_name,
            created_at: model.created_at,
            chat_id: model.chat_id,
            link: model.link,
            tags,
        }
    }
}

/// Stores a link with its resolved metadata and tags. The link row and its tag
/// associations are committed together.
pub async fn create_link(
    db: &DbConn,
    chat_id: &str,
    original_url: &str,
    tag_names: &[String],
    metadata: &Metadata,
) -> Result<i32, LinkStoreError> {
    let names = normalize_tag_names(tag_names);
    let txn = db.begin().await?;

    let new_link = link::ActiveModel {
        chat_id: Set(chat_id.to_string()),
        link: Set(original_url.to_string()),
        title: Set(Some(metadata.title.clone())),
        description: Set(Some(metadata.description.clone())),
        url: Set(Some(metadata.url.clone())),
        price: Set(Some(metadata.price.clone())),
        images: Set(Some(serde_json::json!(metadata.images))),
        site_name: Set(metadata.site_name.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let link = new_link.insert(&txn).await?;

    for name in &names {
        let tag = find_or_create_tag(&txn, name).await?;
        LinkTag::insert(link_tag::ActiveModel {
            link_id: Set(link.id),
            tag_id: Set(tag.id),
        })
        .exec_without_returning(&txn)
        .await?;
    }

    txn.commit().await?;
    info!(chat_id, link_id = link.id, tags = ?names, "Link stored.");
    Ok(link.id)
}

/// Attaches a tag to a link. Returns `false` when the tag was already attached.
/// An unknown link leaves the database untouched.
pub async fn add_tag(db: &DbConn, link_id: i32, tag_name: &str) -> Result<bool, LinkStoreError> {
    let name = normalize_tag_name(tag_name).ok_or(LinkStoreError::TagRequired)?;
    let txn = db.begin().await?;

    if Link::find_by_id(link_id).one(&txn).await?.is_none() {
        return Err(LinkStoreError::LinkNotFound(link_id));
    }

    let tag = find_or_create_tag(&txn, &name).await?;
    if LinkTag::find_by_id((link_id, tag.id)).one(&txn).await?.is_some() {
        txn.commit().await?;
        debug!(link_id, tag = %name, "Tag already attached.");
        return Ok(false);
    }

    LinkTag::insert(link_tag::ActiveModel {
        link_id: Set(link_id),
        tag_id: Set(tag.id),
    })
    .exec_without_returning(&txn)
    .await?;
    txn.commit().await?;
    info!(link_id, tag = %name, "Tag attached.");
    Ok(true)
}

/// Deletes one link and its tag associations. Tags themselves are kept, even when
/// no other link references them any more.
pub async fn delete_link(db: &DbConn, link_id: i32) -> Result<link::Model, LinkStoreError> {
    let txn = db.begin().await?;
    let link = Link::find_by_id(link_id)
        .one(&txn)
        .await?
        .ok_or(LinkStoreError::LinkNotFound(link_id))?;

    LinkTag::delete_many()
        .filter(link_tag::Column::LinkId.eq(link_id))
        .exec(&txn)
        .await?;
    link.clone().delete(&txn).await?;

    txn.commit().await?;
    info!(link_id, chat_id = %link.chat_id, "Link deleted.");
    Ok(link)
}

/// Deletes every link of a chat, then garbage-collects tags no link references.
/// Returns the number of links removed.
pub async fn delete_all_links(db: &DbConn, chat_id: &str) -> Result<u64, LinkStoreError> {
    let txn = db.begin().await?;

    let link_ids: Vec<i32> = Link::find()
        .select_only()
        .column(link::Column::Id)
        .filter(link::Column::ChatId.eq(chat_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !link_ids.is_empty() {
        LinkTag::delete_many()
            .filter(link_tag::Column::LinkId.is_in(link_ids))
            .exec(&txn)
            .await?;
    }
    let deleted = Link::delete_many()
        .filter(link::Column::ChatId.eq(chat_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let orphaned = Tag::delete_many()
        .filter(
            tag::Column::Id.not_in_subquery(
                Query::select()
                    .column(link_tag::Column::TagId)
                    .from(LinkTag)
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?
        .rows_affected;

    txn.commit().await?;
    info!(chat_id, deleted, orphaned_tags = orphaned, "All links deleted for chat.");
    Ok(deleted)
}

/// Links of a chat, newest first. A non-empty `tag_filter` keeps links carrying at
/// least one of the named tags.
pub async fn list_links(
    db: &DbConn,
    chat_id: &str,
    tag_filter: &[String],
) -> Result<Vec<LinkWithTags>, LinkStoreError> {
    let mut query = Link::find().filter(link::Column::ChatId.eq(chat_id));

    let names = normalize_tag_names(tag_filter);
    if !names.is_empty() {
        let tag_ids: Vec<i32> = Tag::find()
            .select_only()
            .column(tag::Column::Id)
            .filter(tag::Column::Name.is_in(names))
            .into_tuple()
            .all(db)
            .await?;
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter(
            link::Column::Id.in_subquery(
                Query::select()
                    .column(link_tag::Column::LinkId)
                    .from(LinkTag)
                    .and_where(link_tag::Column::TagId.is_in(tag_ids))
                    .to_owned(),
            ),
        );
    }

    let links = query
        .order_by_desc(link::Column::CreatedAt)
        .order_by_desc(link::Column::Id)
        .all(db)
        .await?;
    let tags = links.load_many_to_many(Tag, LinkTag, db).await?;

    Ok(links
        .into_iter()
        .zip(tags)
        .map(|(link, tags)| LinkWithTags::from_models(link, tags))
        .collect())
}

/// A single link with its tags.
pub async fn get_link(db: &DbConn, link_id: i32) -> Result<LinkWithTags, LinkStoreError> {
    let link = Link::find_by_id(link_id)
        .one(db)
        .await?
        .ok_or(LinkStoreError::LinkNotFound(link_id))?;
    let tags = link.find_related(Tag).all(db).await?;
    Ok(LinkWithTags::from_models(link, tags))
}
