use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Owning Telegram chat.
    pub chat_id: String,
    /// The URL exactly as the user sent it.
    pub link: String,
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Canonical URL reported by the page or product API.
    pub url: Option<String>,
    pub price: Option<String>,
    /// JSON array of image URLs.
    pub images: Option<Json>,
    pub site_name: Option<String>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::link_tag::Entity")]
    LinkTag,
}

impl Related<super::link_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkTag.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::link_tag::Relation::Tag.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::link_tag::Relation::Link.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Image URLs stored in the JSON column; anything that is not a string is skipped.
    pub fn image_list(&self) -> Vec<String> {
        match &self.images {
            Some(Json::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}
