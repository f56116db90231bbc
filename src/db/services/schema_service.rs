use sea_orm::{ConnectionTrait, DbConn, DbErr, Schema};
use tracing::info;

use crate::db::entities::prelude::{Link, LinkTag, Tag};

/// Creates the `tags`, `user_links` and `link_tags` tables if they do not exist yet.
/// Safe to call repeatedly.
pub async fn init_schema(db: &DbConn) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Referenced tables first so the join table's foreign keys resolve.
    let mut statements = vec![
        schema.create_table_from_entity(Tag),
        schema.create_table_from_entity(Link),
        schema.create_table_from_entity(LinkTag),
    ];

    for stmt in statements.iter_mut() {
        stmt.if_not_exists();
        db.execute(backend.build(&*stmt)).await?;
    }

    info!(backend = ?backend, "Database schema initialized.");
    Ok(())
}
