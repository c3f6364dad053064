use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Clusters {
    Table,
    Id,
    CreatedAt,
    LastActivity,
    FeedId,
    IsRt,
    MemberCount,
    Embedding,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Clusters::Table)
                .if_not_exists()
                .col(pk_auto(Clusters::Id))
                .col(
                    ColumnDef::new(Clusters::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::cust("CURRENT_TIMESTAMP")),
                )
                .col(timestamp_with_time_zone(Clusters::LastActivity))
                .col(big_unsigned_uniq(Clusters::FeedId))
                .col(boolean(Clusters::IsRt).default(false))
                .col(integer(Clusters::MemberCount).default(0))
                .col(
                    ColumnDef::new(Clusters::Embedding)
                        .vector(None)
                        .not_null(),
                )
                .to_owned(),
        )
        .await?;

        // Mirrors the teacher's visual_features HNSW index: nearest-centroid
        // lookups are cosine, so the index must be built with cosine ops.
        let db = m.get_connection();
        db.execute_unprepared(
            r"
            CREATE INDEX clusters_embedding_idx ON clusters
            USING hnsw (embedding vector_cosine_ops)
            WITH (m = 16, ef_construction = 200)
            ",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Clusters::Table).to_owned())
            .await
    }
}
