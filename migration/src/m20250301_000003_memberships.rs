use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Memberships {
    Table,
    Id,
    ClusterId,
    MemberId,
}

#[derive(Iden)]
enum Clusters {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Memberships::Table)
                .if_not_exists()
                .col(pk_auto(Memberships::Id))
                .col(big_unsigned(Memberships::ClusterId))
                .col(big_unsigned_uniq(Memberships::MemberId))
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_memberships_cluster")
                        .from(Memberships::Table, Memberships::ClusterId)
                        .to(Clusters::Table, Clusters::Id),
                )
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Memberships::Table).to_owned())
            .await
    }
}
