use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum RegionWords {
    Table,
    Id,
    Word,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(RegionWords::Table)
                .if_not_exists()
                .col(pk_auto(RegionWords::Id))
                .col(string_uniq(RegionWords::Word))
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(RegionWords::Table).to_owned())
            .await
    }
}
