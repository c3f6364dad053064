use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Feed {
    Table,
    Id,
    Md5,
    Time,
    SourceName,
    Parsed,
    Title,
    Description,
    FullText,
    Link,
    Enclosure,
    Category,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.create_table(
            Table::create()
                .table(Feed::Table)
                .if_not_exists()
                .col(pk_auto(Feed::Id))
                .col(string_uniq(Feed::Md5))
                .col(timestamp_with_time_zone(Feed::Time))
                .col(string(Feed::SourceName))
                .col(boolean(Feed::Parsed).default(false))
                .col(text(Feed::Title))
                .col(text(Feed::Description))
                .col(text(Feed::FullText))
                .col(string(Feed::Link))
                .col(string_null(Feed::Enclosure))
                .col(string_null(Feed::Category))
                .to_owned(),
        )
        .await?;

        m.create_index(
            Index::create()
                .name("idx_feed_unparsed")
                .table(Feed::Table)
                .col(Feed::Parsed)
                .col(Feed::Id)
                .to_owned(),
        )
        .await
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.drop_table(Table::drop().table(Feed::Table).to_owned())
            .await
    }
}
