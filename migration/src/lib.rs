#![allow(elided_lifetimes_in_paths)]
#![allow(clippy::wildcard_imports)]
pub use sea_orm_migration::prelude::*;
mod m20200101_000001_pgvectors;
mod m20250301_000001_feed;
mod m20250301_000002_clusters;
mod m20250301_000003_memberships;
mod m20250301_000004_region_words;
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20200101_000001_pgvectors::Migration),
            Box::new(m20250301_000001_feed::Migration),
            Box::new(m20250301_000002_clusters::Migration),
            Box::new(m20250301_000003_memberships::Migration),
            Box::new(m20250301_000004_region_words::Migration),
            // inject-above (do not remove this comment)
        ]
    }
}
