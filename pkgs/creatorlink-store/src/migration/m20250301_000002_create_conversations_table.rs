use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Conversations {
    Table,
    Id,
    CreatorId,
    BrandId,
    CampaignName,
    CreatorArchivedAt,
    BrandArchivedAt,
    CreatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000002_create_conversations_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Conversations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Conversations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Conversations::CreatorId).string().not_null())
                    .col(ColumnDef::new(Conversations::BrandId).string().not_null())
                    .col(ColumnDef::new(Conversations::CampaignName).string())
                    .col(ColumnDef::new(Conversations::CreatorArchivedAt).big_integer())
                    .col(ColumnDef::new(Conversations::BrandArchivedAt).big_integer())
                    .col(
                        ColumnDef::new(Conversations::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One conversation per creator/brand pair
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_conversations_pair")
                    .table(Conversations::Table)
                    .col(Conversations::CreatorId)
                    .col(Conversations::BrandId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_conversations_brand")
                    .table(Conversations::Table)
                    .col(Conversations::BrandId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Conversations::Table).to_owned())
            .await
    }
}
