use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_brands_table::Migration),
            Box::new(m20240101_000002_create_frames_table::Migration),
            Box::new(m20240101_000003_create_employees_table::Migration),
            Box::new(m20240101_000004_create_orders_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_brands_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_brands_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Brands::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Brands::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Brands::Name).string().not_null())
                        .col(ColumnDef::new(Brands::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Brands::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Brands {
        Table,
        Id,
        Name,
        CreatedAt,
    }
}

mod m20240101_000002_create_frames_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_frames_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Frames::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Frames::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Frames::Name).string().not_null())
                        .col(ColumnDef::new(Frames::BrandId).uuid().null())
                        .col(ColumnDef::new(Frames::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_frames_brand_id")
                        .table(Frames::Table)
                        .col(Frames::BrandId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Frames::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Frames {
        Table,
        Id,
        Name,
        BrandId,
        CreatedAt,
    }
}

mod m20240101_000003_create_employees_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_employees_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Employees::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::Email).string().not_null())
                        .col(ColumnDef::new(Employees::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_employees_email")
                        .table(Employees::Table)
                        .col(Employees::Email)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Employees {
        Table,
        Id,
        Name,
        Email,
        CreatedAt,
    }
}

mod m20240101_000004_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Orders table aligned with entities::order Model. The lifecycle
            // columns stay independently queryable; the list views filter on
            // exactly paid_for_on / completed_on / assigned_to.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Orders::Description).string().not_null())
                        .col(ColumnDef::new(Orders::Price).decimal().not_null())
                        .col(ColumnDef::new(Orders::FrameId).uuid().not_null())
                        .col(ColumnDef::new(Orders::AssignedTo).uuid().null())
                        .col(
                            ColumnDef::new(Orders::State)
                                .string()
                                .not_null()
                                .default("new"),
                        )
                        .col(ColumnDef::new(Orders::PaidForOn).timestamp().null())
                        .col(ColumnDef::new(Orders::CompletedOn).timestamp().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_state")
                        .table(Orders::Table)
                        .col(Orders::State)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_paid_for_on")
                        .table(Orders::Table)
                        .col(Orders::PaidForOn)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_completed_on")
                        .table(Orders::Table)
                        .col(Orders::CompletedOn)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_assigned_to")
                        .table(Orders::Table)
                        .col(Orders::AssignedTo)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_frame_id")
                        .table(Orders::Table)
                        .col(Orders::FrameId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        CustomerName,
        CustomerEmail,
        Description,
        Price,
        FrameId,
        AssignedTo,
        State,
        PaidForOn,
        CompletedOn,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}
