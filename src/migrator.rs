use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240401_000001_create_product_master_table::Migration),
            Box::new(m20240401_000002_create_reference_catalog_table::Migration),
            Box::new(m20240401_000003_create_transaction_records_table::Migration),
            Box::new(m20240401_000004_create_code_sequences_table::Migration),
            Box::new(m20240401_000005_create_unit_names_table::Migration),
        ]
    }
}

mod m20240401_000001_create_product_master_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240401_000001_create_product_master_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductMaster::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMaster::ProductCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductMaster::YjCode).string().not_null())
                        .col(ColumnDef::new(ProductMaster::ProductName).string().not_null())
                        .col(ColumnDef::new(ProductMaster::Origin).string().not_null())
                        .col(
                            ColumnDef::new(ProductMaster::KanaName)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::MakerName)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::PackageSpec)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::YjUnitName)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::YjPackUnitQty)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(flag_column(ProductMaster::FlagPoison))
                        .col(flag_column(ProductMaster::FlagDeleterious))
                        .col(flag_column(ProductMaster::FlagNarcotic))
                        .col(flag_column(ProductMaster::FlagPsychotropic))
                        .col(flag_column(ProductMaster::FlagStimulant))
                        .col(flag_column(ProductMaster::FlagStimulantRaw))
                        .col(
                            ColumnDef::new(ProductMaster::JanPackInnerQty)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::JanUnitCode)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::JanPackUnitQty)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::ReorderPoint)
                                .double()
                                .not_null()
                                .default(0.0),
                        )
                        .col(
                            ColumnDef::new(ProductMaster::NhiPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_master_yj_code")
                        .table(ProductMaster::Table)
                        .col(ProductMaster::YjCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_master_kana_name")
                        .table(ProductMaster::Table)
                        .col(ProductMaster::KanaName)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductMaster::Table).to_owned())
                .await
        }
    }

    fn flag_column(col: ProductMaster) -> ColumnDef {
        ColumnDef::new(col).integer().not_null().default(0).to_owned()
    }

    #[derive(DeriveIden)]
    enum ProductMaster {
        Table,
        ProductCode,
        YjCode,
        ProductName,
        Origin,
        KanaName,
        MakerName,
        PackageSpec,
        YjUnitName,
        YjPackUnitQty,
        FlagPoison,
        FlagDeleterious,
        FlagNarcotic,
        FlagPsychotropic,
        FlagStimulant,
        FlagStimulantRaw,
        JanPackInnerQty,
        JanUnitCode,
        JanPackUnitQty,
        ReorderPoint,
        NhiPrice,
    }
}

mod m20240401_000002_create_reference_catalog_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240401_000002_create_reference_catalog_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Vendor numerics are kept as text and parsed on read
            manager
                .create_table(
                    Table::create()
                        .table(ReferenceCatalog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReferenceCatalog::JanCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ReferenceCatalog::YjCode).string().not_null())
                        .col(
                            ColumnDef::new(ReferenceCatalog::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReferenceCatalog::KanaName).string().not_null())
                        .col(
                            ColumnDef::new(ReferenceCatalog::MakerName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReferenceCatalog::PackageSpec)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReferenceCatalog::YjUnitName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReferenceCatalog::YjPackUnitQty)
                                .string()
                                .not_null(),
                        )
                        .col(flag_column(ReferenceCatalog::FlagPoison))
                        .col(flag_column(ReferenceCatalog::FlagDeleterious))
                        .col(flag_column(ReferenceCatalog::FlagNarcotic))
                        .col(flag_column(ReferenceCatalog::FlagPsychotropic))
                        .col(flag_column(ReferenceCatalog::FlagStimulant))
                        .col(flag_column(ReferenceCatalog::FlagStimulantRaw))
                        .col(
                            ColumnDef::new(ReferenceCatalog::JanPackInnerQty)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ReferenceCatalog::JanUnitCode).string().null())
                        .col(
                            ColumnDef::new(ReferenceCatalog::JanPackUnitQty)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(ReferenceCatalog::NhiPrice).string().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReferenceCatalog::Table).to_owned())
                .await
        }
    }

    fn flag_column(col: ReferenceCatalog) -> ColumnDef {
        ColumnDef::new(col).integer().not_null().default(0).to_owned()
    }

    #[derive(DeriveIden)]
    enum ReferenceCatalog {
        Table,
        JanCode,
        YjCode,
        ProductName,
        KanaName,
        MakerName,
        PackageSpec,
        YjUnitName,
        YjPackUnitQty,
        FlagPoison,
        FlagDeleterious,
        FlagNarcotic,
        FlagPsychotropic,
        FlagStimulant,
        FlagStimulantRaw,
        JanPackInnerQty,
        JanUnitCode,
        JanPackUnitQty,
        NhiPrice,
    }
}

mod m20240401_000003_create_transaction_records_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240401_000003_create_transaction_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TransactionRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionRecords::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransactionRecords::TransactionDate)
                                .date()
                                .not_null(),
                        )
                        .col(text_column(TransactionRecords::ClientCode))
                        .col(text_column(TransactionRecords::ReceiptNumber))
                        .col(text_column(TransactionRecords::LineNumber))
                        .col(ColumnDef::new(TransactionRecords::Flag).integer().not_null())
                        .col(text_column(TransactionRecords::ProductCode))
                        .col(text_column(TransactionRecords::YjCode))
                        .col(text_column(TransactionRecords::ProductName))
                        .col(text_column(TransactionRecords::KanaName))
                        .col(text_column(TransactionRecords::PackageForm))
                        .col(text_column(TransactionRecords::PackageSpec))
                        .col(text_column(TransactionRecords::MakerName))
                        .col(qty_column(TransactionRecords::DatQuantity))
                        .col(qty_column(TransactionRecords::JanPackInnerQty))
                        .col(qty_column(TransactionRecords::JanQuantity))
                        .col(qty_column(TransactionRecords::JanPackUnitQty))
                        .col(text_column(TransactionRecords::JanUnitName))
                        .col(text_column(TransactionRecords::JanUnitCode))
                        .col(qty_column(TransactionRecords::YjQuantity))
                        .col(qty_column(TransactionRecords::YjPackUnitQty))
                        .col(text_column(TransactionRecords::YjUnitName))
                        .col(money_column(TransactionRecords::UnitPrice))
                        .col(money_column(TransactionRecords::Subtotal))
                        .col(money_column(TransactionRecords::TaxAmount))
                        .col(money_column(TransactionRecords::TaxRate))
                        .col(text_column(TransactionRecords::ExpiryDate))
                        .col(text_column(TransactionRecords::LotNumber))
                        .col(flag_column(TransactionRecords::FlagPoison))
                        .col(flag_column(TransactionRecords::FlagDeleterious))
                        .col(flag_column(TransactionRecords::FlagNarcotic))
                        .col(flag_column(TransactionRecords::FlagPsychotropic))
                        .col(flag_column(TransactionRecords::FlagStimulant))
                        .col(flag_column(TransactionRecords::FlagStimulantRaw))
                        .col(
                            ColumnDef::new(TransactionRecords::ProcessFlag)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionRecords::ProcessingStatus)
                                .string()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Natural key of an imported line; replaced rather than duplicated on re-import
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_records_date_receipt_line")
                        .table(TransactionRecords::Table)
                        .col(TransactionRecords::TransactionDate)
                        .col(TransactionRecords::ReceiptNumber)
                        .col(TransactionRecords::LineNumber)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_records_product_code")
                        .table(TransactionRecords::Table)
                        .col(TransactionRecords::ProductCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_records_process_flag")
                        .table(TransactionRecords::Table)
                        .col(TransactionRecords::ProcessFlag)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransactionRecords::Table).to_owned())
                .await
        }
    }

    fn text_column(col: TransactionRecords) -> ColumnDef {
        ColumnDef::new(col).string().not_null().default("").to_owned()
    }

    fn qty_column(col: TransactionRecords) -> ColumnDef {
        ColumnDef::new(col).double().not_null().default(0.0).to_owned()
    }

    fn money_column(col: TransactionRecords) -> ColumnDef {
        ColumnDef::new(col)
            .decimal_len(16, 4)
            .not_null()
            .default(0)
            .to_owned()
    }

    fn flag_column(col: TransactionRecords) -> ColumnDef {
        ColumnDef::new(col).integer().not_null().default(0).to_owned()
    }

    #[derive(DeriveIden)]
    enum TransactionRecords {
        Table,
        Id,
        TransactionDate,
        ClientCode,
        ReceiptNumber,
        LineNumber,
        Flag,
        ProductCode,
        YjCode,
        ProductName,
        KanaName,
        PackageForm,
        PackageSpec,
        MakerName,
        DatQuantity,
        JanPackInnerQty,
        JanQuantity,
        JanPackUnitQty,
        JanUnitName,
        JanUnitCode,
        YjQuantity,
        YjPackUnitQty,
        YjUnitName,
        UnitPrice,
        Subtotal,
        TaxAmount,
        TaxRate,
        ExpiryDate,
        LotNumber,
        FlagPoison,
        FlagDeleterious,
        FlagNarcotic,
        FlagPsychotropic,
        FlagStimulant,
        FlagStimulantRaw,
        ProcessFlag,
        ProcessingStatus,
    }
}

mod m20240401_000004_create_code_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240401_000004_create_code_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CodeSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CodeSequences::Name)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CodeSequences::LastNo)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // Counter behind generated YJ codes
            let seed = Query::insert()
                .into_table(CodeSequences::Table)
                .columns([CodeSequences::Name, CodeSequences::LastNo])
                .values_panic(["MA2Y".into(), 0i64.into()])
                .to_owned();
            manager.exec_stmt(seed).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CodeSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CodeSequences {
        Table,
        Name,
        LastNo,
    }
}

mod m20240401_000005_create_unit_names_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240401_000005_create_unit_names_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UnitNames::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UnitNames::Code)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(UnitNames::Name).string().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UnitNames::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UnitNames {
        Table,
        Code,
        Name,
    }
}
