use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202510010005_create_class_sessions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("class_sessions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("teacher_id"))
                            .big_integer()
                            .not_null(),
                    )
                    // NULL for extra (unscheduled) classes
                    .col(ColumnDef::new(Alias::new("slot_id")).big_integer().null())
                    .col(ColumnDef::new(Alias::new("session_date")).date().not_null())
                    .col(ColumnDef::new(Alias::new("started_at")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("ended_at")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("active_seconds"))
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Alias::new("last_tick_at")).timestamp().not_null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .enumeration(
                                Alias::new("session_status"),
                                vec![Alias::new("ongoing"), Alias::new("completed")],
                            )
                            .not_null()
                            .default("ongoing"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("resumption_count"))
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_teacher")
                            .from(Alias::new("class_sessions"), Alias::new("teacher_id"))
                            .to(Alias::new("teachers"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_slot")
                            .from(Alias::new("class_sessions"), Alias::new("slot_id"))
                            .to(Alias::new("schedule_slots"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One session per (teacher, slot, local date); NULL slots never collide.
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_teacher_slot_date")
                    .table(Alias::new("class_sessions"))
                    .col(Alias::new("teacher_id"))
                    .col(Alias::new("slot_id"))
                    .col(Alias::new("session_date"))
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // At most one ongoing session per teacher.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_ongoing \
                 ON class_sessions (teacher_id) WHERE status = 'ongoing'",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("class_sessions")).to_owned())
            .await
    }
}
