use crate::commands::{with_pool, CommandError, CommandResult, ErrorClass};
use yesfree_db::migrations;

pub fn run() -> CommandResult {
    with_pool("migrate", |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::Migration, error.to_string()))?;
        Ok("schema is up to date".to_string())
    })
}
