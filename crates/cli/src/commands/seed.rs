use crate::commands::{with_pool, CommandError, CommandResult, ErrorClass};
use yesfree_db::{migrations, DemoSeedDataset};

pub fn run() -> CommandResult {
    with_pool("seed", |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::Migration, error.to_string()))?;

        let loaded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::SeedExecution, error.to_string()))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| CommandError::new(ErrorClass::SeedVerification, error.to_string()))?;
        if !verification.all_present {
            return Err(CommandError::new(
                ErrorClass::SeedVerification,
                verification_message(&verification.checks),
            ));
        }

        let users = loaded
            .users_seeded
            .iter()
            .map(|user| format!("  - {}: {}", user.user_id, user.description))
            .collect::<Vec<_>>();
        Ok(format!("demo checkout dataset loaded and verified:\n{}", users.join("\n")))
    })
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed.join(", "))
    }
}
