use ecoquest_core::Config;

use super::{open_engine, print_json};

/// Prints the audit and fails when the stored total has drifted.
pub fn run(user_id: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine(config)?;
    let audit = engine.reconcile_user(user_id)?;
    print_json(&serde_json::json!({
        "user_id": audit.user_id,
        "total_points": audit.total_points,
        "ledger_points": audit.ledger_points,
        "bonus_points": audit.bonus_points,
        "expected_total": audit.expected_total(),
        "consistent": audit.is_consistent(),
    }))?;

    if !audit.is_consistent() {
        return Err(format!(
            "total_points {} does not match ledger + bonuses {}",
            audit.total_points,
            audit.expected_total()
        )
        .into());
    }
    Ok(())
}
