//! ---
//! ah_section: "05-networking-external-interfaces"
//! ah_subsection: "binary"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Operator CLI driving the autoheal pipeline."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use autoheal_common::AppConfig;
use autoheal_resilience::{FailureState, HealingAction, ValueTable};
use strum::IntoEnumIterator;

pub fn show(config: &AppConfig) -> Result<()> {
    let path = config.paths.value_table();
    if !path.exists() {
        println!("No value table found at {}. Run `autohealctl train` first.", path.display());
        return Ok(());
    }
    let table = ValueTable::load(&path)
        .with_context(|| format!("unable to load value table {}", path.display()))?;
    print_table(&table);
    Ok(())
}

pub fn print_table(table: &ValueTable) {
    println!("Learned value table:");
    print!("{:<20}", "");
    for action in HealingAction::iter() {
        print!("{:>26}", action.as_str());
    }
    println!();
    for state in FailureState::failures() {
        print!("{:<20}", state.as_str());
        for (_, value) in table.row(state) {
            print!("{:>26.3}", value);
        }
        println!();
    }

    println!();
    println!("Best strategies:");
    for best in table.summary() {
        println!("{}: {} (value={:.3})", best.state, best.action, best.value);
    }
}
