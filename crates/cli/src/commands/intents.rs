use parley_agent::handlers::default_registry;
use parley_core::registry::ActionRegistry;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_SETUP};

#[derive(Debug, Serialize)]
struct IntentsReport {
    command: &'static str,
    status: &'static str,
    intents: Vec<IntentEntry>,
}

#[derive(Debug, Serialize)]
struct IntentEntry {
    intent: String,
    action_type: &'static str,
    description: &'static str,
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Serialize)]
struct FieldEntry {
    name: &'static str,
    declared_type: String,
    writable: bool,
}

pub fn run(json: bool) -> CommandResult {
    let registry = match default_registry() {
        Ok(registry) => registry,
        Err(error) => return CommandResult::failure("intents", "registry", error.to_string(), EXIT_SETUP),
    };

    let report = IntentsReport { command: "intents", status: "ok", intents: entries(&registry) };
    if json {
        return CommandResult::report("intents", &report);
    }

    let mut lines = vec![format!("{} intents registered:", report.intents.len())];
    for entry in &report.intents {
        let fields = entry
            .fields
            .iter()
            .map(|field| {
                let marker = if field.writable { "" } else { " (read-only)" };
                format!("{}: {}{marker}", field.name, field.declared_type)
            })
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "- {} -> {} [{}] {}",
            entry.intent, entry.action_type, fields, entry.description
        ));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn entries(registry: &ActionRegistry) -> Vec<IntentEntry> {
    let mut entries = registry
        .descriptors()
        .map(|descriptor| IntentEntry {
            intent: descriptor.intent_name.clone(),
            action_type: descriptor.action_type.name,
            description: descriptor.action_type.description,
            fields: descriptor
                .fields
                .iter()
                .map(|field| FieldEntry {
                    name: field.name,
                    declared_type: field.declared_type.to_string(),
                    writable: field.writable,
                })
                .collect(),
        })
        .collect::<Vec<_>>();
    entries.sort_by(|left, right| left.intent.cmp(&right.intent));
    entries
}
