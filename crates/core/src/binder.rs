//! Matches extracted entities to action fields and writes the coerced values.

use std::collections::HashMap;

use tracing::debug;

use crate::action::{Action, FieldDescriptor};
use crate::coercion::coerce;
use crate::nlu::{EntityOrigin, ExtractedEntity};
use crate::value::RawValue;

/// Picks one entity when several share a field's name.
pub trait TieBreak: Send + Sync {
    /// Returns the index into `candidates`, or `None` to leave the choice open.
    fn choose(&self, field: &FieldDescriptor, candidates: &[&ExtractedEntity]) -> Option<usize>;
}

impl<F> TieBreak for F
where
    F: Fn(&FieldDescriptor, &[&ExtractedEntity]) -> Option<usize> + Send + Sync,
{
    fn choose(&self, field: &FieldDescriptor, candidates: &[&ExtractedEntity]) -> Option<usize> {
        self(field, candidates)
    }
}

/// Fills every writable field of `action` from `entities`.
///
/// Returns `true` only when all writable fields were set. Values written
/// before a later field fails are kept.
pub fn bind(
    action: &mut dyn Action,
    fields: &[FieldDescriptor],
    entities: &[ExtractedEntity],
    tie_break: Option<&dyn TieBreak>,
) -> bool {
    if entities.is_empty() {
        return false;
    }

    let entities = merge_resolutions(entities);
    let mut satisfied = true;

    for field in fields.iter().filter(|field| field.writable) {
        let candidates =
            entities.iter().filter(|entity| entity.type_tag == field.name).collect::<Vec<_>>();

        let chosen = match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => tie_break
                .and_then(|strategy| strategy.choose(field, many))
                .and_then(|index| many.get(index).copied()),
        };

        let raw = match chosen {
            Some(entity) => Some(entity.binding_value()),
            None => concatenated_collections(&candidates),
        };

        satisfied &= match raw {
            Some(raw) => write_field(action, field, &raw),
            None => false,
        };
    }

    satisfied
}

/// Coerces `raw` into the named field. Unknown and read-only fields are rejected.
pub fn assign_value(action: &mut dyn Action, field_name: &str, raw: &RawValue) -> bool {
    let Some(field) = action.fields().into_iter().find(|field| field.name == field_name) else {
        debug!(
            event_name = "engine.binder.unknown_field",
            action_type = action.type_name(),
            field = field_name,
            "no such field on action"
        );
        return false;
    };

    if !field.writable {
        return false;
    }

    write_field(action, &field, raw)
}

fn write_field(action: &mut dyn Action, field: &FieldDescriptor, raw: &RawValue) -> bool {
    let value = match coerce(raw, &field.declared_type) {
        Ok(value) => value,
        Err(error) => {
            debug!(
                event_name = "engine.binder.coercion_failed",
                action_type = action.type_name(),
                field = field.name,
                error = %error,
                "value left unassigned"
            );
            return false;
        }
    };

    match action.assign(field.name, value) {
        Ok(()) => true,
        Err(error) => {
            debug!(
                event_name = "engine.binder.assignment_failed",
                action_type = action.type_name(),
                field = field.name,
                error = %error,
                "value left unassigned"
            );
            false
        }
    }
}

/// Lets a built-in recognizer supply the value for the single custom entity
/// sharing its type tag. Works on a copy; the caller's entities are untouched.
fn merge_resolutions(entities: &[ExtractedEntity]) -> Vec<ExtractedEntity> {
    let mut merged = entities.to_vec();

    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, entity) in entities.iter().enumerate() {
        groups.entry(entity.type_tag.as_str()).or_default().push(index);
    }

    for members in groups.values().filter(|members| members.len() > 1) {
        let custom = members
            .iter()
            .copied()
            .filter(|index| entities[*index].origin == EntityOrigin::Custom)
            .collect::<Vec<_>>();
        let [target] = custom.as_slice() else {
            continue;
        };

        let donor = members
            .iter()
            .copied()
            .find(|index| index != target && !entities[*index].resolutions.is_empty());
        if let Some(donor) = donor {
            merged[*target].resolutions = entities[donor].resolutions.clone();
        }
    }

    merged
}

/// Several candidates whose first resolutions are all collections bind as one
/// concatenated collection.
fn concatenated_collections(candidates: &[&ExtractedEntity]) -> Option<RawValue> {
    if candidates.is_empty() {
        return None;
    }

    let mut values = Vec::new();
    for entity in candidates {
        match entity.first_resolution() {
            Some(RawValue::Collection(items)) => values.extend(items.iter().cloned()),
            _ => return None,
        }
    }
    Some(RawValue::Collection(values))
}
