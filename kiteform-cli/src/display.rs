//! Terminal rendering of plans and effects

use colored::Colorize;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use kiteform_core::effect::Effect;
use kiteform_core::plan::Plan;
use kiteform_provider_buildkite::{PipelineConfig, PipelineState};

pub type PipelineEffect = Effect<PipelineConfig, PipelineState>;
pub type PipelinePlan = Plan<PipelineConfig, PipelineState>;

const ATTR_INDENT: &str = "      ";

pub fn print_plan(plan: &PipelinePlan) {
    if plan.is_empty() {
        println!("{}", "No changes. Pipelines are up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        print_effect(effect);
        println!();
    }

    let summary = plan.summary();
    println!(
        "Plan: {} to create, {} to update, {} to delete.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red()
    );
}

fn print_effect(effect: &PipelineEffect) {
    match effect {
        Effect::Create(resource) => {
            println!("  {} {}", "+".green().bold(), resource.id.to_string().cyan().bold());
            let attributes = to_object(&resource.attributes);
            for (key, value) in &attributes {
                if is_empty_value(value) {
                    continue;
                }
                println!("{}{}: {}", ATTR_INDENT, key, format_value(value).green());
            }
        }
        Effect::Update {
            id,
            from,
            to,
            changed_attributes,
        } => {
            println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
            let old = from.attributes.as_ref().map(to_object).unwrap_or_default();
            let new = to_object(&to.attributes);
            for key in changed_attributes {
                print_change(key, old.get(key), new.get(key));
            }
        }
        Effect::Delete { id, identifier } => {
            println!("  {} {}", "-".red().bold(), id.to_string().cyan().bold());
            println!("{}{}: {}", ATTR_INDENT, "slug".bold(), identifier.red().bold());
        }
    }
}

fn print_change(key: &str, old: Option<&Value>, new: Option<&Value>) {
    let old = old.cloned().unwrap_or(Value::Null);
    let new = new.cloned().unwrap_or(Value::Null);

    match (&old, &new) {
        (Value::String(a), Value::String(b)) if a.contains('\n') || b.contains('\n') => {
            println!("{}{}:", ATTR_INDENT, key);
            print_text_diff(a, b);
        }
        _ => println!(
            "{}{}: {} → {}",
            ATTR_INDENT,
            key,
            format_value(&old).red(),
            format_value(&new).green()
        ),
    }
}

fn print_text_diff(old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => println!("{}  {} {}", ATTR_INDENT, "-".red(), line.red()),
            ChangeTag::Insert => println!("{}  {} {}", ATTR_INDENT, "+".green(), line.green()),
            ChangeTag::Equal => println!("{}    {}", ATTR_INDENT, line),
        }
    }
}

pub fn format_effect(effect: &PipelineEffect) -> String {
    match effect {
        Effect::Create(r) => format!("Create {}", r.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Delete { id, identifier } => format!("Delete {} ({})", id, identifier),
    }
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(items) if items.len() > 1 => format!("[{} items]", items.len()),
        other => other.to_string(),
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> serde_json::Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
