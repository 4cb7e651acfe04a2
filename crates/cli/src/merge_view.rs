//! Rendering and interactive resolution of a merge-operation tree.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::Select;

use docsync_core::merge::{ClassMergeOperation, MergeFrom, MergeOperation, Resolvable};

use crate::style;

const PREVIEW: usize = 40;

/// Print every class and field that differs.
pub fn print_tree(operations: &[ClassMergeOperation]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Class", "Field", "Change", "Local", "Incoming", "Choice"]);

    for op in operations {
        let auto = op.is_auto_accepted();
        if let Some(body) = &op.body {
            table.add_row(row(op, "body", body, auto));
        }
        for member in op.member_ops() {
            table.add_row(row(op, &format!("member {}", member.id), member, auto));
        }
    }

    println!();
    println!(
        "{}",
        style::header(&format!("Merge plan ({} class(es))", operations.len()))
    );
    println!("{table}");
    println!();
}

fn row<R>(op: &ClassMergeOperation, field: &str, sub: &R, auto: bool) -> Vec<Cell>
where
    R: Resolvable + Sides,
{
    let change = if op.operation == MergeOperation::None {
        sub.operation().to_string()
    } else {
        format!("{} (class {})", sub.operation(), op.operation)
    };
    let choice = match (sub.resolution(), auto) {
        (Some(from), _) => from.to_string(),
        (None, true) => "auto".to_string(),
        (None, false) => "unresolved".to_string(),
    };
    vec![
        Cell::new(op.id),
        Cell::new(field),
        Cell::new(change),
        Cell::new(sub.local_text().map_or_else(|| "—".into(), |t| style::preview(t, PREVIEW))),
        Cell::new(
            sub.incoming_text()
                .map_or_else(|| "—".into(), |t| style::preview(t, PREVIEW)),
        ),
        Cell::new(choice),
    ]
}

/// Read-only access to both sides of a field-level operation.
pub trait Sides {
    fn local_text(&self) -> Option<&str>;
    fn incoming_text(&self) -> Option<&str>;
}

impl Sides for docsync_core::merge::BodyMergeOperation {
    fn local_text(&self) -> Option<&str> {
        self.local.as_deref()
    }
    fn incoming_text(&self) -> Option<&str> {
        self.incoming.as_deref()
    }
}

impl Sides for docsync_core::merge::MemberMergeOperation {
    fn local_text(&self) -> Option<&str> {
        self.local.as_deref()
    }
    fn incoming_text(&self) -> Option<&str> {
        self.incoming.as_deref()
    }
}

/// Prompt for every unresolved field. Auto-accepted deletions are not asked.
pub fn resolve_interactively(operations: &mut [ClassMergeOperation]) -> Result<()> {
    for op in operations.iter_mut() {
        if op.is_auto_accepted() {
            continue;
        }
        let class_id = op.id;
        if let Some(body) = op.body.as_mut().filter(|b| !b.is_resolved()) {
            prompt(&format!("class {class_id} body"), body)?;
        }
        for member in op.members.iter_mut().flatten().filter(|m| !m.is_resolved()) {
            prompt(&format!("class {class_id} member {}", member.id), member)?;
        }
    }
    Ok(())
}

fn prompt<R: Resolvable + Sides>(label: &str, sub: &mut R) -> Result<()> {
    println!();
    println!("{} ({})", style::header(label), sub.operation());
    println!("  local   : {}", sub.local_text().unwrap_or("—"));
    println!("  incoming: {}", sub.incoming_text().unwrap_or("—"));

    let choice = Select::new()
        .with_prompt("Keep which side?")
        .items(&["local", "incoming", "decide later"])
        .default(0)
        .interact()
        .context("failed to read choice")?;
    match choice {
        0 => sub.resolve(MergeFrom::Local),
        1 => sub.resolve(MergeFrom::Incoming),
        _ => println!("{}", style::dim("left unresolved")),
    }
    Ok(())
}
