use std::path::Path;

use anyhow::Result;
use mediaenc::job::Queue;

use crate::prompt;
use crate::wizard;
use crate::AppContext;

/// Import-queue mode: merge exported queue files, review the combined
/// plan, then start or re-export.
pub async fn run(ctx: &AppContext) -> Result<()> {
    println!("\n=== IMPORT QUEUE ===");
    let mut queue = Queue::new();

    loop {
        let raw = prompt::ask("\nQueue file to import (q=done): ")?;
        if prompt::is_back(&raw) {
            break;
        }
        let path = prompt::clean_path(&raw);
        match queue.merge(&path, &ctx.catalog) {
            Ok(count) => println!("Imported {} job(s); queue now holds {}.", count, queue.len()),
            // a failed merge leaves the queue as it was
            Err(e) => println!("Import failed: {}", e),
        }
    }

    if queue.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }

    wizard::print_plan(queue.jobs());

    loop {
        let choice = prompt::ask("\n[1] Start  [2] Re-export combined queue  [q] Back: ")?;
        if prompt::is_back(&choice) {
            return Ok(());
        }
        match choice.as_str() {
            "1" => return wizard::run_jobs(ctx, queue.jobs()).await,
            "2" => {
                let dest = prompt::ask("Export path: ")?;
                if prompt::is_back(&dest) || dest.is_empty() {
                    continue;
                }
                match queue.export(Path::new(&dest)) {
                    Ok(()) => println!("Queue exported to {}.", dest),
                    Err(e) => println!("Export failed: {}", e),
                }
            }
            _ => println!("Invalid choice."),
        }
    }
}
