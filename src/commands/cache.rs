//! Cache command implementation

use crate::cache::DiskCache;
use crate::cli::{CacheArgs, CacheCommand};
use crate::error::Result;

/// Run cache command
pub fn run(args: CacheArgs) -> Result<()> {
    let disk = DiskCache::open_default()?;

    match args.command {
        Some(CacheCommand::List) => {
            show_stats(&disk)?;
            println!();
            list_sources(&disk)
        }
        Some(CacheCommand::Clear { slug: Some(slug) }) => {
            disk.remove_source(&slug)?;
            println!("Removed {slug} from cache.");
            Ok(())
        }
        Some(CacheCommand::Clear { slug: None }) => {
            disk.clear()?;
            println!("Cache cleared.");
            Ok(())
        }
        None => {
            show_stats(&disk)?;
            Ok(())
        }
    }
}

fn show_stats(disk: &DiskCache) -> Result<()> {
    let stats = disk.stats()?;

    println!("Cache Statistics:");
    println!("  Location: {}", disk.root().display());
    println!("  Sources: {}", stats.sources);
    println!("  Tags: {}", stats.tags);
    println!("  Size: {}", stats.formatted_size());

    if stats.sources == 0 {
        println!("\nCache is empty.");
    } else {
        println!("\nRun 'overlay cache list' to list cached sources.");
        println!("Run 'overlay cache clear' to remove everything from cache.");
        println!("Run 'overlay cache clear <slug>' to remove one source.");
    }
    Ok(())
}

fn list_sources(disk: &DiskCache) -> Result<()> {
    let sources = disk.list_sources()?;
    if sources.is_empty() {
        println!("No cached sources.");
        return Ok(());
    }

    println!("Cached sources ({}):", sources.len());
    for source in &sources {
        println!(
            "  {} ({} tag{}, {}{})",
            source.slug,
            source.tags,
            if source.tags == 1 { "" } else { "s" },
            source.formatted_size(),
            if source.has_clone { ", clone" } else { "" }
        );
    }
    Ok(())
}
