//! `stats` subcommand rendering.

use anyhow::Result;
use clap::Args;

use crate::database::EventStore;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Emit statistics as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn print_stats(db: &EventStore, args: &StatsArgs) -> Result<()> {
    let stats = db.get_statistics()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("  Events:            {}", stats.total_events);
    println!("  Tracked vehicles:  {}", stats.unique_tracks);
    println!("  Plates recognized: {}", stats.plates_recognized);
    println!("  Video span:        {:.1}s", stats.video_span_secs);

    if !stats.by_label.is_empty() {
        println!();
        println!("  By label:");
        for (label, count) in &stats.by_label {
            println!("    {:<12} {}", label, count);
        }
    }
    if !stats.by_color.is_empty() {
        println!();
        println!("  By color:");
        for (color, count) in &stats.by_color {
            println!("    {:<12} {}", color, count);
        }
    }
    println!();
    Ok(())
}
