use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shoebox_core::Pipeline;

pub fn run(pipeline: &Pipeline) -> Result<()> {
    let stats = pipeline.status()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Count"]);

    table.add_row(vec!["Photos".to_string(), stats.total_photos.to_string()]);
    table.add_row(vec!["Persons".to_string(), stats.total_persons.to_string()]);
    table.add_row(vec![
        "Photo-person associations".to_string(),
        stats.total_associations.to_string(),
    ]);
    table.add_row(vec![
        "Duplicate links".to_string(),
        stats.total_duplicate_links.to_string(),
    ]);
    table.add_row(vec![
        "Awaiting validation".to_string(),
        stats.unvalidated_photos.to_string(),
    ]);

    println!("{table}");
    Ok(())
}
