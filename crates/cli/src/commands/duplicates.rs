use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shoebox_core::Pipeline;

pub fn run(pipeline: &Pipeline) -> Result<()> {
    let links = pipeline.duplicates()?;
    if links.is_empty() {
        println!("No duplicate links recorded.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Photo", "Duplicate of", "Reason"]);

    for link in &links {
        let photo = pipeline.catalog().get_photo(link.photo_id)?;
        let original = pipeline.catalog().get_photo(link.duplicate_of_id)?;
        table.add_row(vec![photo.filename, original.filename, link.reason.clone()]);
    }

    println!("{table}");
    Ok(())
}
