use std::collections::HashMap;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shoebox_core::Pipeline;

pub fn run(pipeline: &Pipeline) -> Result<()> {
    let photos = pipeline.photos()?;
    if photos.is_empty() {
        println!("No photos ingested yet.");
        return Ok(());
    }

    let labels: HashMap<i64, String> = pipeline
        .persons()?
        .into_iter()
        .map(|p| (p.id, p.label))
        .collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Filename", "Validated", "Persons"]);

    for photo in &photos {
        let persons = pipeline
            .catalog()
            .people_in_photo(photo.id)?
            .iter()
            .map(|id| labels.get(id).cloned().unwrap_or_else(|| id.to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            photo.id.to_string(),
            photo.filename.clone(),
            if photo.is_new { "no" } else { "yes" }.to_string(),
            persons,
        ]);
    }

    println!("{table}");
    Ok(())
}
