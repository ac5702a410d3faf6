use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use shoebox_core::Pipeline;

pub fn run(pipeline: &Pipeline) -> Result<()> {
    let persons = pipeline.persons()?;
    if persons.is_empty() {
        println!("No persons discovered yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Label", "Photos"]);

    for person in &persons {
        let photo_count = pipeline.catalog().photos_of_person(person.id)?.len();
        table.add_row(vec![
            person.id.to_string(),
            person.label.clone(),
            photo_count.to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}
