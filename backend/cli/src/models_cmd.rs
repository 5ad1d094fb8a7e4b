//! `chatdeck models`: the model catalog in effect.

use anyhow::Result;
use chatdeck_core::ModelCatalog;

use crate::context::AppContext;
use crate::terminal_output::{render_table, Column};

pub fn render_models(catalog: &ModelCatalog, selected: &str) -> String {
    let columns = vec![
        Column::left(""),
        Column::left("ID"),
        Column::left("Name"),
        Column::right("Max tokens"),
        Column::right("Default"),
    ];
    let rows: Vec<Vec<String>> = catalog
        .list()
        .iter()
        .map(|model| {
            vec![
                if model.id == selected { "*" } else { "" }.to_string(),
                model.id.clone(),
                model.name.clone(),
                model.max_limit.to_string(),
                model.default_max_tokens().to_string(),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

pub fn run(ctx: &AppContext) -> Result<()> {
    let selected = ctx.config.conversation_config()?.model;
    println!();
    print!("{}", render_models(&ctx.config.catalog(), &selected));
    println!("\n  * model used for new conversations");
    Ok(())
}
