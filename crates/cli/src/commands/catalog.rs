use std::str::FromStr;

use skreddata_catalog::{Catalog, CatalogItem, CatalogQuery, Label};
use skreddata_core::{format_timestamp, parse_timestamp};

use super::{open_catalog, print_json};
use crate::{CatalogCommands, FilterArgs, OutputFormat, Session};

pub(crate) async fn cmd_catalog(command: CatalogCommands, session: &Session) -> Result<(), String> {
    let catalog = open_catalog(&session.config).await?;
    match command {
        CatalogCommands::List { filter } => {
            let query = build_query(&filter)?;
            let items = catalog.find(&query).await.map_err(|e| e.to_string())?;
            if session.quiet {
                return Ok(());
            }
            match session.output {
                OutputFormat::Json => print_json(&items),
                OutputFormat::Text => {
                    for item in &items {
                        println!("{}", summary_line(item));
                    }
                }
            }
        }
        CatalogCommands::Count { filter } => {
            let query = build_query(&filter)?;
            let count = catalog.count(&query).await.map_err(|e| e.to_string())?;
            if !session.quiet {
                match session.output {
                    OutputFormat::Json => print_json(&serde_json::json!({ "count": count })),
                    OutputFormat::Text => println!("{count}"),
                }
            }
        }
        CatalogCommands::Show { id } => {
            let item = catalog
                .find_one(&id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no catalog item '{id}'"))?;
            if !session.quiet {
                match session.output {
                    OutputFormat::Json => print_json(&item),
                    OutputFormat::Text => print_item(&item),
                }
            }
        }
        CatalogCommands::Remove { id } => {
            let removed = catalog.remove(&id).await.map_err(|e| e.to_string())?;
            if !removed {
                return Err(format!("no catalog item '{id}'"));
            }
            if !session.quiet {
                match session.output {
                    OutputFormat::Json => print_json(&serde_json::json!({ "removed": id })),
                    OutputFormat::Text => println!("removed {id}"),
                }
            }
        }
    }
    Ok(())
}

fn build_query(filter: &FilterArgs) -> Result<CatalogQuery, String> {
    let mut queries = Vec::new();
    if let Some(label) = &filter.label {
        let label = Label::from_str(label).map_err(|e| e.to_string())?;
        queries.push(CatalogQuery::Label(label));
    }
    if filter.labeled {
        queries.push(CatalogQuery::Labeled);
    }
    if filter.unlabeled {
        queries.push(CatalogQuery::Unlabeled);
    }
    if let Some(at) = &filter.at {
        queries.push(CatalogQuery::At(
            parse_timestamp(at).map_err(|e| e.to_string())?,
        ));
    }
    if let Some(text) = &filter.id_contains {
        queries.push(CatalogQuery::IdentifierContains(text.clone()));
    }
    if let Some(text) = &filter.comment_contains {
        queries.push(CatalogQuery::CommentContains(text.clone()));
    }
    Ok(CatalogQuery::all_of(queries))
}

fn summary_line(item: &CatalogItem) -> String {
    let label = item
        .label
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{}  {}  {}  {}",
        item.id,
        format_timestamp(item.t_0),
        format_timestamp(item.t_1),
        label
    );
    if let Some(comment) = &item.comment {
        line.push_str("  ");
        line.push_str(comment);
    }
    line
}

fn print_item(item: &CatalogItem) {
    println!("id:       {}", item.id);
    println!("t_0:      {}", format_timestamp(item.t_0));
    println!("t_1:      {}", format_timestamp(item.t_1));
    match item.label {
        Some(label) => println!("label:    {} ({})", label.code(), label.description()),
        None => println!("label:    -"),
    }
    if let Some(comment) = &item.comment {
        println!("comment:  {comment}");
    }
    println!("geometry: {}", item.geometry);
}
