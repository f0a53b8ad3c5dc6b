//! Article command handlers: list, search, show, publish, delete.

use std::io::Write;

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table};
use quill_core::api::ApiClient;
use quill_core::api::types::Article;

/// Table preview width, in characters.
const PREVIEW_LEN: usize = 72;

pub async fn list(client: &ApiClient) -> Result<()> {
    let articles = client.list_articles().await.context("load articles")?;
    print_articles(&articles);
    Ok(())
}

pub async fn search(client: &ApiClient, query: &str) -> Result<()> {
    let articles = client
        .search_articles(query)
        .await
        .context("search articles")?;

    if articles.is_empty() {
        println!("No articles match \"{query}\"");
        return Ok(());
    }
    print_articles(&articles);
    Ok(())
}

pub async fn show(client: &ApiClient, id: i64) -> Result<()> {
    let article = client.get_article(id).await.context("load article")?;

    println!("{}", article.title);
    println!();
    println!("{}", article.content);
    Ok(())
}

pub async fn publish(client: &ApiClient, title: &str, content: &str) -> Result<()> {
    let article = client
        .create_article(title, content)
        .await
        .context("publish article")?;

    println!("Published article {} ({})", article.id, article.title);
    Ok(())
}

pub async fn delete(client: &ApiClient, id: i64, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete article {id}? This cannot be undone."))? {
        println!("Aborted");
        return Ok(());
    }

    client.delete_article(id).await.context("delete article")?;
    println!("Deleted article {id}");
    Ok(())
}

fn print_articles(articles: &[Article]) {
    if articles.is_empty() {
        println!("No articles yet");
        return;
    }

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Title", "Preview"]);
    for article in articles {
        table.add_row(vec![
            article.id.to_string(),
            article.title.clone(),
            preview(&article.content),
        ]);
    }
    println!("{table}");
}

/// First line of the content, truncated on a char boundary.
fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(PREVIEW_LEN).collect();
    if first_line.chars().count() > PREVIEW_LEN {
        preview.push('…');
    }
    preview
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("read input")?;

    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
