//! `docqa search`: retrieval without generation.
//!
//! Prints the nearest chunks for a query with their squared L2 distances,
//! either as a numbered listing or as JSON.

use anyhow::Result;

use crate::models::Retrieval;
use crate::session::Session;

pub fn run_search(session: &Session, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let k = k.unwrap_or(session.config().retrieval.top_k);
    let retrieval = session.retrieve_k(query, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval.hits)?);
    } else {
        print!("{}", render_hits(&retrieval));
    }
    Ok(())
}

/// Human-readable listing, nearest first.
pub fn render_hits(retrieval: &Retrieval) -> String {
    if retrieval.hits.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (i, hit) in retrieval.hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.4}] chunk {}\n",
            i + 1,
            hit.distance,
            hit.position
        ));
        out.push_str(&format!(
            "    excerpt: \"{}\"\n\n",
            hit.text.replace('\n', " ").trim()
        ));
    }
    out
}
