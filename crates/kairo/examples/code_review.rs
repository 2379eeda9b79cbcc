//! Code-review workflow demo.
//!
//! Demonstrates:
//! - Creating a graph by workflow type through a `RunStore`
//! - A conditional edge that loops until the quality score clears a threshold
//! - Running in the foreground and in the background

use kairo::{Data, RunStore};
use serde_json::{json, Value};

const SAMPLE: &str = r#"
def calculate_total(price, quantity, tax_rate, discount, shipping, handling_fee):
    if quantity < 0 or price < 0:
        raise ValueError("price and quantity must be non-negative")
    subtotal = float(price) * int(quantity)
    tax = subtotal * float(tax_rate)
    total = subtotal + tax - float(discount) + float(shipping) + float(handling_fee)
    if total < 0:
        total = 0.0
    return round(total, 2)


def ok(x):
    return x
"#;

fn initial(threshold: u32) -> Data {
    match json!({"code": SAMPLE, "quality_threshold": threshold, "max_iterations": 3}) {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let store = RunStore::new();
    let graph_id = store
        .create_graph("code_review", &json!({"max_iterations": 20}))
        .await?;
    println!("Created graph {}", graph_id);

    let record = store.run(&graph_id, initial(70)).await?;
    println!("Run {} finished: {:?}", record.run_id, record.status);
    for entry in &record.log {
        println!(
            "  {:<8} {:<8} iteration={}",
            entry.node.as_str(),
            entry.status.to_string(),
            entry.iteration
        );
    }
    println!(
        "Quality score: {}",
        record.state.get("quality_score").unwrap_or(&Value::Null)
    );

    let background = store.run_async(&graph_id, initial(100)).await?;
    let run_id = background.run_id().to_string();
    background.finished().await;

    let (state, metadata) = store.state(&run_id).await?;
    println!("Background run {}:", run_id);
    println!("{}", serde_json::to_string_pretty(&json!({
        "suggestions": state.get("suggestions"),
        "metadata": metadata,
    }))?);

    println!("Graphs: {:?}", store.list_graphs().await);
    println!("Runs: {:?}", store.list_runs().await);

    Ok(())
}
