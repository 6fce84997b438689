//! Model status from a running agent

use crate::client::ApiClient;
use crate::output::{
    color_activity, format_timestamp, print_header, print_json, print_table, OutputFormat,
};
use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Weight")]
    weight: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct BufferRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Buffered")]
    len: usize,
}

/// Fetch and print the agent's model status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.model_status().await?;

    if format == OutputFormat::Json {
        return print_json(&status);
    }

    print_header("Detector Status");
    println!("State:            {}", status.state.to_string().cyan());
    println!(
        "Last run:         {}",
        status
            .last_run
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string())
    );
    println!("Anomalies total:  {}", status.total_anomalies_detected);

    let models: Vec<ModelRow> = status
        .models
        .iter()
        .map(|(name, model)| ModelRow {
            name: name.clone(),
            kind: model.kind.clone(),
            weight: format!("{:.2}", model.weight),
            status: color_activity(model.status),
        })
        .collect();
    if !models.is_empty() {
        print_header("Models");
        print_table(&models);
    }

    let buffers: Vec<BufferRow> = status
        .buffer_sizes
        .iter()
        .map(|(metric, len)| BufferRow {
            metric: metric.clone(),
            len: *len,
        })
        .collect();
    if !buffers.is_empty() {
        print_header("Buffers");
        print_table(&buffers);
    }

    Ok(())
}
