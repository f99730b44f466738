//! `GET /openapi` (spec.md §4.8, §6): machine-readable serialization of the
//! tool registry — name, capability, side-effect class, and JSON Schema
//! input shape for every tool, so a client can discover the catalog
//! without hardcoding it.

use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::tools::registry;

#[derive(Debug, Serialize)]
struct ToolDescriptor {
    name: &'static str,
    capability: crate::tools::Capability,
    #[serde(rename = "sideEffect")]
    side_effect: crate::tools::SideEffect,
    #[serde(rename = "inputSchema")]
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Catalog {
    tools: Vec<ToolDescriptor>,
}

pub async fn openapi() -> impl IntoResponse {
    let tools = registry()
        .into_iter()
        .map(|t| ToolDescriptor {
            name: t.name,
            capability: t.capability,
            side_effect: t.side_effect,
            input_schema: (t.input_schema)(),
        })
        .collect();
    Json(Catalog { tools })
}
