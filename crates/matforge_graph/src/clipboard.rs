// SPDX-License-Identifier: MIT OR Apache-2.0
//! Copy/paste with identity remapping.
//!
//! Copy serializes a node selection (plus the overrides keyed by those
//! nodes) into one portable JSON payload. Paste re-creates the nodes under
//! fresh identities, rewriting connection references and override keys
//! through a remap table, then aligns the pasted block to the target
//! position.

use crate::document::Document;
use crate::format::{
    instantiate_graph, instantiate_node, override_key, parse_override_key, FormatError,
    GraphRecord, NodeRecord, OverrideRecord,
};
use crate::node::NodeId;
use crate::param::ParameterOverride;
use crate::port::{Port, PortId};
use crate::subgraph::{GraphId, ParentRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Portable clipboard payload: serialized nodes plus overrides keyed by the
/// *original* node ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipboardPayload {
    /// Serialized node records
    pub nodes: Vec<String>,
    /// Serialized override rows keyed `"<original node uuid>.<property>"`
    pub parameters: IndexMap<String, String>,
}

impl ClipboardPayload {
    /// Whether there is anything to paste
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize the payload as one JSON document
    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse clipboard text.
    ///
    /// Anything that is not a payload means "nothing to paste", not an
    /// error.
    pub fn from_json(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::debug!("clipboard content is not a paste payload: {err}");
                None
            }
        }
    }
}

/// Serialize a node selection to a clipboard payload.
///
/// Comment containers pull in every node visually contained within them,
/// deduplicated against nodes already selected.
pub fn copy(
    doc: &Document,
    graph_id: GraphId,
    selection: &[NodeId],
) -> Result<ClipboardPayload, FormatError> {
    let graph = doc
        .graph(graph_id)
        .ok_or(FormatError::GraphNotFound(graph_id))?;

    let mut copied: Vec<NodeId> = Vec::new();
    for node_id in selection {
        if !copied.contains(node_id) && graph.node(*node_id).is_some() {
            copied.push(*node_id);
        }
    }
    for node_id in selection {
        let Some(node) = graph.node(*node_id) else {
            continue;
        };
        if !node.is_comment() {
            continue;
        }
        for other in graph.nodes() {
            if other.id != node.id
                && node.contains_point(other.position)
                && !copied.contains(&other.id)
            {
                copied.push(other.id);
            }
        }
    }

    let mut payload = ClipboardPayload::default();
    for node_id in &copied {
        payload
            .nodes
            .push(NodeRecord::capture(doc, graph_id, *node_id)?.to_json()?);
    }
    for node_id in &copied {
        for ((_, property), row) in graph.overrides_for_node(*node_id) {
            let record = match row {
                ParameterOverride::Constant { value, kind } => OverrideRecord::Constant {
                    value: value.clone(),
                    kind: *kind,
                },
                ParameterOverride::Function(function_id) => OverrideRecord::Function {
                    graph: Box::new(GraphRecord::capture(doc, *function_id)?),
                },
            };
            payload.parameters.insert(
                override_key(*node_id, property),
                serde_json::to_string(&record)?,
            );
        }
    }
    Ok(payload)
}

/// Paste a payload into a graph at the given canvas position.
///
/// Returns the ids of the pasted nodes, empty when the payload does not
/// parse. Inter-node edges whose far endpoint was not copied are dropped.
pub fn paste(
    doc: &mut Document,
    graph_id: GraphId,
    payload: &ClipboardPayload,
    target: [f32; 2],
) -> Result<Vec<NodeId>, FormatError> {
    // Parse everything up front so a malformed payload mutates nothing.
    let mut records = Vec::with_capacity(payload.nodes.len());
    for json in &payload.nodes {
        match NodeRecord::from_json(json) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::debug!("skipping paste, node record does not parse: {err}");
                return Ok(Vec::new());
            }
        }
    }
    let mut overrides = Vec::new();
    for (key, json) in &payload.parameters {
        let Ok((node_id, property)) = parse_override_key(key) else {
            tracing::debug!("skipping paste, malformed override key: {key}");
            return Ok(Vec::new());
        };
        match serde_json::from_str::<OverrideRecord>(json) {
            Ok(record) => overrides.push((node_id, property, record)),
            Err(err) => {
                tracing::debug!("skipping paste, override record does not parse: {err}");
                return Ok(Vec::new());
            }
        }
    }

    // First pass: create nodes under fresh identities and build the remap
    // table.
    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
    let mut pasted = Vec::with_capacity(records.len());
    for record in &records {
        remap.insert(record.id, NodeId::new());
    }
    for record in &records {
        let mut fresh = record.clone();
        fresh.id = remap[&record.id];
        fresh.inputs = refresh_ports(&record.inputs);
        fresh.outputs = refresh_ports(&record.outputs);
        if let Some(program) = &mut fresh.program {
            refresh_graph_ids(program);
        }
        instantiate_node(doc, graph_id, &fresh)?;
        pasted.push(fresh.id);
    }

    // Re-key overrides to the new identities.
    for (original, property, record) in overrides {
        let Some(new_id) = remap.get(&original).copied() else {
            continue;
        };
        let row = match record {
            OverrideRecord::Constant { value, kind } => ParameterOverride::Constant { value, kind },
            OverrideRecord::Function { mut graph } => {
                refresh_graph_ids(&mut graph);
                let parent = ParentRef::Node {
                    graph: graph_id,
                    node: new_id,
                    property: Some(property.clone()),
                };
                let function_id = instantiate_graph(doc, &graph, parent)?;
                ParameterOverride::Function(function_id)
            }
        };
        if let Some(graph) = doc.graph_mut(graph_id) {
            graph.set_override((new_id, property), row);
        }
    }

    // Second pass: edges, valid now that both endpoints exist.
    for (record, new_id) in records.iter().zip(&pasted) {
        for c in &record.connections {
            let Some(new_target) = remap.get(&c.to_node).copied() else {
                continue;
            };
            let graph = doc
                .graph_mut(graph_id)
                .ok_or(FormatError::GraphNotFound(graph_id))?;
            let from_port = graph
                .node(*new_id)
                .and_then(|n| n.output(c.from_output))
                .map(|p| p.id)
                .ok_or(FormatError::NodeNotFound(*new_id))?;
            let to_port = graph
                .node(new_target)
                .and_then(|n| n.input(c.to_input))
                .map(|p| p.id)
                .ok_or(FormatError::NodeNotFound(new_target))?;
            graph.connect(*new_id, from_port, new_target, to_port)?;
        }
    }

    // Align the pasted block's bounding-box min corner to the target,
    // preserving relative layout.
    if let Some(graph) = doc.graph_mut(graph_id) {
        let mut min = [f32::MAX, f32::MAX];
        for record in &records {
            min[0] = min[0].min(record.position[0]);
            min[1] = min[1].min(record.position[1]);
        }
        let delta = [target[0] - min[0], target[1] - min[1]];
        for new_id in &pasted {
            if let Some(node) = graph.node_mut(*new_id) {
                node.position[0] += delta[0];
                node.position[1] += delta[1];
            }
        }
    }
    if !pasted.is_empty() {
        doc.mark_modified();
    }
    Ok(pasted)
}

fn refresh_ports(ports: &[Port]) -> Vec<Port> {
    ports
        .iter()
        .map(|p| Port {
            id: PortId::new(),
            ..p.clone()
        })
        .collect()
}

fn refresh_graph_ids(record: &mut GraphRecord) {
    record.id = GraphId::new();
    for node in &mut record.nodes {
        if let Some(program) = &mut node.program {
            refresh_graph_ids(program);
        }
    }
    for row in record.overrides.values_mut() {
        if let OverrideRecord::Function { graph } = row {
            refresh_graph_ids(graph);
        }
    }
    for function in &mut record.custom_functions {
        refresh_graph_ids(function);
    }
}
