//! Shader Net Layout - WASM Module
//!
//! Force-directed layout engine for shader dependency networks. Nodes (shader
//! atoms and stages) are connected by springs and directed dependencies and
//! laid out in 2D by a damped physics simulation. It is compiled to
//! WebAssembly and exposes a JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `graph`: the network in petgraph's StableGraph, the layout engine, view
//!   transform and the dependency-pair document model
//! - `spatial`: fixed-depth quad-tree with lazily aggregated mass, plus the
//!   flat leaf lookup used to re-home moving nodes
//! - `layout`: configuration, force terms, repulsion techniques (brute force,
//!   Barnes-Hut, fuzzy) and the initial island packing
//! - `error`: the crate error type

use glam::Vec2;
use js_sys::Float32Array;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod graph;
pub mod layout;
pub mod spatial;

use error::LayoutError;
use graph::{DependencyPair, LayoutEngine, NodeId};
use layout::{LayoutConfig, Technique};
use spatial::Rect;

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn to_js(err: LayoutError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Main entry point for the layout engine.
///
/// This struct wraps the internal LayoutEngine and provides the public API
/// exposed to JavaScript.
#[wasm_bindgen]
pub struct ShaderGraphWasm {
    engine: LayoutEngine,
}

#[wasm_bindgen]
impl ShaderGraphWasm {
    /// Create an engine with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            engine: LayoutEngine::default(),
        }
    }

    /// Create an engine from a (partial) `LayoutConfig` object.
    ///
    /// Missing fields fall back to their defaults.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: JsValue) -> Result<ShaderGraphWasm, JsValue> {
        let config: LayoutConfig = serde_wasm_bindgen::from_value(config)?;
        Ok(Self {
            engine: LayoutEngine::try_new(config).map_err(to_js)?,
        })
    }

    // =========================================================================
    // Document
    // =========================================================================

    /// Replace the network with an array of `{ node, dependency? }` pairs.
    pub fn load(&mut self, pairs: JsValue) -> Result<(), JsValue> {
        let pairs: Vec<DependencyPair> = serde_wasm_bindgen::from_value(pairs)?;
        self.engine.load(&pairs);
        Ok(())
    }

    /// Replace the network with a text document, one `node dependency` pair per line.
    #[wasm_bindgen(js_name = loadText)]
    pub fn load_text(&mut self, text: &str) {
        self.engine.load(&graph::parse_pairs(text));
    }

    /// Export the network as an array of `{ node, dependency }` pairs.
    pub fn save(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.engine.save())?)
    }

    #[wasm_bindgen(js_name = saveText)]
    pub fn save_text(&self) -> String {
        graph::format_pairs(&self.engine.save())
    }

    /// Remove every node.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node at a world position.
    ///
    /// Returns the stable node ID.
    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(&mut self, name: &str, x: f32, y: f32) -> u32 {
        self.engine.add_node(name, x, y).0
    }

    #[wasm_bindgen(js_name = deleteNode)]
    pub fn delete_node(&mut self, node_id: u32) -> Result<(), JsValue> {
        self.engine.delete_node(NodeId(node_id)).map_err(to_js)
    }

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.engine.node_count() as u32
    }

    /// IDs of all nodes, in the order used by `positions`.
    #[wasm_bindgen(js_name = nodeIds)]
    pub fn node_ids(&self) -> Vec<u32> {
        self.engine.nodes().map(|n| n.id().0).collect()
    }

    /// Node positions as [x0, y0, x1, y1, ...], in `nodeIds` order.
    pub fn positions(&self) -> Float32Array {
        let positions: Vec<f32> = self
            .engine
            .nodes()
            .flat_map(|n| n.position().to_array())
            .collect();
        Float32Array::from(&positions[..])
    }

    #[wasm_bindgen(js_name = nodeName)]
    pub fn node_name(&self, node_id: u32) -> Option<String> {
        self.engine
            .node(NodeId(node_id))
            .ok()
            .map(|n| n.name().to_string())
    }

    /// Whether a node still has all of its dependencies.
    #[wasm_bindgen(js_name = isNodeUsable)]
    pub fn is_node_usable(&self, node_id: u32) -> Option<bool> {
        self.engine.node(NodeId(node_id)).ok().map(|n| n.is_usable())
    }

    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, node_id: u32, x: f32, y: f32) -> Result<(), JsValue> {
        self.engine
            .set_node_position(NodeId(node_id), x, y)
            .map_err(to_js)
    }

    /// Drag a node by a screen-space delta.
    #[wasm_bindgen(js_name = moveNode)]
    pub fn move_node(&mut self, node_id: u32, dx: f32, dy: f32) -> Result<(), JsValue> {
        self.engine.move_node(NodeId(node_id), dx, dy).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setHighlightedNode)]
    pub fn set_highlighted_node(&mut self, node_id: Option<u32>) -> Result<(), JsValue> {
        self.engine
            .set_highlighted_node(node_id.map(NodeId))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = highlightedNode)]
    pub fn highlighted_node(&self) -> Option<u32> {
        self.engine.highlighted_node().map(|id| id.0)
    }

    // =========================================================================
    // Link Operations
    // =========================================================================

    pub fn link(&mut self, a: u32, b: u32) -> Result<(), JsValue> {
        self.engine.link(NodeId(a), NodeId(b)).map_err(to_js)
    }

    pub fn unlink(&mut self, a: u32, b: u32) -> Result<(), JsValue> {
        self.engine.unlink(NodeId(a), NodeId(b)).map_err(to_js)
    }

    /// Make `source` target `target`.
    #[wasm_bindgen(js_name = linkTopological)]
    pub fn link_topological(&mut self, source: u32, target: u32) -> Result<(), JsValue> {
        self.engine
            .link_topological(NodeId(source), NodeId(target))
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = unlinkTopological)]
    pub fn unlink_topological(&mut self, source: u32, target: u32) -> Result<(), JsValue> {
        self.engine
            .unlink_topological(NodeId(source), NodeId(target))
            .map_err(to_js)
    }

    pub fn neighbors(&self, node_id: u32) -> Result<Vec<u32>, JsValue> {
        self.engine
            .neighbors(NodeId(node_id))
            .map(|ids| ids.into_iter().map(u32::from).collect())
            .map_err(to_js)
    }

    pub fn targets(&self, node_id: u32) -> Result<Vec<u32>, JsValue> {
        self.engine
            .targets(NodeId(node_id))
            .map(|ids| ids.into_iter().map(u32::from).collect())
            .map_err(to_js)
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Advance by one rendered frame of `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.engine.update(dt);
    }

    #[wasm_bindgen(js_name = activateLayout)]
    pub fn activate_layout(&mut self) {
        self.engine.activate_layout();
    }

    #[wasm_bindgen(js_name = isProcessingLayout)]
    pub fn is_processing_layout(&self) -> bool {
        self.engine.is_processing_layout()
    }

    /// Switch between "BruteForce", "Quad" and "Fuzzy".
    #[wasm_bindgen(js_name = setTechnique)]
    pub fn set_technique(&mut self, technique: JsValue) -> Result<(), JsValue> {
        let technique: Technique = serde_wasm_bindgen::from_value(technique)?;
        self.engine.set_technique(technique);
        Ok(())
    }

    pub fn technique(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.engine.technique())?)
    }

    #[wasm_bindgen(js_name = currentEnergy)]
    pub fn current_energy(&self) -> f32 {
        self.engine.current_energy()
    }

    #[wasm_bindgen(js_name = peakEnergy)]
    pub fn peak_energy(&self) -> f32 {
        self.engine.peak_energy()
    }

    #[wasm_bindgen(js_name = adaptiveTimeScale)]
    pub fn adaptive_time_scale(&self) -> f32 {
        self.engine.adaptive_time_scale()
    }

    // =========================================================================
    // View
    // =========================================================================

    #[wasm_bindgen(js_name = setViewport)]
    pub fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.engine.set_viewport(Rect::new(x, y, width, height));
    }

    /// Pan by a screen-space drag delta.
    #[wasm_bindgen(js_name = panView)]
    pub fn pan_view(&mut self, dx: f32, dy: f32) {
        self.engine.pan_view(dx, dy);
    }

    /// Change the zoom level by `delta` (clamped to [0, 8]).
    pub fn zoom(&mut self, delta: f32) {
        self.engine.zoom(delta);
    }

    #[wasm_bindgen(js_name = zoomLevel)]
    pub fn zoom_level(&self) -> f32 {
        self.engine.viewport().zoom()
    }

    /// Returns [x, y] in screen pixels.
    #[wasm_bindgen(js_name = worldToScreen)]
    pub fn world_to_screen(&self, x: f32, y: f32) -> Vec<f32> {
        self.engine.world_to_screen(Vec2::new(x, y)).to_array().to_vec()
    }

    /// Returns [x, y] in world units.
    #[wasm_bindgen(js_name = screenToWorld)]
    pub fn screen_to_world(&self, x: f32, y: f32) -> Vec<f32> {
        self.engine.screen_to_world(Vec2::new(x, y)).to_array().to_vec()
    }

    /// IDs of the nodes docked in leaves overlapping the viewport.
    #[wasm_bindgen(js_name = findVisibleNodes)]
    pub fn find_visible_nodes(&mut self) -> Vec<u32> {
        self.engine
            .find_visible_nodes()
            .iter()
            .map(|id| id.0)
            .collect()
    }

    /// The node under a screen position, if any.
    #[wasm_bindgen(js_name = intersectNodes)]
    pub fn intersect_nodes(&self, x: f32, y: f32) -> Option<u32> {
        self.engine.intersect_nodes(x, y).map(|id| id.0)
    }
}

impl Default for ShaderGraphWasm {
    fn default() -> Self {
        Self::new()
    }
}
