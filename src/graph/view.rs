//! Live graph view: simulation plus pan/zoom/drag/hover state.
//!
//! All coordinates passed to pointer handlers are in logical canvas space
//! (the fixed `width` x `height` surface). The pan/zoom transform maps graph
//! space onto that surface and never touches the physics.

use super::model::{Category, GraphEdge, NodeId, RelationshipGraph};
use super::render;
use super::simulation::{ForceSettings, Simulation, SubscriptionId, TickListener};
use crate::models::AnalysisResult;
use serde::Serialize;
use tracing::{debug, info};

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 4.0;
/// Alpha target held while a node is being dragged.
pub const DRAG_ALPHA_TARGET: f64 = 0.3;

/// Canvas and layout settings for a view.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub width: f64,
    pub height: f64,
    pub link_distance: f64,
    pub charge: f64,
    pub collision_padding: f64,
    /// Upper bound on ticks when settling without a display loop.
    pub max_ticks: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            link_distance: 100.0,
            charge: -300.0,
            collision_padding: 10.0,
            max_ticks: 1000,
        }
    }
}

impl GraphSettings {
    fn forces(&self) -> ForceSettings {
        ForceSettings {
            link_distance: self.link_distance,
            charge: self.charge,
            collision_padding: self.collision_padding,
            center: (self.width / 2.0, self.height / 2.0),
            ..ForceSettings::default()
        }
    }
}

/// Translate-then-scale transform from graph space to canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            k: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
        ((sx - self.x) / self.k, (sy - self.y) / self.k)
    }

    pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
        (gx * self.k + self.x, gy * self.k + self.y)
    }
}

/// Pointer input, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    PointerLeave,
    Wheel { x: f64, y: f64, delta_y: f64 },
}

#[derive(Debug, Clone)]
struct DragState {
    node: usize,
    start_x: f64,
    start_y: f64,
    node_start_x: f64,
    node_start_y: f64,
}

#[derive(Debug, Clone)]
struct PanState {
    start_x: f64,
    start_y: f64,
    transform_start_x: f64,
    transform_start_y: f64,
}

/// Serializable picture of a view at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub instance: u64,
    pub width: f64,
    pub height: f64,
    pub transform: ViewTransform,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub label: String,
    pub category: Category,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    pub pinned: bool,
}

/// A mounted graph with its own simulation and interaction state.
pub struct GraphView {
    instance: u64,
    graph: RelationshipGraph,
    simulation: Simulation,
    edges: Vec<(usize, usize)>,
    transform: ViewTransform,
    drag: Option<DragState>,
    pan: Option<PanState>,
    hover: Option<usize>,
    width: f64,
    height: f64,
    max_ticks: usize,
    mounted: bool,
}

impl GraphView {
    /// Mount a view for `graph`; its simulation starts hot.
    pub fn mount(instance: u64, graph: RelationshipGraph, settings: &GraphSettings) -> Self {
        let radii: Vec<f64> = graph.nodes().iter().map(|n| n.radius).collect();
        let edges = graph.edge_indices();
        let simulation = Simulation::new(&radii, &edges, settings.forces());

        info!(
            "Mounted graph view #{} with {} nodes and {} edges",
            instance,
            graph.nodes().len(),
            graph.edges().len()
        );

        Self {
            instance,
            graph,
            simulation,
            edges,
            transform: ViewTransform::default(),
            drag: None,
            pan: None,
            hover: None,
            width: settings.width,
            height: settings.height,
            max_ticks: settings.max_ticks,
            mounted: true,
        }
    }

    /// Stop the simulation, drop tick subscribers and reset interaction.
    pub fn dispose(&mut self) {
        if !self.mounted {
            return;
        }
        self.simulation.stop();
        self.simulation.clear_subscribers();
        self.drag = None;
        self.pan = None;
        self.hover = None;
        self.mounted = false;
        debug!("Disposed graph view #{}", self.instance);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hover
    }

    pub fn dragged(&self) -> Option<usize> {
        self.drag.as_ref().map(|d| d.node)
    }

    /// One scheduler step. Returns whether the simulation advanced.
    pub fn tick(&mut self) -> bool {
        self.mounted && self.simulation.tick()
    }

    /// Tick until the layout is at rest or the tick budget runs out.
    pub fn settle(&mut self) -> usize {
        if !self.mounted {
            return 0;
        }
        let ticks = self.simulation.run_until_idle(self.max_ticks);
        debug!("Graph view #{} settled after {} ticks", self.instance, ticks);
        ticks
    }

    pub fn subscribe(&mut self, listener: TickListener) -> SubscriptionId {
        self.simulation.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.simulation.unsubscribe(id)
    }

    /// Node position in graph space.
    pub fn position(&self, id: &NodeId) -> Option<(f64, f64)> {
        let index = self.graph.position(id)?;
        self.simulation.body(index).map(|b| (b.x, b.y))
    }

    pub fn is_pinned(&self, id: &NodeId) -> bool {
        self.graph
            .position(id)
            .and_then(|i| self.simulation.body(i))
            .map(|b| b.is_pinned())
            .unwrap_or(false)
    }

    /// Topmost node under a canvas point.
    pub fn node_at(&self, sx: f64, sy: f64) -> Option<usize> {
        let (gx, gy) = self.transform.screen_to_graph(sx, sy);
        self.simulation
            .bodies()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, b)| {
                let (dx, dy) = (b.x - gx, b.y - gy);
                (dx * dx + dy * dy).sqrt() <= b.radius
            })
            .map(|(i, _)| i)
    }

    /// Indices of nodes sharing an edge with `index`.
    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter_map(|&(s, t)| {
                if s == index {
                    Some(t)
                } else if t == index {
                    Some(s)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn handle(&mut self, event: ViewEvent) {
        if !self.mounted {
            return;
        }
        match event {
            ViewEvent::PointerDown { x, y } => match self.node_at(x, y) {
                Some(node) => self.begin_drag(node, x, y),
                None => {
                    self.pan = Some(PanState {
                        start_x: x,
                        start_y: y,
                        transform_start_x: self.transform.x,
                        transform_start_y: self.transform.y,
                    })
                }
            },
            ViewEvent::PointerMove { x, y } => {
                if self.drag.is_some() {
                    self.drag_to(x, y);
                } else if let Some(pan) = &self.pan {
                    self.transform.x = pan.transform_start_x + (x - pan.start_x);
                    self.transform.y = pan.transform_start_y + (y - pan.start_y);
                } else {
                    self.hover = self.node_at(x, y);
                }
            }
            ViewEvent::PointerUp => {
                self.end_drag();
                self.pan = None;
            }
            ViewEvent::PointerLeave => {
                self.end_drag();
                self.pan = None;
                self.hover = None;
            }
            // A zero delta carries no direction.
            ViewEvent::Wheel { delta_y, .. } if delta_y == 0.0 => {}
            ViewEvent::Wheel { x, y, delta_y } => {
                let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
                self.zoom_at(x, y, factor);
            }
        }
    }

    /// Grab a node: pin it where it is and reheat the layout.
    pub fn begin_drag(&mut self, node: usize, sx: f64, sy: f64) {
        let Some(body) = self.simulation.body(node) else {
            return;
        };
        let (nx, ny) = (body.x, body.y);

        if self.drag.is_none() {
            self.simulation.reheat(DRAG_ALPHA_TARGET);
        }
        self.simulation.pin(node, nx, ny);
        self.drag = Some(DragState {
            node,
            start_x: sx,
            start_y: sy,
            node_start_x: nx,
            node_start_y: ny,
        });
        self.hover = Some(node);
    }

    /// Move the grabbed node with the pointer.
    pub fn drag_to(&mut self, sx: f64, sy: f64) {
        if let Some(drag) = &self.drag {
            let k = self.transform.k;
            let x = drag.node_start_x + (sx - drag.start_x) / k;
            let y = drag.node_start_y + (sy - drag.start_y) / k;
            self.simulation.pin(drag.node, x, y);
        }
    }

    /// Release the grabbed node back to physics and let the layout cool.
    pub fn end_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            self.simulation.reheat(0.0);
            self.simulation.unpin(drag.node);
        }
    }

    /// Zoom by `factor` keeping the canvas point (sx, sy) fixed.
    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
        let k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = k / self.transform.k;
        self.transform.x = sx - (sx - self.transform.x) * ratio;
        self.transform.y = sy - (sy - self.transform.y) * ratio;
        self.transform.k = k;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.transform.x += dx;
        self.transform.y += dy;
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .graph
            .nodes()
            .iter()
            .zip(self.simulation.bodies())
            .map(|(node, body)| NodeSnapshot {
                id: node.id.clone(),
                label: node.label().to_string(),
                category: node.category(),
                radius: node.radius,
                x: body.x,
                y: body.y,
                pinned: body.is_pinned(),
            })
            .collect();

        GraphSnapshot {
            instance: self.instance,
            width: self.width,
            height: self.height,
            transform: self.transform,
            nodes,
            edges: self.graph.edges().to_vec(),
        }
    }

    pub fn render_svg(&self) -> String {
        render::render_svg(self)
    }
}

/// Owns the current view; each new batch replaces it.
pub struct GraphSession {
    settings: GraphSettings,
    generation: u64,
    current: Option<GraphView>,
}

impl GraphSession {
    pub fn new(settings: GraphSettings) -> Self {
        Self {
            settings,
            generation: 0,
            current: None,
        }
    }

    /// Dispose the previous view and mount a fresh one for `results`.
    pub fn show(&mut self, results: &[AnalysisResult]) -> &mut GraphView {
        if let Some(previous) = self.current.as_mut() {
            previous.dispose();
        }
        self.generation += 1;
        let graph = RelationshipGraph::build(results);
        self.current
            .insert(GraphView::mount(self.generation, graph, &self.settings))
    }

    pub fn current(&self) -> Option<&GraphView> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut GraphView> {
        self.current.as_mut()
    }

    /// Dispose and forget the current view.
    pub fn clear(&mut self) {
        if let Some(mut view) = self.current.take() {
            view.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::simulation::Body;
    use crate::models::Connections;
    use std::cell::Cell;
    use std::rc::Rc;

    fn result(style: &str, period: &str, artists: &[&str], movements: &[&str]) -> AnalysisResult {
        AnalysisResult {
            style: style.to_string(),
            period: period.to_string(),
            insights: Vec::new(),
            connections: Connections {
                artists: artists.iter().map(|s| s.to_string()).collect(),
                movements: movements.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn sample() -> Vec<AnalysisResult> {
        vec![
            result("Impressionism", "19th century", &["Monet", "Renoir"], &["Impressionism"]),
            result("Realism", "19th century", &["Courbet", "Monet"], &["Realism"]),
        ]
    }

    fn settled_view() -> GraphView {
        let settings = GraphSettings::default();
        let mut view = GraphView::mount(1, RelationshipGraph::build(&sample()), &settings);
        view.settle();
        view
    }

    fn id(view: &GraphView, raw: &str) -> NodeId {
        view.graph().find(raw).unwrap().id.clone()
    }

    #[test]
    fn test_settle_reaches_idle() {
        let view = settled_view();
        assert!(!view.simulation().is_running());
        for node in view.graph().nodes() {
            let (x, y) = view.position(&node.id).unwrap();
            assert!(x.is_finite() && y.is_finite());
        }
    }

    #[test]
    fn test_drag_and_release() {
        let mut view = settled_view();
        let monet = id(&view, "artist-Monet");
        let index = view.graph().position(&monet).unwrap();
        let before = view.position(&monet).unwrap();

        let neighbor = view.neighbors(index)[0];
        let neighbor_before = view.simulation().body(neighbor).unwrap().clone();

        let (sx, sy) = view.transform().graph_to_screen(before.0, before.1);
        view.handle(ViewEvent::PointerDown { x: sx, y: sy });
        assert_eq!(view.dragged(), Some(index));
        assert!(view.is_pinned(&monet));
        assert!(view.simulation().is_running());
        assert_eq!(view.simulation().alpha_target(), DRAG_ALPHA_TARGET);

        let target = (sx + 150.0, sy + 80.0);
        view.handle(ViewEvent::PointerMove { x: target.0, y: target.1 });
        for _ in 0..60 {
            assert!(view.tick());
        }
        // Pinned to the pointer while held.
        let held = view.position(&monet).unwrap();
        assert!((held.0 - (before.0 + 150.0)).abs() < 1e-9);
        assert!((held.1 - (before.1 + 80.0)).abs() < 1e-9);

        // Neighbours reacted.
        let neighbor_now = view.simulation().body(neighbor).unwrap();
        assert!(
            (neighbor_now.x - neighbor_before.x).abs() + (neighbor_now.y - neighbor_before.y).abs()
                > 0.5
        );

        view.handle(ViewEvent::PointerUp);
        assert!(view.dragged().is_none());
        assert!(!view.is_pinned(&monet));
        assert_eq!(view.simulation().alpha_target(), 0.0);

        view.settle();
        assert!(!view.simulation().is_running());
        let after = view.position(&monet).unwrap();
        assert!((after.0 - before.0).abs() + (after.1 - before.1).abs() > 1e-3);
        assert!(!view.is_pinned(&monet));
    }

    #[test]
    fn test_pan_does_not_touch_physics() {
        let mut view = settled_view();
        let bodies_before = view.simulation().bodies().to_vec();

        // Empty corner of the canvas.
        assert!(view.node_at(1.0, 1.0).is_none());
        view.handle(ViewEvent::PointerDown { x: 1.0, y: 1.0 });
        view.handle(ViewEvent::PointerMove { x: 41.0, y: 31.0 });
        view.handle(ViewEvent::PointerUp);

        assert_eq!(view.transform().x, 40.0);
        assert_eq!(view.transform().y, 30.0);
        assert_eq!(view.simulation().bodies(), bodies_before.as_slice());
        assert!(!view.simulation().is_running());
    }

    #[test]
    fn test_zoom_is_bounded_and_anchored() {
        let mut view = settled_view();
        for _ in 0..50 {
            view.handle(ViewEvent::Wheel { x: 400.0, y: 300.0, delta_y: -1.0 });
        }
        assert_eq!(view.transform().k, MAX_ZOOM);

        for _ in 0..100 {
            view.handle(ViewEvent::Wheel { x: 400.0, y: 300.0, delta_y: 1.0 });
        }
        assert_eq!(view.transform().k, MIN_ZOOM);

        // The anchor point maps to the same graph point before and after.
        let mut view = settled_view();
        let anchor = view.transform().screen_to_graph(200.0, 150.0);
        view.zoom_at(200.0, 150.0, 2.0);
        let after = view.transform().screen_to_graph(200.0, 150.0);
        assert!((anchor.0 - after.0).abs() < 1e-9);
        assert!((anchor.1 - after.1).abs() < 1e-9);
    }

    #[test]
    fn test_zero_wheel_delta_keeps_zoom() {
        let mut view = settled_view();
        let before = view.transform();
        view.handle(ViewEvent::Wheel { x: 200.0, y: 150.0, delta_y: 0.0 });
        assert_eq!(view.transform(), before);
    }

    #[test]
    fn test_drag_respects_zoom() {
        let mut view = settled_view();
        view.zoom_at(0.0, 0.0, 2.0);
        let monet = id(&view, "artist-Monet");
        let before = view.position(&monet).unwrap();
        let (sx, sy) = view.transform().graph_to_screen(before.0, before.1);

        view.handle(ViewEvent::PointerDown { x: sx, y: sy });
        view.handle(ViewEvent::PointerMove { x: sx + 100.0, y: sy });
        view.tick();

        let held = view.position(&monet).unwrap();
        assert!((held.0 - (before.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_hover_only_marks_node() {
        let mut view = settled_view();
        let monet = id(&view, "artist-Monet");
        let index = view.graph().position(&monet).unwrap();
        let (x, y) = view.position(&monet).unwrap();
        let bodies_before = view.simulation().bodies().to_vec();

        view.handle(ViewEvent::PointerMove { x, y });
        assert_eq!(view.hovered(), Some(index));
        assert_eq!(view.simulation().bodies(), bodies_before.as_slice());
        assert!(!view.simulation().is_running());

        view.handle(ViewEvent::PointerLeave);
        assert!(view.hovered().is_none());
    }

    #[test]
    fn test_dispose_stops_everything() {
        let mut view = GraphView::mount(
            1,
            RelationshipGraph::build(&sample()),
            &GraphSettings::default(),
        );
        let count = Rc::new(Cell::new(0usize));
        let seen = Rc::clone(&count);
        view.subscribe(Box::new(move |_: &[Body]| {
            seen.set(seen.get() + 1)
        }));
        assert!(view.tick());
        assert_eq!(count.get(), 1);

        view.dispose();
        assert!(!view.is_mounted());
        assert!(!view.tick());
        assert_eq!(view.settle(), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_session_replaces_view() {
        let mut session = GraphSession::new(GraphSettings::default());
        let first = session.show(&sample());
        first.settle();
        assert_eq!(first.instance(), 1);

        let second = session.show(&sample());
        assert_eq!(second.instance(), 2);
        assert!(second.is_mounted());
        // Fresh simulation, not the settled positions of the old one.
        assert!(second.simulation().is_running());
        assert_eq!(second.simulation().ticks(), 0);

        session.clear();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_rebuild_after_dispose_is_isomorphic() {
        let mut session = GraphSession::new(GraphSettings::default());
        let first = session.show(&sample()).snapshot();
        let second = session.show(&sample()).snapshot();

        let ids = |s: &GraphSnapshot| {
            let mut ids: Vec<_> = s.nodes.iter().map(|n| n.id.to_string()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.edges.len(), second.edges.len());
        assert_ne!(first.instance, second.instance);
    }

    #[test]
    fn test_snapshot_serializes() {
        let view = settled_view();
        let json = serde_json::to_value(view.snapshot()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), view.graph().nodes().len());
        assert_eq!(json["nodes"][0]["category"], "style");
        assert!(json["edges"][0]["source"].is_string());
    }
}
