//! Force-directed layout simulation.
//!
//! Link springs and many-body repulsion are integrated by `force_graph`.
//! Centering and collision avoidance run on top of each step, and an
//! energy level (`alpha`) decays towards `alpha_target`; once it drops
//! below `alpha_min` the simulation goes idle until reheated.

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use std::f64::consts::PI;

/// Tunables for the layout forces.
#[derive(Debug, Clone)]
pub struct ForceSettings {
    /// Separation a linked pair settles at.
    pub link_distance: f64,
    /// Many-body strength; negative repels.
    pub charge: f64,
    /// Extra clearance added to each node radius for collisions.
    pub collision_padding: f64,
    /// Centre the graph is kept on.
    pub center: (f64, f64),
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub node_mass: f32,
    /// Cap on any single pairwise force.
    pub max_force: f32,
    pub node_speed: f32,
    /// Fraction of velocity kept per step.
    pub damping: f32,
    /// Integration step handed to the force graph each tick.
    pub time_step: f32,
}

impl Default for ForceSettings {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 100.0,
            charge: -300.0,
            collision_padding: 10.0,
            center: (400.0, 300.0),
            alpha_min,
            // Reaches alpha_min from 1.0 in about 300 ticks.
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            node_mass: 10.0,
            max_force: 100.0,
            node_speed: 3000.0,
            damping: 0.9,
            time_step: 0.016,
        }
    }
}

impl ForceSettings {
    /// Force graph parameters. Its springs have no rest length, so the
    /// spring constant is the one that balances a linked pair's repulsion
    /// at `link_distance`.
    fn parameters(&self) -> SimulationParameters {
        let charge = -self.charge as f32;
        let mass = self.node_mass;
        let spring = if self.link_distance > 0.0 {
            2.0 * charge * mass * mass / (self.link_distance as f32).powi(3)
        } else {
            0.0
        };

        SimulationParameters {
            force_charge: charge,
            force_spring: spring.max(0.0),
            force_max: self.max_force,
            node_speed: self.node_speed,
            damping_factor: self.damping,
        }
    }
}

/// Physical state of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    /// Displacement over the last tick.
    pub vx: f64,
    pub vy: f64,
    /// Pinned x; overrides physics while set.
    pub fx: Option<f64>,
    /// Pinned y; overrides physics while set.
    pub fy: Option<f64>,
    pub radius: f64,
}

impl Body {
    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationState {
    Running { alpha: f64 },
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Called with every body after each tick.
pub type TickListener = Box<dyn FnMut(&[Body])>;

pub struct Simulation {
    /// Node user data is the body index.
    graph: ForceGraph<usize>,
    handles: Vec<DefaultNodeIdx>,
    links: Vec<(usize, usize)>,
    bodies: Vec<Body>,
    settings: ForceSettings,
    state: SimulationState,
    alpha_target: f64,
    listeners: Vec<(SubscriptionId, TickListener)>,
    next_subscription: u64,
    ticks: u64,
}

impl Simulation {
    /// Create a running simulation. Bodies start on a phyllotaxis spiral
    /// around the centre; `edges` index into `radii`.
    pub fn new(radii: &[f64], edges: &[(usize, usize)], settings: ForceSettings) -> Self {
        let initial_angle = PI * (3.0 - 5f64.sqrt());
        let (cx, cy) = settings.center;

        let bodies: Vec<Body> = radii
            .iter()
            .enumerate()
            .map(|(i, &radius)| {
                let r = 10.0 * (0.5 + i as f64).sqrt();
                let angle = i as f64 * initial_angle;
                Body {
                    x: cx + r * angle.cos(),
                    y: cy + r * angle.sin(),
                    radius,
                    ..Body::default()
                }
            })
            .collect();

        let mut graph = ForceGraph::new(settings.parameters());
        let handles: Vec<_> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                graph.add_node(NodeData {
                    x: body.x as f32,
                    y: body.y as f32,
                    mass: settings.node_mass,
                    is_anchor: false,
                    user_data: i,
                })
            })
            .collect();
        for &(s, t) in edges {
            graph.add_edge(handles[s], handles[t], EdgeData::default());
        }

        Self {
            graph,
            handles,
            links: edges.to_vec(),
            bodies,
            settings,
            state: SimulationState::Running { alpha: 1.0 },
            alpha_target: 0.0,
            listeners: Vec::new(),
            next_subscription: 0,
            ticks: 0,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SimulationState::Running { .. })
    }

    pub fn alpha(&self) -> Option<f64> {
        match self.state {
            SimulationState::Running { alpha } => Some(alpha),
            SimulationState::Idle => None,
        }
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, index: usize) -> Option<&Body> {
        self.bodies.get(index)
    }

    /// Ticks taken since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Sum of squared per-tick displacements over unpinned bodies.
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .filter(|b| !b.is_pinned())
            .map(|b| b.vx * b.vx + b.vy * b.vy)
            .sum()
    }

    /// Set the energy level the simulation converges to, restarting it if
    /// idle. Dragging uses a positive target so the layout keeps reacting.
    pub fn reheat(&mut self, alpha_target: f64) {
        self.alpha_target = alpha_target;
        if self.state == SimulationState::Idle {
            self.state = SimulationState::Running {
                alpha: self.settings.alpha_min,
            };
        }
    }

    pub fn stop(&mut self) {
        self.state = SimulationState::Idle;
    }

    /// Fix a body at (x, y) and anchor its force graph node there.
    pub fn pin(&mut self, index: usize, x: f64, y: f64) {
        let Some(body) = self.bodies.get_mut(index) else {
            return;
        };
        body.fx = Some(x);
        body.fy = Some(y);
        body.x = x;
        body.y = y;
        body.vx = 0.0;
        body.vy = 0.0;

        self.graph.visit_nodes_mut(|node| {
            if node.data.user_data == index {
                node.data.x = x as f32;
                node.data.y = y as f32;
                node.data.is_anchor = true;
            }
        });
    }

    pub fn unpin(&mut self, index: usize) {
        match self.bodies.get_mut(index) {
            Some(body) if body.is_pinned() => {
                body.fx = None;
                body.fy = None;
            }
            _ => return,
        }
        self.respawn(index);
    }

    /// Replace a body's node with a fresh one at the same place. The force
    /// graph keeps accumulating force on anchored nodes without integrating
    /// it, so an anchor that is simply released would jump.
    fn respawn(&mut self, index: usize) {
        let body = &self.bodies[index];
        self.graph.remove_node(self.handles[index]);
        self.handles[index] = self.graph.add_node(NodeData {
            x: body.x as f32,
            y: body.y as f32,
            mass: self.settings.node_mass,
            is_anchor: false,
            user_data: index,
        });

        for &(s, t) in &self.links {
            if s == index || t == index {
                self.graph
                    .add_edge(self.handles[s], self.handles[t], EdgeData::default());
            }
        }
    }

    pub fn subscribe(&mut self, listener: TickListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn clear_subscribers(&mut self) {
        self.listeners.clear();
    }

    /// Advance one step. Returns false without doing anything when idle.
    pub fn tick(&mut self) -> bool {
        let alpha = match self.state {
            SimulationState::Running { alpha } => alpha,
            SimulationState::Idle => return false,
        };
        let alpha = alpha + (self.alpha_target - alpha) * self.settings.alpha_decay;

        self.graph.update(self.settings.time_step);
        self.read_positions();
        self.apply_center();
        self.apply_collision();
        self.write_positions();

        self.ticks += 1;
        self.state = if alpha < self.settings.alpha_min {
            SimulationState::Idle
        } else {
            SimulationState::Running { alpha }
        };

        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.bodies);
        }
        true
    }

    /// Tick until idle or `max_ticks` is reached. Returns ticks taken.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let mut taken = 0;
        while taken < max_ticks && self.tick() {
            taken += 1;
        }
        taken
    }

    fn read_positions(&mut self) {
        let bodies = &mut self.bodies;
        self.graph.visit_nodes(|node| {
            let body = &mut bodies[node.data.user_data];
            if let (Some(fx), Some(fy)) = (body.fx, body.fy) {
                body.x = fx;
                body.y = fy;
                body.vx = 0.0;
                body.vy = 0.0;
            } else {
                let (x, y) = (node.x() as f64, node.y() as f64);
                body.vx = x - body.x;
                body.vy = y - body.y;
                body.x = x;
                body.y = y;
            }
        });
    }

    fn write_positions(&mut self) {
        let bodies = &self.bodies;
        self.graph.visit_nodes_mut(|node| {
            let body = &bodies[node.data.user_data];
            node.data.x = body.x as f32;
            node.data.y = body.y as f32;
        });
    }

    /// Translate free bodies so the mean position sits on the centre.
    fn apply_center(&mut self) {
        let n = self.bodies.len();
        if n == 0 {
            return;
        }
        let (cx, cy) = self.settings.center;
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let (dx, dy) = (sx / n as f64 - cx, sy / n as f64 - cy);
        for body in self.bodies.iter_mut().filter(|b| !b.is_pinned()) {
            body.x -= dx;
            body.y -= dy;
        }
    }

    /// Push overlapping pairs apart. A pinned body never moves; its
    /// partner takes the whole correction.
    fn apply_collision(&mut self) {
        let padding = self.settings.collision_padding;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.bodies[i], &self.bodies[j]);
                let (free_a, free_b) = (!a.is_pinned(), !b.is_pinned());
                if !free_a && !free_b {
                    continue;
                }

                let r = a.radius + b.radius + 2.0 * padding;
                let (dx, dy) = (a.x - b.x, a.y - b.y);
                let d = (dx * dx + dy * dy).sqrt();
                if d >= r {
                    continue;
                }
                let (dx, dy, d) = if d > 0.0 { (dx, dy, d) } else { (1e-6, 0.0, 1e-6) };

                let overlap = (r - d) / d;
                let (share_a, share_b) = match (free_a, free_b) {
                    (true, true) => (0.5, 0.5),
                    (true, false) => (1.0, 0.0),
                    _ => (0.0, 1.0),
                };

                let a = &mut self.bodies[i];
                a.x += dx * overlap * share_a;
                a.y += dy * overlap * share_a;
                let b = &mut self.bodies[j];
                b.x -= dx * overlap * share_b;
                b.y -= dy * overlap * share_b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn distance(a: &Body, b: &Body) -> f64 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    #[test]
    fn test_settles_into_idle() {
        let mut sim = Simulation::new(&[20.0, 15.0, 15.0], &[(0, 1), (0, 2)], ForceSettings::default());
        assert!(sim.is_running());

        let ticks = sim.run_until_idle(10_000);
        assert_eq!(sim.state(), SimulationState::Idle);
        assert!(ticks > 100 && ticks < 1000, "settled after {} ticks", ticks);
        assert!(!sim.tick());
        assert_eq!(sim.ticks() as usize, ticks);
        assert!(sim.kinetic_energy() < 1e-3);
    }

    #[test]
    fn test_alpha_decays_monotonically() {
        let mut sim = Simulation::new(&[10.0, 10.0], &[(0, 1)], ForceSettings::default());
        let mut last = sim.alpha().unwrap();
        while sim.tick() {
            if let Some(alpha) = sim.alpha() {
                assert!(alpha < last);
                last = alpha;
            }
        }
    }

    #[test]
    fn test_linked_pair_settles_at_link_distance() {
        let mut sim = Simulation::new(&[5.0, 5.0], &[(0, 1)], ForceSettings::default());
        sim.run_until_idle(10_000);
        let d = distance(&sim.bodies()[0], &sim.bodies()[1]);
        assert!(d > 85.0 && d < 115.0, "distance {}", d);
    }

    #[test]
    fn test_unlinked_node_drifts_further_than_linked_one() {
        let mut sim = Simulation::new(&[5.0, 5.0, 5.0], &[(0, 1)], ForceSettings::default());
        sim.run_until_idle(10_000);
        let bodies = sim.bodies();
        assert!(distance(&bodies[0], &bodies[1]) < distance(&bodies[0], &bodies[2]));
        assert!(distance(&bodies[0], &bodies[1]) < distance(&bodies[1], &bodies[2]));
    }

    #[test]
    fn test_centering_keeps_mean_at_center() {
        let settings = ForceSettings {
            center: (400.0, 300.0),
            ..ForceSettings::default()
        };
        let mut sim = Simulation::new(&[15.0; 6], &[(0, 1), (0, 2), (3, 4)], settings);
        sim.run_until_idle(10_000);

        let n = sim.bodies().len() as f64;
        let mx = sim.bodies().iter().map(|b| b.x).sum::<f64>() / n;
        let my = sim.bodies().iter().map(|b| b.y).sum::<f64>() / n;
        assert!((mx - 400.0).abs() < 5.0, "mean x {}", mx);
        assert!((my - 300.0).abs() < 5.0, "mean y {}", my);
    }

    #[test]
    fn test_collision_prevents_overlap() {
        let settings = ForceSettings {
            charge: 0.0,
            ..ForceSettings::default()
        };
        let mut sim = Simulation::new(&[20.0; 5], &[], settings);
        sim.run_until_idle(10_000);

        let bodies = sim.bodies();
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                // Radii plus padding would be 60; allow some slack.
                assert!(distance(&bodies[i], &bodies[j]) > 40.0);
            }
        }
    }

    #[test]
    fn test_pinned_body_stays_put() {
        let mut sim = Simulation::new(&[10.0, 10.0, 10.0], &[(0, 1), (0, 2)], ForceSettings::default());
        sim.pin(1, 50.0, 60.0);
        for _ in 0..50 {
            sim.tick();
        }
        let body = sim.body(1).unwrap();
        assert_eq!((body.x, body.y), (50.0, 60.0));
        assert!(body.is_pinned());

        sim.unpin(1);
        assert!(!sim.body(1).unwrap().is_pinned());
    }

    #[test]
    fn test_released_body_does_not_jump() {
        let mut sim = Simulation::new(&[10.0, 10.0, 10.0], &[(0, 1), (0, 2)], ForceSettings::default());
        sim.pin(1, 150.0, 60.0);
        for _ in 0..100 {
            sim.tick();
        }

        sim.unpin(1);
        sim.tick();
        let body = sim.body(1).unwrap();
        let step = (body.vx * body.vx + body.vy * body.vy).sqrt();
        assert!(step < 5.0, "moved {} in one tick", step);

        // Still linked to its neighbour after the node was replaced.
        sim.run_until_idle(10_000);
        let d = distance(&sim.bodies()[0], &sim.bodies()[1]);
        assert!(d < 200.0, "distance {}", d);
    }

    #[test]
    fn test_reheat_restarts_idle_simulation() {
        let mut sim = Simulation::new(&[10.0, 10.0], &[(0, 1)], ForceSettings::default());
        sim.run_until_idle(10_000);
        assert!(!sim.is_running());

        sim.reheat(0.3);
        assert!(sim.is_running());
        for _ in 0..200 {
            sim.tick();
        }
        assert!(sim.alpha().unwrap() > 0.2);

        sim.reheat(0.0);
        sim.run_until_idle(10_000);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let mut sim = Simulation::new(&[10.0, 10.0], &[(0, 1)], ForceSettings::default());
        let count = Rc::new(Cell::new(0usize));
        let seen = Rc::clone(&count);
        let id = sim.subscribe(Box::new(move |bodies: &[Body]| {
            assert_eq!(bodies.len(), 2);
            seen.set(seen.get() + 1);
        }));

        sim.tick();
        sim.tick();
        assert_eq!(count.get(), 2);

        assert!(sim.unsubscribe(id));
        assert!(!sim.unsubscribe(id));
        sim.tick();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let run = || {
            let mut sim = Simulation::new(
                &[20.0, 20.0, 15.0, 15.0],
                &[(0, 2), (1, 3), (0, 3)],
                ForceSettings::default(),
            );
            sim.run_until_idle(10_000);
            sim.bodies().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_spring_balances_charge_at_link_distance() {
        let params = ForceSettings::default().parameters();
        assert_eq!(params.force_charge, 300.0);
        // Attraction k * d / 2 equals repulsion C * m^2 / d^2 at d = 100.
        let attraction = params.force_spring * 100.0 * 0.5;
        let repulsion = params.force_charge * 100.0 / (100.0 * 100.0);
        assert!((attraction - repulsion).abs() < 1e-4);
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new(&[], &[], ForceSettings::default());
        assert!(sim.run_until_idle(10_000) > 0);
        assert_eq!(sim.kinetic_energy(), 0.0);
    }
}
