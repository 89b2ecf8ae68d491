//! Containers and the operations that move data between them.

use serde::{Deserialize, Serialize};

use crate::network::Throughput;
use crate::types::Indices;

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(usize);

/// Arena of data amounts.
#[derive(Debug, Clone, Default)]
pub struct Containers {
    amounts: Vec<f64>,
}

impl Containers {
    pub fn alloc(&mut self) -> ContainerId {
        self.amounts.push(0.0);
        ContainerId(self.amounts.len() - 1)
    }

    pub fn amount(&self, id: ContainerId) -> f64 {
        self.amounts[id.0]
    }

    pub fn add(&mut self, id: ContainerId, delta: f64) {
        self.amounts[id.0] += delta;
    }

    /// Empty a container, returning what it held.
    pub fn take_all(&mut self, id: ContainerId) -> f64 {
        std::mem::take(&mut self.amounts[id.0])
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Operation kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Generate,
    Transfer,
    Store,
    Process,
    Drop,
}

impl OpKind {
    /// Variable holding the plan this operation follows.
    pub fn planned_variable(self) -> &'static str {
        match self {
            OpKind::Generate => "x_eq",
            OpKind::Transfer => "x",
            OpKind::Store => "y",
            OpKind::Process => "g",
            OpKind::Drop => "z",
        }
    }

    /// Variable receiving what the operation actually handled.
    pub fn handled_variable(self) -> &'static str {
        match self {
            OpKind::Generate => "x_eq^",
            OpKind::Transfer => "x^",
            OpKind::Store => "y^",
            OpKind::Process => "g^",
            OpKind::Drop => "z^",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OpKind::Generate => "generate",
            OpKind::Transfer => "transfer",
            OpKind::Store => "store",
            OpKind::Process => "process",
            OpKind::Drop => "drop",
        }
    }
}

/// Containers an operation reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    /// External source feeding a node's input.
    Generate { output: ContainerId },
    Transfer { input: ContainerId, output: ContainerId },
    /// Moves data between a node's input and its persistent store.
    Store { input: ContainerId, store: ContainerId },
    Process { input: ContainerId },
    Drop { input: ContainerId },
}

impl Flow {
    pub fn kind(&self) -> OpKind {
        match self {
            Flow::Generate { .. } => OpKind::Generate,
            Flow::Transfer { .. } => OpKind::Transfer,
            Flow::Store { .. } => OpKind::Store,
            Flow::Process { .. } => OpKind::Process,
            Flow::Drop { .. } => OpKind::Drop,
        }
    }

    pub fn input(&self) -> Option<ContainerId> {
        match *self {
            Flow::Generate { .. } => None,
            Flow::Transfer { input, .. }
            | Flow::Store { input, .. }
            | Flow::Process { input }
            | Flow::Drop { input } => Some(input),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

fn clamp(value: f64, lower: f64, upper: f64) -> f64 {
    value.min(upper).max(lower)
}

/// One planned activity of a node during a single interval.
#[derive(Debug, Clone)]
pub struct Operation {
    pub flow: Flow,
    pub at: Indices,
    pub interval: usize,
    pub planned: f64,
    pub rate_upper: f64,
    pub rate_lower: f64,
    pub fraction: f64,
    /// Amount handled so far. Store operations report their level at close.
    pub handled: f64,
    moved: f64,
}

impl Operation {
    fn new(flow: Flow, at: Indices, interval: usize, planned: f64, throughput: Throughput) -> Self {
        Self {
            flow,
            at,
            interval,
            planned,
            rate_upper: throughput.rate,
            rate_lower: 0.0,
            fraction: throughput.fraction,
            handled: 0.0,
            moved: 0.0,
        }
    }

    /// Generates `planned` evenly over an interval of `duration`.
    pub fn generate(at: Indices, interval: usize, planned: f64, duration: f64, output: ContainerId) -> Self {
        let rate = Throughput {
            rate: planned / duration,
            fraction: 1.0,
        };
        Self::new(Flow::Generate { output }, at, interval, planned, rate)
    }

    pub fn transfer(
        at: Indices,
        interval: usize,
        planned: f64,
        throughput: Throughput,
        input: ContainerId,
        output: ContainerId,
    ) -> Self {
        Self::new(Flow::Transfer { input, output }, at, interval, planned, throughput)
    }

    /// `planned` is the target store level. The store may also release.
    pub fn store(
        at: Indices,
        interval: usize,
        planned: f64,
        throughput: Throughput,
        input: ContainerId,
        store: ContainerId,
    ) -> Self {
        let mut op = Self::new(Flow::Store { input, store }, at, interval, planned, throughput);
        op.rate_lower = -throughput.rate;
        op
    }

    pub fn process(
        at: Indices,
        interval: usize,
        planned: f64,
        throughput: Throughput,
        input: ContainerId,
    ) -> Self {
        Self::new(Flow::Process { input }, at, interval, planned, throughput)
    }

    pub fn discard(at: Indices, interval: usize, planned: f64, input: ContainerId) -> Self {
        let unlimited = Throughput {
            rate: f64::INFINITY,
            fraction: 1.0,
        };
        Self::new(Flow::Drop { input }, at, interval, planned, unlimited)
    }

    pub fn kind(&self) -> OpKind {
        self.flow.kind()
    }

    /// Net amount moved during the last tick.
    pub fn moved(&self) -> f64 {
        self.moved
    }

    /// Progress towards the plan: the store level for store operations.
    pub fn progress(&self, containers: &Containers) -> f64 {
        match self.flow {
            Flow::Store { store, .. } => containers.amount(store),
            _ => self.handled,
        }
    }

    /// Amount this operation may move in one tick.
    pub fn available(&self, containers: &Containers, dt: f64, noise: f64) -> f64 {
        let remaining = self.planned - self.progress(containers);
        let upper = (self.rate_upper * self.fraction + noise) * dt;
        let lower = if self.rate_lower == 0.0 {
            0.0
        } else {
            (self.rate_lower * self.fraction + noise) * dt
        };
        let step = clamp(remaining, lower, upper);

        let stash = match self.flow {
            Flow::Store { store, .. } => containers.amount(store),
            _ => 0.0,
        };
        let input = self
            .flow
            .input()
            .map(|id| containers.amount(id))
            .unwrap_or(f64::INFINITY);
        clamp(step, -stash, input)
    }

    /// Main-phase step. Returns the amount moved.
    pub fn step(&mut self, containers: &mut Containers, dt: f64, noise: f64) -> f64 {
        let amount = self.available(containers, dt, noise);
        match self.flow {
            Flow::Generate { output } => {
                containers.add(output, amount);
                self.handled += amount;
            }
            Flow::Transfer { input, output } => {
                containers.add(input, -amount);
                containers.add(output, amount);
                self.handled += amount;
            }
            Flow::Store { input, store } => {
                containers.add(input, -amount);
                containers.add(store, amount);
            }
            Flow::Process { input } | Flow::Drop { input } => {
                containers.add(input, -amount);
                self.handled += amount;
            }
        }
        self.moved = amount;
        amount
    }

    /// End-of-tick step. Stores take back released data nobody consumed,
    /// drops discard up to their plan.
    pub fn teardown(&mut self, containers: &mut Containers) -> f64 {
        match self.flow {
            Flow::Store { input, store } if self.moved < 0.0 => {
                let restore = clamp(-self.moved, 0.0, containers.amount(input));
                containers.add(input, -restore);
                containers.add(store, restore);
                self.moved += restore;
                restore
            }
            Flow::Drop { input } => {
                let amount = clamp(self.planned - self.handled, 0.0, containers.amount(input));
                containers.add(input, -amount);
                self.handled += amount;
                self.moved = amount;
                amount
            }
            _ => 0.0,
        }
    }

    /// End-of-interval: drops discard whatever is left in their input.
    pub fn flush(&mut self, containers: &mut Containers) -> f64 {
        match self.flow {
            Flow::Drop { input } => {
                let amount = containers.take_all(input);
                self.handled += amount;
                amount
            }
            _ => 0.0,
        }
    }

    /// Freeze the result. Stores record their level.
    pub fn close(&mut self, containers: &Containers) {
        if let Flow::Store { store, .. } = self.flow {
            self.handled = containers.amount(store);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
