//! Funnels: composition of sequences into one item stream.
//!
//! `SimpleFunnel` concatenates producers, fully draining each before the
//! next. `RoundRobinFunnel` interleaves them one item per round and owns the
//! reservation lifecycle of its sequences: a request is made when a sequence
//! starts, a blocked sequence keeps its position and is retried next round,
//! and the claim is released exactly once when the stream ends, normally or
//! abruptly.

use std::collections::VecDeque;
use std::fmt;

use crate::common::{GenError, Result};
use crate::resource::SequenceId;
use crate::seq::{GenCtx, GenItem, Sequence};

/// Anything that yields generated items: a funnel or the whole recipe.
pub trait ItemSource {
    /// Produces the next item, or `None` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Fatal generation failures only.
    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>>;
}

/// One composed producer: a sequence or a nested funnel.
pub enum Producer {
    /// A leaf sequence; participates in reservations.
    Sequence(Box<dyn Sequence>),
    /// A nested funnel; started without a reservation.
    Funnel(Box<dyn ItemSource>),
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(s) => write!(f, "Producer::Sequence({})", s.name()),
            Self::Funnel(_) => write!(f, "Producer::Funnel"),
        }
    }
}

impl Producer {
    fn pull(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        match self {
            Self::Sequence(s) => s.next_item(ctx),
            Self::Funnel(nested) => nested.next_item(ctx),
        }
    }
}

/// Concatenates producers in order.
#[derive(Debug, Default)]
pub struct SimpleFunnel {
    producers: VecDeque<Producer>,
}

impl SimpleFunnel {
    /// An empty funnel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sequence.
    pub fn add_sequence(&mut self, seq: Box<dyn Sequence>) -> &mut Self {
        self.producers.push_back(Producer::Sequence(seq));
        self
    }

    /// Appends a nested funnel.
    pub fn add_funnel(&mut self, funnel: Box<dyn ItemSource>) -> &mut Self {
        self.producers.push_back(Producer::Funnel(funnel));
        self
    }
}

impl ItemSource for SimpleFunnel {
    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        while let Some(front) = self.producers.front_mut() {
            if let Some(item) = front.pull(ctx)? {
                return Ok(Some(item));
            }
            let _ = self.producers.pop_front();
        }
        Ok(None)
    }
}

/// One producer slot of the round-robin funnel.
struct Slot {
    producer: Producer,
    started: bool,
    sequence_id: Option<SequenceId>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("producer", &self.producer)
            .field("started", &self.started)
            .field("sequence_id", &self.sequence_id)
            .finish()
    }
}

/// Interleaves producers one item per round, with reservations.
#[derive(Debug)]
pub struct RoundRobinFunnel {
    slots: Vec<Slot>,
    cursor: usize,
    use_reserver: bool,
}

impl RoundRobinFunnel {
    /// A round-robin funnel that never touches the reserver.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            use_reserver: false,
        }
    }

    /// A round-robin funnel that reserves resources for its sequences.
    pub fn with_reserver() -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            use_reserver: true,
        }
    }

    /// Appends a sequence.
    pub fn add_sequence(&mut self, seq: Box<dyn Sequence>) -> &mut Self {
        self.slots.push(Slot {
            producer: Producer::Sequence(seq),
            started: false,
            sequence_id: None,
        });
        self
    }

    /// Appends a nested funnel; nested funnels start without reservations.
    pub fn add_funnel(&mut self, funnel: Box<dyn ItemSource>) -> &mut Self {
        self.slots.push(Slot {
            producer: Producer::Funnel(funnel),
            started: false,
            sequence_id: None,
        });
        self
    }

    /// Attempts to start the slot at `pos`. Returns `false` when the slot is
    /// blocked on a reservation this round.
    fn try_start(&mut self, pos: usize, ctx: &mut GenCtx<'_>) -> Result<bool> {
        let slot = &mut self.slots[pos];
        if slot.started {
            return Ok(true);
        }
        if let Producer::Sequence(seq) = &mut slot.producer {
            let requests = seq.resource_requests();
            if self.use_reserver && !requests.is_empty() {
                let sid = ctx.reserver.next_sequence_id();
                match ctx.reserver.request(sid, &requests) {
                    Err(e) => {
                        return Err(GenError::InvalidResourceRequest {
                            sequence: seq.name().to_owned(),
                            reason: e.to_string(),
                        });
                    }
                    Ok(None) => return Ok(false),
                    Ok(Some(claim)) => {
                        seq.set_claim(Some(claim));
                        slot.sequence_id = Some(sid);
                    }
                }
            } else {
                seq.set_claim(None);
            }
        }
        slot.started = true;
        Ok(true)
    }

    /// Drops the slot at `pos`, releasing any reservation it holds.
    fn drop_slot(&mut self, pos: usize, ctx: &mut GenCtx<'_>) {
        let slot = self.slots.remove(pos);
        if let Some(sid) = slot.sequence_id {
            ctx.reserver.release(sid);
        }
        if self.slots.is_empty() {
            self.cursor = 0;
        } else {
            self.cursor = pos % self.slots.len();
        }
    }
}

impl Default for RoundRobinFunnel {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemSource for RoundRobinFunnel {
    fn next_item(&mut self, ctx: &mut GenCtx<'_>) -> Result<Option<GenItem>> {
        let mut blocked_in_a_row = 0usize;
        while !self.slots.is_empty() {
            if blocked_in_a_row >= self.slots.len() {
                // Nobody can start and nobody can yield; the reservations
                // that would unblock them will never be released.
                return Err(GenError::FunnelCannotProgress);
            }
            let pos = self.cursor % self.slots.len();
            if !self.try_start(pos, ctx)? {
                self.cursor += 1;
                blocked_in_a_row += 1;
                continue;
            }
            match self.slots[pos].producer.pull(ctx) {
                Ok(Some(item)) => {
                    self.cursor += 1;
                    return Ok(Some(item));
                }
                Ok(None) => {
                    self.drop_slot(pos, ctx);
                    blocked_in_a_row = 0;
                }
                Err(e) => {
                    // Abrupt termination still releases the claim.
                    self.drop_slot(pos, ctx);
                    return Err(e);
                }
            }
        }
        Ok(None)
    }
}
