//! The simulated lossy, delayed broadcast bus.
//!
//! # Delivery model
//!
//! Every `send` is one independent attempt: it is lost with
//! `drop_probability`, otherwise a copy is queued for every known peer
//! except the sender.  With zero latency and jitter the copy arrives on the
//! next tick; otherwise the delay is drawn from a normal distribution,
//! clamped at zero, and converted at 100 ms per tick:
//!
//!   delivery = send_tick + ⌊max(0, N(mean, jitter)) / 100⌋ + 1
//!
//! # Peer discovery
//!
//! The bus learns its peer set from `receive` calls: an agent becomes a
//! recipient the first time it polls.  The simulator's phase order (every
//! agent receives before anyone sends) guarantees the full roster is known
//! before the first broadcast of a run.
//!
//! # Determinism
//!
//! One seeded RNG drives drops and latency draws.  Calls arrive in a fixed
//! order from the sequential broadcast phase, so a given seed replays the
//! exact same loss and delay pattern.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use rand_distr::{Distribution, Normal};

use sg_core::{AgentId, SimRng, Tick};

use crate::{Message, Network, NetworkParams, NetworkStats};

/// Milliseconds of simulated time per tick.
pub const MS_PER_TICK: u32 = 100;

/// In-process broadcast bus with Bernoulli loss and Gaussian delay.
pub struct SimNetwork {
    params: NetworkParams,
    seed: u64,
    inner: Mutex<Inner>,
}

struct Inner {
    rng: SimRng,
    latency: Option<Normal<f64>>,
    /// Per-recipient queue ordered by (delivery tick, send sequence).
    queues: HashMap<AgentId, BTreeMap<(Tick, u64), Message>>,
    /// Global send counter; keeps same-tick deliveries in send order.
    next_seq: u64,
    sent: u64,
    dropped: u64,
}

impl SimNetwork {
    pub fn new(params: NetworkParams, seed: u64) -> Self {
        SimNetwork {
            params,
            seed,
            inner: Mutex::new(Inner::from_params(&params, seed)),
        }
    }

    pub fn params(&self) -> NetworkParams {
        self.params
    }
}

impl Inner {
    fn from_params(params: &NetworkParams, seed: u64) -> Self {
        let latency = if params.mean_latency_ms == 0 && params.jitter_ms == 0 {
            None
        } else {
            Normal::new(params.mean_latency_ms as f64, params.jitter_ms as f64).ok()
        };
        Inner {
            rng: SimRng::new(seed),
            latency,
            queues: HashMap::new(),
            next_seq: 0,
            sent: 0,
            dropped: 0,
        }
    }

    fn delivery_tick(&mut self, send_tick: Tick) -> Tick {
        match self.latency {
            None => send_tick + 1,
            Some(dist) => {
                let latency_ms = dist.sample(self.rng.inner()).max(0.0);
                send_tick + (latency_ms / MS_PER_TICK as f64) as u64 + 1
            }
        }
    }
}

impl Network for SimNetwork {
    fn send(&self, msg: Message) {
        let mut inner = self.inner.lock().expect("network lock poisoned");
        inner.sent += 1;

        let p = self.params.drop_probability;
        if p > 0.0 && inner.rng.gen_bool(p) {
            inner.dropped += 1;
            return;
        }

        let delivery = inner.delivery_tick(msg.timestamp);
        let seq = inner.next_seq;
        inner.next_seq += 1;

        // Fan out one copy per registered peer, sender excluded.  Shared
        // state snapshots ride along by Arc, so copies stay cheap.
        let recipients: Vec<AgentId> = inner
            .queues
            .keys()
            .copied()
            .filter(|&id| id != msg.from)
            .collect();
        for recipient in recipients {
            inner
                .queues
                .get_mut(&recipient)
                .expect("recipient queue exists")
                .insert((delivery, seq), msg.clone());
        }
    }

    fn receive(&self, agent: AgentId, now: Tick) -> Vec<Message> {
        let mut inner = self.inner.lock().expect("network lock poisoned");
        let queue = inner.queues.entry(agent).or_default();

        // Everything due at or before `now`, in (delivery, seq) order.
        let pending = std::mem::take(queue);
        let mut ready = Vec::new();
        for ((delivery, seq), msg) in pending {
            if delivery <= now {
                ready.push(msg);
            } else {
                queue.insert((delivery, seq), msg);
            }
        }
        ready
    }

    fn reset(&self) {
        let mut inner = self.inner.lock().expect("network lock poisoned");
        *inner = Inner::from_params(&self.params, self.seed);
    }

    fn stats(&self) -> NetworkStats {
        let inner = self.inner.lock().expect("network lock poisoned");
        NetworkStats { sent: inner.sent, dropped: inner.dropped }
    }
}
