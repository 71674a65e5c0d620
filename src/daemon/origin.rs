//! Randomized message origination.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::engine::PeerEngine;

pub const DEFAULT_RATE: f64 = 1.0;

const DEFAULT_VOCABULARY: [&str; 23] = [
    "Lisboa",
    "Porto",
    "Coimbra",
    "Braga",
    "Aveiro",
    "Faro",
    "Serra da Estrela",
    "Guimarães",
    "Viseu",
    "Leiria",
    "Vale de Cambra",
    "Sintra",
    "Viana do Castelo",
    "Tondela",
    "Guarda",
    "Caldas da Rainha",
    "Covilhã",
    "Bragança",
    "Óbidos",
    "Vinhais",
    "Mirandela",
    "Freixo de Espada à Cinta",
    "Peniche",
];

pub fn default_vocabulary() -> Vec<String> {
    DEFAULT_VOCABULARY.iter().map(|word| word.to_string()).collect()
}

/// Exponential inter-arrival time for a Poisson process of `rate` events
/// per second, given `u` uniform in `[0, 1)`.
pub fn poisson_delay(rate: f64, u: f64) -> Duration {
    let secs = -(1.0 - u).ln() / rate;
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OriginConfig {
    pub rate: f64,
    pub vocabulary: Vec<String>,
    pub seed: Option<u64>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            vocabulary: default_vocabulary(),
            seed: None,
        }
    }
}

/// Draws delays and words. Seeded runs are reproducible.
#[derive(Debug)]
pub struct Originator {
    rate: f64,
    vocabulary: Vec<String>,
    rng: StdRng,
}

impl Originator {
    pub fn new(config: OriginConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let vocabulary = if config.vocabulary.is_empty() {
            default_vocabulary()
        } else {
            config.vocabulary
        };
        Self {
            rate: config.rate,
            vocabulary,
            rng,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let u: f64 = self.rng.random_range(0.0..1.0);
        poisson_delay(self.rate, u)
    }

    pub fn next_word(&mut self) -> String {
        let idx = self.rng.random_range(0..self.vocabulary.len());
        self.vocabulary[idx].clone()
    }
}

/// Bootstrap, then originate words until shutdown. Returns the number of
/// messages originated.
pub fn run_origination_loop(
    engine: &PeerEngine,
    mut originator: Originator,
    handshake_interval: Duration,
) -> u64 {
    if !engine.run_bootstrap(handshake_interval) {
        tracing::info!("shutdown before all peers connected");
        return 0;
    }

    let signal = engine.shutdown_signal();
    let mut originated = 0u64;
    loop {
        let delay = originator.next_delay();
        if signal.sleep(delay) {
            break;
        }
        let word = originator.next_word();
        match engine.originate(word) {
            Some((envelope, report)) => {
                originated += 1;
                if !report.removed.is_empty() {
                    tracing::warn!(
                        ts = envelope.timestamp,
                        removed = report.removed.len(),
                        "peers removed while broadcasting"
                    );
                }
            }
            None => break,
        }
    }
    tracing::debug!(originated, "origination loop stopped");
    originated
}
