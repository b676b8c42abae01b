//! Simulated advertisement feed.
//!
//! Stands in for a platform BLE scanner: each peripheral's RSSI random-walks
//! and a sighting is pushed onto the discovery channel at a fixed cadence.

use crate::domain::models::DiscoveryEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

const RSSI_FLOOR: i32 = -100;
const RSSI_CEILING: i32 = -35;

#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    pub id: Uuid,
    /// `None` models peripherals that do not advertise a local name.
    pub name: Option<String>,
    pub rssi: i32,
}

impl SimulatedPeripheral {
    pub fn named(name: &str, rssi: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            rssi,
        }
    }

    pub fn anonymous(rssi: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            rssi,
        }
    }
}

pub struct SimulatedAdvertiser {
    peripherals: Vec<SimulatedPeripheral>,
    interval: Duration,
    max_step: i32,
    rng: StdRng,
}

impl SimulatedAdvertiser {
    pub fn new(peripherals: Vec<SimulatedPeripheral>, interval: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            peripherals,
            interval,
            max_step: 4,
            rng,
        }
    }

    /// A handful of everyday devices plus one nameless beacon.
    pub fn demo(interval: Duration, seed: Option<u64>) -> Self {
        Self::new(
            vec![
                SimulatedPeripheral::named("iPhone 15", -48),
                SimulatedPeripheral::named("AirPods Pro", -58),
                SimulatedPeripheral::named("MacBook Air", -70),
                SimulatedPeripheral::named("Galaxy Watch", -79),
                SimulatedPeripheral::named("JBL Speaker", -92),
                SimulatedPeripheral::anonymous(-60),
            ],
            interval,
            seed,
        )
    }

    pub fn peripherals(&self) -> &[SimulatedPeripheral] {
        &self.peripherals
    }

    /// One sighting per peripheral, walking each RSSI first.
    pub fn next_round(&mut self) -> Vec<DiscoveryEvent> {
        let step = self.max_step;
        self.peripherals
            .iter_mut()
            .map(|p| {
                let delta = self.rng.gen_range(-step..=step);
                p.rssi = (p.rssi + delta).clamp(RSSI_FLOOR, RSSI_CEILING);
                DiscoveryEvent {
                    peripheral_id: p.id,
                    name: p.name.clone(),
                    rssi: p.rssi,
                }
            })
            .collect()
    }

    /// Emit rounds until the receiving side goes away.
    pub async fn run(mut self, sender: mpsc::UnboundedSender<DiscoveryEvent>) {
        info!(
            "Simulated advertiser started with {} peripheral(s)",
            self.peripherals.len()
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            for event in self.next_round() {
                if sender.send(event).is_err() {
                    debug!("Discovery receiver dropped, advertiser stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rssi_walk_stays_in_range() {
        let mut advertiser = SimulatedAdvertiser::demo(Duration::from_millis(10), Some(11));
        for _ in 0..500 {
            for event in advertiser.next_round() {
                assert!((RSSI_FLOOR..=RSSI_CEILING).contains(&event.rssi));
            }
        }
    }

    #[test]
    fn each_round_covers_every_peripheral() {
        let mut advertiser = SimulatedAdvertiser::demo(Duration::from_millis(10), Some(2));
        let round = advertiser.next_round();
        assert_eq!(round.len(), advertiser.peripherals().len());
        assert_eq!(round.iter().filter(|e| e.name.is_none()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_receiver_is_dropped() {
        let advertiser = SimulatedAdvertiser::demo(Duration::from_millis(50), Some(4));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(advertiser.run(tx));

        let first = rx.recv().await.unwrap();
        assert!(first.rssi < 0);
        drop(rx);

        handle.await.unwrap();
    }
}
