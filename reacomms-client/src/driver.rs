use std::time::Instant;

use log::{debug, info};
use reacomms_core::{Comms, Result};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::backends::Backend;

/// Runs the update timer and issues the requests that [`Comms`] asks for.
///
/// Only one request is outstanding at a time, the fetch runs as its own task and its result
/// comes back through `responses`.
pub struct Driver {
    comms: Comms,
    backend: Backend,
    response_tx: mpsc::UnboundedSender<Result<String>>,
    response_rx: mpsc::UnboundedReceiver<Result<String>>,
}

impl Driver {
    pub fn new(comms: Comms, backend: Backend) -> Driver {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        Driver {
            comms,
            backend,
            response_tx,
            response_rx,
        }
    }

    pub fn comms(&self) -> &Comms {
        &self.comms
    }

    pub fn comms_mut(&mut self) -> &mut Comms {
        &mut self.comms
    }

    /// Polls until `shutdown` resolves.
    pub async fn run(&mut self, shutdown: impl std::future::Future<Output = ()>) {
        self.comms.start();
        let mut interval = tokio::time::interval(self.comms.min_update());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                instant = interval.tick() => {
                    self.dispatch(instant.into_std());
                }
                Some(response) = self.response_rx.recv() => {
                    self.comms.on_response(response);
                }
                _ = &mut shutdown => {
                    info!("Shutting down the update loop.");
                    break;
                }
            }
        }
        self.comms.stop();
    }

    /// Issues one request and waits for its answer. Returns false if there was nothing to send.
    pub async fn round_trip(&mut self, now: Instant) -> bool {
        if !self.dispatch(now) {
            return false;
        }
        match self.response_rx.recv().await {
            Some(response) => {
                self.comms.on_response(response);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, now: Instant) -> bool {
        let request = match self.comms.tick(now) {
            Some(request) => request,
            None => return false,
        };
        let backend = self.backend.clone();
        let response_tx = self.response_tx.clone();
        tokio::spawn(async move {
            let response = backend.fetch(&request).await;
            if response_tx.send(response).is_err() {
                debug!("Dropping response to {}, the driver is gone.", request.path());
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dummy::DummyBackend;
    use reacomms_core::{Config, SendInfo, TrackInfo};
    use ringbuf::RingBuffer;
    use std::time::Duration;

    fn driver() -> (ringbuf::Producer<String>, Driver) {
        let (producer, consumer) = RingBuffer::new(8).split();
        let config = Config::with_min_update(Duration::from_millis(5));
        let comms = Comms::new(config, consumer).unwrap();
        (producer, Driver::new(comms, Backend::Dummy(DummyBackend::new())))
    }

    #[tokio::test]
    async fn mirrors_dummy_session() {
        let (_, mut driver) = driver();
        driver.comms_mut().start();
        let start = Instant::now();
        assert!(driver.round_trip(start).await);

        let tracks = driver.comms().tracks();
        assert_eq!(tracks.active_count(), 5);
        assert_eq!(tracks.track(2).unwrap().name(), "Bass");
        assert_eq!(tracks.track(3).unwrap().send_count(), 1);
        assert!(driver.comms().command_states().state(1157).is_some());

        // Send queries go out with the next request.
        assert!(driver.round_trip(start + Duration::from_secs(1)).await);
        let tracks = driver.comms().tracks();
        let send = tracks.track(3).unwrap().send(0).unwrap();
        assert_eq!(send.target_display().name, "Reverb");
        assert_eq!(send.volume_string(), "-6.02 dB");
        let hardware = tracks.track(1).unwrap().send(0).unwrap();
        assert_eq!(hardware.target_display().name, "Hardware Out");
    }

    #[tokio::test]
    async fn user_commands_round_trip() {
        let (mut producer, mut driver) = driver();
        driver.comms_mut().start();
        let start = Instant::now();
        driver.round_trip(start).await;

        producer.push("SET/TRACK/2/RECARM/1".to_string()).unwrap();
        producer.push("1007".to_string()).unwrap();
        assert!(driver.round_trip(start + Duration::from_secs(1)).await);

        let comms = driver.comms();
        assert!(comms.tracks().track(2).unwrap().record_armed());
        assert_eq!(comms.rec_arm().armed_count(), 1);
        assert_eq!(
            comms.timekeeper().play_state(),
            reacomms_core::PlayState::Playing
        );
    }

    #[tokio::test]
    async fn nothing_to_send_while_stopped() {
        let (_, mut driver) = driver();
        assert!(!driver.round_trip(Instant::now()).await);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_, mut driver) = driver();
        driver
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert!(!driver.comms().is_running());
        assert!(driver.comms().tracks().active_count() > 1);
    }
}
