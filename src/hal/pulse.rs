//! Software step-pulse generator on a background thread.
//!
//! Bit-bangs a fixed on/off pulse pattern on any embedded-hal output pin.
//! The control loop only sees the [`PulseTrain`] token: `start` spawns a
//! worker and returns, `is_done` polls it, `halt` cancels and joins.
//! Board backends with a hardware timer or PIO block should provide their
//! own [`PulseTrain`] instead.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::error::HwError;

use super::PulseTrain;

pub struct ThreadPulseTrain<P> {
    pin: Arc<Mutex<P>>,
    cancel: Arc<AtomicBool>,
    emitted: Arc<AtomicU32>,
    worker: Option<JoinHandle<()>>,
}

impl<P> ThreadPulseTrain<P>
where
    P: OutputPin + Send + 'static,
{
    pub fn new(pin: P) -> Self {
        Self {
            pin: Arc::new(Mutex::new(pin)),
            cancel: Arc::new(AtomicBool::new(false)),
            emitted: Arc::new(AtomicU32::new(0)),
            worker: None,
        }
    }

    fn reap(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("pulse train worker panicked");
            }
        }
    }
}

impl<P> PulseTrain for ThreadPulseTrain<P>
where
    P: OutputPin + Send + 'static,
{
    fn start(&mut self, count: u32, high: Duration, low: Duration) -> Result<(), HwError> {
        if self.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Err(HwError::PulseTrain);
        }
        self.reap();

        self.cancel.store(false, Ordering::Release);
        self.emitted.store(0, Ordering::Release);

        let pin = Arc::clone(&self.pin);
        let cancel = Arc::clone(&self.cancel);
        let emitted = Arc::clone(&self.emitted);

        let worker = thread::Builder::new()
            .name("step-pulses".into())
            .spawn(move || {
                let mut pin = pin.lock().unwrap_or_else(PoisonError::into_inner);
                for _ in 0..count {
                    if cancel.load(Ordering::Acquire) {
                        break;
                    }
                    if pin.set_high().is_err() {
                        warn!("pulse train: step pin write failed, aborting train");
                        break;
                    }
                    thread::sleep(high);
                    if pin.set_low().is_err() {
                        warn!("pulse train: step pin write failed, aborting train");
                        break;
                    }
                    thread::sleep(low);
                    emitted.fetch_add(1, Ordering::AcqRel);
                }
            })
            .map_err(|e| {
                warn!("pulse train: cannot spawn worker: {}", e);
                HwError::PulseTrain
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn is_done(&mut self) -> bool {
        match &self.worker {
            None => true,
            Some(w) => w.is_finished(),
        }
    }

    fn halt(&mut self) -> u32 {
        self.cancel.store(true, Ordering::Release);
        self.reap();
        self.emitted.load(Ordering::Acquire)
    }
}

impl<P> Drop for ThreadPulseTrain<P> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
