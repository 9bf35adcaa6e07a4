use std::{sync::Arc, time::Duration};

use growbox_common::{ServiceKind, ServiceState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::service::RelayService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No task was tracked; nothing was written.
    NotRunning,
    /// The task had already exited on its own.
    AlreadyExited,
    /// The task observed cancellation within the grace period.
    Cancelled,
    /// The grace period expired and the task was aborted.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub kind: ServiceKind,
    pub state: ServiceState,
    pub spawns: u64,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Slot {
    service: Arc<RelayService>,
    task: Option<RunningTask>,
    spawns: u64,
}

/// Owns at most one background task per service.
pub struct Supervisor {
    slots: Vec<Slot>,
    stop_grace: Duration,
}

impl Supervisor {
    pub fn new(services: Vec<RelayService>, stop_grace: Duration) -> Self {
        let slots = services
            .into_iter()
            .map(|service| Slot {
                service: Arc::new(service),
                task: None,
                spawns: 0,
            })
            .collect();

        Self { slots, stop_grace }
    }

    /// Spawns the service loop unless one is already tracked. Returns
    /// whether a task was spawned.
    pub fn start(&mut self, kind: ServiceKind) -> bool {
        let Some(slot) = self.slot_mut(kind) else {
            return false;
        };
        if slot.task.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let service = Arc::clone(&slot.service);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = service.run(token).await {
                warn!("{} service exited: {err}", service.kind().as_str());
            }
        });

        slot.task = Some(RunningTask { cancel, handle });
        slot.spawns = slot.spawns.saturating_add(1);
        info!("{} service running (spawn #{})", kind.as_str(), slot.spawns);
        true
    }

    pub async fn stop(&mut self, kind: ServiceKind) -> StopOutcome {
        let grace = self.stop_grace;
        let Some(slot) = self.slot_mut(kind) else {
            return StopOutcome::NotRunning;
        };
        let Some(RunningTask { cancel, mut handle }) = slot.task.take() else {
            return StopOutcome::NotRunning;
        };

        let outcome = if handle.is_finished() {
            StopOutcome::AlreadyExited
        } else {
            cancel.cancel();
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => StopOutcome::Cancelled,
                Err(_) => {
                    handle.abort();
                    // The forced writes below must not race a poll still in flight.
                    let _ = (&mut handle).await;
                    StopOutcome::Aborted
                }
            }
        };

        if let Err(err) = slot.service.disable() {
            warn!("{} relay could not be switched off: {err}", kind.as_str());
        }
        if let Err(err) = slot.service.power_off_indicator() {
            warn!("{} indicator could not be cleared: {err}", kind.as_str());
        }

        info!("{} service stopped ({outcome:?})", kind.as_str());
        outcome
    }

    pub async fn stop_all(&mut self) {
        for kind in ServiceKind::ALL {
            self.stop(kind).await;
        }
    }

    pub fn state(&self, kind: ServiceKind) -> ServiceState {
        match self.slot(kind) {
            Some(Slot { task: Some(_), .. }) => ServiceState::Running,
            _ => ServiceState::Stopped,
        }
    }

    pub fn status(&self, kind: ServiceKind) -> ServiceStatus {
        ServiceStatus {
            kind,
            state: self.state(kind),
            spawns: self.slot(kind).map(|slot| slot.spawns).unwrap_or(0),
        }
    }

    fn slot(&self, kind: ServiceKind) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.service.kind() == kind)
    }

    fn slot_mut(&mut self, kind: ServiceKind) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.service.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use growbox_common::Level;

    use super::*;
    use crate::{
        gpio::{GpioBackend, SimulatedGpio},
        sensor::TemperatureProbe,
        service::Policy,
    };

    const RELAY: u8 = 6;
    const INDICATOR: u8 = 7;

    fn supervisor(gpio: &Arc<SimulatedGpio>, celsius: Option<f32>) -> Supervisor {
        supervisor_with(gpio, TemperatureProbe::Fixed(celsius), Duration::from_secs(1))
    }

    fn supervisor_with(
        gpio: &Arc<SimulatedGpio>,
        probe: TemperatureProbe,
        stop_grace: Duration,
    ) -> Supervisor {
        let service = RelayService::new(
            ServiceKind::Temperature,
            gpio.clone(),
            RELAY,
            INDICATOR,
            Policy::Temperature {
                probe,
                threshold_c: 28.0,
            },
            Duration::from_secs(60),
        )
        .unwrap();
        Supervisor::new(vec![service], stop_grace)
    }

    async fn settle<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn double_start_tracks_one_task() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, Some(20.0));

        assert!(supervisor.start(ServiceKind::Temperature));
        assert!(!supervisor.start(ServiceKind::Temperature));

        let status = supervisor.status(ServiceKind::Temperature);
        assert_eq!(status.state, ServiceState::Running);
        assert_eq!(status.spawns, 1);
    }

    #[tokio::test]
    async fn double_stop_is_a_noop() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, Some(20.0));
        supervisor.start(ServiceKind::Temperature);

        assert_eq!(
            supervisor.stop(ServiceKind::Temperature).await,
            StopOutcome::Cancelled
        );
        assert_eq!(supervisor.state(ServiceKind::Temperature), ServiceState::Stopped);

        let writes = gpio.write_count();
        assert_eq!(
            supervisor.stop(ServiceKind::Temperature).await,
            StopOutcome::NotRunning
        );
        assert_eq!(gpio.write_count(), writes);
    }

    #[tokio::test]
    async fn stop_clears_relay_and_indicator() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, Some(20.0));
        supervisor.start(ServiceKind::Temperature);
        settle(|| gpio.level(INDICATOR) == Some(Level::High)).await;

        supervisor.stop(ServiceKind::Temperature).await;

        assert_eq!(gpio.level(RELAY), Some(Level::Low));
        assert_eq!(gpio.level(INDICATOR), Some(Level::Low));
    }

    #[tokio::test]
    async fn stop_forces_indicator_off_even_if_relay_is_low() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, None);
        supervisor.start(ServiceKind::Temperature);
        tokio::task::yield_now().await;
        // Indicator lit out of band while the relay is already off.
        gpio.write(INDICATOR, Level::High).unwrap();

        supervisor.stop(ServiceKind::Temperature).await;

        assert_eq!(gpio.level(INDICATOR), Some(Level::Low));
    }

    #[tokio::test]
    async fn exited_task_is_reconciled_and_restartable() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, Some(20.0));
        gpio.fail_writes(RELAY);

        supervisor.start(ServiceKind::Temperature);
        for _ in 0..100 {
            let finished = supervisor
                .slot(ServiceKind::Temperature)
                .and_then(|slot| slot.task.as_ref())
                .map(|task| task.handle.is_finished())
                .unwrap_or(false);
            if finished {
                break;
            }
            tokio::task::yield_now().await;
        }
        // The dead task stays tracked until the next stop.
        assert_eq!(supervisor.state(ServiceKind::Temperature), ServiceState::Running);

        assert_eq!(
            supervisor.stop(ServiceKind::Temperature).await,
            StopOutcome::AlreadyExited
        );
        assert_eq!(supervisor.state(ServiceKind::Temperature), ServiceState::Stopped);

        assert!(supervisor.start(ServiceKind::Temperature));
        assert_eq!(supervisor.status(ServiceKind::Temperature).spawns, 2);
    }

    #[tokio::test]
    async fn unknown_service_is_ignored() {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut supervisor = supervisor(&gpio, None);

        assert!(!supervisor.start(ServiceKind::Light));
        assert_eq!(supervisor.stop(ServiceKind::Light).await, StopOutcome::NotRunning);
        assert_eq!(supervisor.status(ServiceKind::Light).spawns, 0);
    }

    // Opening a FIFO with no writer blocks the sensor read past the grace
    // period, so the task never reaches its cancellation point.
    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stuck_task_is_aborted_and_outputs_cleared() {
        use std::{ffi::CString, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("w1_slave");
        let c_path = CString::new(fifo.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let gpio = Arc::new(SimulatedGpio::new());
        let probe = TemperatureProbe::Ds18b20 {
            device_glob: fifo.display().to_string(),
        };
        let mut supervisor = supervisor_with(&gpio, probe, Duration::from_millis(50));
        supervisor.start(ServiceKind::Temperature);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Lit out of band so the forced reset is observable.
        gpio.write(INDICATOR, Level::High).unwrap();

        let outcome = supervisor.stop(ServiceKind::Temperature).await;

        assert_eq!(outcome, StopOutcome::Aborted);
        assert_eq!(supervisor.state(ServiceKind::Temperature), ServiceState::Stopped);
        assert_eq!(gpio.level(RELAY), Some(Level::Low));
        assert_eq!(gpio.level(INDICATOR), Some(Level::Low));

        // Release the blocked reader so runtime shutdown does not wait on it.
        drop(std::fs::OpenOptions::new().write(true).open(&fifo).unwrap());
    }
}
