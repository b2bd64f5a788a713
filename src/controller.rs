use crate::{
    autotune::{RelayTuner, TunerOutcome},
    buttons::ButtonTracker,
    history::TemperatureHistory,
    menu::{MenuButton, MenuEffect, MenuStateMachine},
    mode,
    pid::{PidController, Tunings},
    safety::SafetyGate,
    traits::{ButtonInput, ConfigStore, HeaterOutput, TemperatureSensor},
    types::{
        BoilerConfig, ControlSnapshot, MenuScreen, TuningStatus, MENU_TICK_MS, SAMPLE_TIME_MS,
    },
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Instant, Timer};
use log::{error, info, warn};
use std::sync::Arc;

/// Snapshots flow to the display renderer over this channel; the loop drops
/// frames rather than wait on a slow flush.
pub type SnapshotChannel = Channel<CriticalSectionRawMutex, ControlSnapshot, 4>;

pub struct BoilerController<S, H, C, K, A, W>
where
    S: TemperatureSensor,
    H: HeaterOutput,
    C: ConfigStore,
    K: ButtonInput,
    A: ButtonInput,
    W: ButtonInput,
{
    sensor: S,
    heater: H,
    store: C,
    key_button: K,
    aux_button: A,
    steam_switch: W,

    config: BoilerConfig,
    pid: PidController,
    tuner: Option<RelayTuner>,
    tune_requested: bool,
    tune_failed: bool,
    menu: MenuStateMachine,
    key_tracker: ButtonTracker,
    aux_tracker: ButtonTracker,
    history: TemperatureHistory,
    safety: SafetyGate,
    persist_pending: bool,

    snapshots: Arc<SnapshotChannel>,
}

impl<S, H, C, K, A, W> BoilerController<S, H, C, K, A, W>
where
    S: TemperatureSensor,
    H: HeaterOutput,
    C: ConfigStore,
    K: ButtonInput,
    A: ButtonInput,
    W: ButtonInput,
{
    pub fn new(
        sensor: S,
        heater: H,
        mut store: C,
        key_button: K,
        aux_button: A,
        steam_switch: W,
        snapshots: Arc<SnapshotChannel>,
        now: Instant,
    ) -> Self {
        let config = match store.load() {
            Ok(config) if config.is_valid() => config,
            Ok(_) => {
                warn!("stored configuration invalid, using defaults");
                BoilerConfig::default()
            }
            Err(e) => {
                warn!("configuration load failed ({}), using defaults", e);
                BoilerConfig::default()
            }
        };
        // write back unconditionally so a fresh device has a valid record
        if let Err(e) = store.save(&config) {
            warn!("initial configuration save failed: {}", e);
        }
        info!(
            "starting with brew={:.1} °C steam={:.1} °C kp={} ki={} kd={}",
            config.brew_temp, config.steam_temp, config.kp, config.ki, config.kd
        );

        let pid = PidController::new(Tunings {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
        });

        Self {
            sensor,
            heater,
            store,
            key_button,
            aux_button,
            steam_switch,
            config,
            pid,
            tuner: None,
            tune_requested: false,
            tune_failed: false,
            menu: MenuStateMachine::new(now),
            key_tracker: ButtonTracker::new(),
            aux_tracker: ButtonTracker::new(),
            history: TemperatureHistory::new(),
            safety: SafetyGate::new(),
            persist_pending: false,
            snapshots,
        }
    }

    /// One full pass of the control loop. Everything time-based compares
    /// against the `now` passed in, so the sequence is fully deterministic.
    pub fn tick(&mut self, now: Instant) {
        // button gestures first, so edits apply before this tick regulates
        let key_level = self.key_button.is_pressed();
        if let Some(press) = self.key_tracker.poll(key_level, now) {
            let effect = self
                .menu
                .handle_press(MenuButton::Primary, press, &mut self.config, now);
            self.apply_menu_effect(effect);
        }
        let aux_level = self.aux_button.is_pressed();
        if let Some(press) = self.aux_tracker.poll(aux_level, now) {
            let effect = self
                .menu
                .handle_press(MenuButton::Secondary, press, &mut self.config, now);
            self.apply_menu_effect(effect);
        }
        self.menu.tick(now);

        let measured = match self.sensor.read() {
            Ok(value) => value,
            Err(e) => {
                warn!("sensor read failed: {}", e);
                f32::NAN
            }
        };
        self.history.push(measured);

        let (operating_mode, setpoint) =
            mode::resolve(self.steam_switch.is_pressed(), &self.config);

        let duty = self.regulate(measured, setpoint, now);
        let duty = self.safety.apply(measured, setpoint, duty);
        if let Err(e) = self.heater.set_duty(duty) {
            // keep looping; the safety gate re-forces the duty every tick
            error!("heater command failed: {}", e);
        }

        let snapshot = ControlSnapshot {
            mode: operating_mode,
            setpoint,
            measured,
            duty,
            config: self.config.clone(),
            screen: self.menu.screen(),
            tuning: self.tuning_status(),
            trend: self.history.snapshot(),
        };
        if self.snapshots.try_send(snapshot).is_err() {
            // renderer still busy; this frame is stale next tick anyway
            log::debug!("snapshot dropped - display channel full");
        }

        if self.persist_pending {
            match self.store.save(&self.config) {
                Ok(()) => self.persist_pending = false,
                Err(e) => warn!("configuration save failed: {}", e),
            }
        }
    }

    /// Duty for this tick: the tuner has authority while it is active, the
    /// PID otherwise. A non-finite measurement bypasses both so their state
    /// is not poisoned; the safety gate will zero the output anyway.
    fn regulate(&mut self, measured: f32, setpoint: f32, now: Instant) -> u8 {
        if !measured.is_finite() {
            return 0;
        }

        if self.tune_requested && self.tuner.is_none() {
            info!("tuning: relay procedure started");
            self.tuner = Some(RelayTuner::new(self.pid.last_output(), measured, now));
            self.tune_requested = false;
            self.tune_failed = false;
        }

        if let Some(tuner) = self.tuner.as_mut() {
            match tuner.step(measured, now) {
                TunerOutcome::Pending(duty) => duty,
                TunerOutcome::Done(tunings) => {
                    info!(
                        "tuning: done, kp={:.3} ki={:.4} kd={:.3}",
                        tunings.kp, tunings.ki, tunings.kd
                    );
                    self.pid.set_tunings(tunings);
                    self.tuner = None;
                    self.pid.compute(measured, setpoint, now)
                }
                TunerOutcome::Failed(e) => {
                    error!("tuning: failed ({}), keeping previous gains", e);
                    self.tuner = None;
                    self.tune_failed = true;
                    self.menu.force_off();
                    self.pid.compute(measured, setpoint, now)
                }
            }
        } else {
            self.pid.compute(measured, setpoint, now)
        }
    }

    fn apply_menu_effect(&mut self, effect: MenuEffect) {
        if effect.tune_cancelled {
            if self.tuner.take().is_some() {
                info!("tuning: cancelled from menu");
            }
            self.tune_requested = false;
        }
        if effect.tune_requested {
            self.tune_requested = true;
            self.tune_failed = false;
        }
        if effect.persist {
            self.persist_pending = true;
        }
    }

    fn tuning_status(&self) -> TuningStatus {
        if self.tuner.is_some() || self.tune_requested {
            TuningStatus::Active
        } else if self.tune_failed {
            TuningStatus::Failed
        } else {
            TuningStatus::Inactive
        }
    }

    /// Deadline of the next tick: fast while the operator is editing, the
    /// regulator's own pace otherwise.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        let period = match self.menu.screen() {
            MenuScreen::Off | MenuScreen::Tune => SAMPLE_TIME_MS,
            MenuScreen::EditBrewTemp | MenuScreen::EditSteamTemp => MENU_TICK_MS,
        };
        now + Duration::from_millis(period)
    }

    pub async fn run(&mut self) -> ! {
        info!("control loop running");
        loop {
            let now = Instant::now();
            self.tick(now);
            Timer::at(self.next_deadline(now)).await;
        }
    }
}
