//! On-device configuration menu, driven by two momentary buttons.
//!
//! The primary button cycles the screen on a long press and edits/arms on a
//! short press; the secondary button only ever decrements the value on the
//! active edit screen. All transitions live in one match over
//! (screen, button, hold duration) so every threshold appears exactly once.

use crate::buttons::ButtonPress;
use crate::types::{
    BoilerConfig, MenuScreen, BREW_DECREMENT_LIMIT_MS, LONG_PRESS_MS, MENU_TIMEOUT_MS,
    SETPOINT_STEP_C,
};
use embassy_time::{Duration, Instant};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    Primary,
    Secondary,
}

/// What the control loop must do after a press was handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuEffect {
    /// Screen or configuration changed; write the config through now.
    pub persist: bool,
    pub tune_requested: bool,
    pub tune_cancelled: bool,
}

pub struct MenuStateMachine {
    screen: MenuScreen,
    last_activity: Instant,
}

impl MenuStateMachine {
    pub fn new(now: Instant) -> Self {
        Self {
            screen: MenuScreen::Off,
            last_activity: now,
        }
    }

    pub fn screen(&self) -> MenuScreen {
        self.screen
    }

    /// Apply one completed button press. Any release counts as activity for
    /// the inactivity timer, even when it has no other effect.
    pub fn handle_press(
        &mut self,
        button: MenuButton,
        press: ButtonPress,
        config: &mut BoilerConfig,
        now: Instant,
    ) -> MenuEffect {
        self.last_activity = now;
        let held = press.held;
        let long = held >= Duration::from_millis(LONG_PRESS_MS);
        let mut effect = MenuEffect::default();

        match (self.screen, button) {
            (screen, MenuButton::Primary) if long => {
                let next = Self::next_screen(screen);
                info!("menu: {:?} -> {:?}", screen, next);
                if screen == MenuScreen::Tune {
                    // leaving the tune screen abandons any tuning in flight
                    effect.tune_cancelled = true;
                }
                self.screen = next;
                effect.persist = true;
            }
            (MenuScreen::EditBrewTemp, MenuButton::Primary) => {
                config.brew_temp += SETPOINT_STEP_C;
                effect.persist = true;
            }
            (MenuScreen::EditSteamTemp, MenuButton::Primary) => {
                config.steam_temp += SETPOINT_STEP_C;
                effect.persist = true;
            }
            (MenuScreen::Tune, MenuButton::Primary) => {
                info!("menu: tuning requested");
                effect.tune_requested = true;
                effect.persist = true;
            }
            // The decrement hold limits differ between the two edit screens;
            // inherited behavior, kept as observed.
            (MenuScreen::EditBrewTemp, MenuButton::Secondary)
                if held < Duration::from_millis(BREW_DECREMENT_LIMIT_MS) =>
            {
                config.brew_temp -= SETPOINT_STEP_C;
                effect.persist = true;
            }
            (MenuScreen::EditSteamTemp, MenuButton::Secondary)
                if held < Duration::from_millis(LONG_PRESS_MS) =>
            {
                config.steam_temp -= SETPOINT_STEP_C;
                effect.persist = true;
            }
            _ => {
                debug!(
                    "menu: ignored {:?} press ({} ms) on {:?}",
                    button,
                    held.as_millis(),
                    self.screen
                );
            }
        }
        effect
    }

    /// Revert to the idle screen after the inactivity timeout. Tuning is NOT
    /// cancelled here; only the menu navigation times out.
    pub fn tick(&mut self, now: Instant) {
        if self.screen != MenuScreen::Off
            && now.duration_since(self.last_activity) >= Duration::from_millis(MENU_TIMEOUT_MS)
        {
            info!("menu: inactivity timeout, back to {:?}", MenuScreen::Off);
            self.screen = MenuScreen::Off;
        }
    }

    /// Drop straight back to the idle screen (tuning abort path).
    pub fn force_off(&mut self) {
        if self.screen != MenuScreen::Off {
            info!("menu: forced back to {:?}", MenuScreen::Off);
            self.screen = MenuScreen::Off;
        }
    }

    fn next_screen(screen: MenuScreen) -> MenuScreen {
        match screen {
            MenuScreen::Off => MenuScreen::EditBrewTemp,
            MenuScreen::EditBrewTemp => MenuScreen::EditSteamTemp,
            MenuScreen::EditSteamTemp => MenuScreen::Tune,
            MenuScreen::Tune => MenuScreen::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn press(ms: u64) -> ButtonPress {
        ButtonPress {
            held: Duration::from_millis(ms),
        }
    }

    fn long() -> ButtonPress {
        press(LONG_PRESS_MS)
    }

    #[test]
    fn test_cycle_closes_after_four_long_presses() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        let expected = [
            MenuScreen::EditBrewTemp,
            MenuScreen::EditSteamTemp,
            MenuScreen::Tune,
            MenuScreen::Off,
        ];
        for (i, &screen) in expected.iter().enumerate() {
            menu.handle_press(MenuButton::Primary, long(), &mut config, at(i as u64 * 100));
            assert_eq!(menu.screen(), screen);
        }
    }

    #[test]
    fn test_cycle_closes_with_intervening_short_presses() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        for i in 0..4 {
            menu.handle_press(MenuButton::Primary, press(300), &mut config, at(i * 50));
            menu.handle_press(MenuButton::Secondary, press(300), &mut config, at(i * 50 + 10));
            menu.handle_press(MenuButton::Primary, long(), &mut config, at(i * 50 + 20));
        }
        assert_eq!(menu.screen(), MenuScreen::Off);
    }

    #[test]
    fn test_short_presses_edit_the_active_setpoint() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        menu.handle_press(MenuButton::Primary, long(), &mut config, at(0));
        let effect = menu.handle_press(MenuButton::Primary, press(200), &mut config, at(100));
        assert_eq!(config.brew_temp, 61.0);
        assert!(effect.persist);

        let effect = menu.handle_press(MenuButton::Secondary, press(200), &mut config, at(200));
        assert_eq!(config.brew_temp, 60.0);
        assert!(effect.persist);
        // steam setpoint untouched throughout
        assert_eq!(config.steam_temp, 120.0);
    }

    #[test]
    fn test_decrement_hold_limits_differ_per_screen() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        // a 2.5 s secondary press decrements on the brew screen...
        menu.handle_press(MenuButton::Primary, long(), &mut config, at(0));
        menu.handle_press(MenuButton::Secondary, press(2500), &mut config, at(100));
        assert_eq!(config.brew_temp, 59.0);

        // ...but is ignored on the steam screen
        menu.handle_press(MenuButton::Primary, long(), &mut config, at(200));
        assert_eq!(menu.screen(), MenuScreen::EditSteamTemp);
        let effect = menu.handle_press(MenuButton::Secondary, press(2500), &mut config, at(300));
        assert_eq!(config.steam_temp, 120.0);
        assert!(!effect.persist);
    }

    #[test]
    fn test_short_press_in_tune_requests_tuning() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        for i in 0..3 {
            menu.handle_press(MenuButton::Primary, long(), &mut config, at(i * 100));
        }
        assert_eq!(menu.screen(), MenuScreen::Tune);

        let effect = menu.handle_press(MenuButton::Primary, press(200), &mut config, at(400));
        assert!(effect.tune_requested);
        assert_eq!(menu.screen(), MenuScreen::Tune);
    }

    #[test]
    fn test_leaving_tune_cancels_tuning() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        for i in 0..3 {
            menu.handle_press(MenuButton::Primary, long(), &mut config, at(i * 100));
        }
        let effect = menu.handle_press(MenuButton::Primary, long(), &mut config, at(400));
        assert!(effect.tune_cancelled);
        assert_eq!(menu.screen(), MenuScreen::Off);
    }

    #[test]
    fn test_inactivity_reverts_to_off() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        menu.handle_press(MenuButton::Primary, long(), &mut config, at(1000));
        menu.tick(at(1000 + MENU_TIMEOUT_MS - 1));
        assert_eq!(menu.screen(), MenuScreen::EditBrewTemp);
        menu.tick(at(1000 + MENU_TIMEOUT_MS));
        assert_eq!(menu.screen(), MenuScreen::Off);
    }

    #[test]
    fn test_any_release_resets_inactivity_timer() {
        let mut menu = MenuStateMachine::new(at(0));
        let mut config = BoilerConfig::default();

        menu.handle_press(MenuButton::Primary, long(), &mut config, at(0));
        menu.handle_press(MenuButton::Primary, long(), &mut config, at(100));
        assert_eq!(menu.screen(), MenuScreen::EditSteamTemp);
        // an otherwise ignored secondary release still counts as activity
        let effect = menu.handle_press(MenuButton::Secondary, press(2500), &mut config, at(4000));
        assert!(!effect.persist);
        menu.tick(at(4000 + MENU_TIMEOUT_MS - 1));
        assert_eq!(menu.screen(), MenuScreen::EditSteamTemp);
    }
}
