//! SH1106 OLED rendering of the per-tick control snapshot.
//! Using embedded-graphics for clean, efficient rendering.

use crate::types::{ControlSnapshot, MenuScreen, TuningStatus};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, ascii::FONT_9X15, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use esp_idf_svc::hal::{
    gpio::{InputPin, OutputPin},
    i2c::{I2cConfig, I2cDriver},
    peripheral::Peripheral,
    prelude::*,
};
use log::{debug, info};
use sh1106::Builder;

// trend graph region, top-right corner
const GRAPH_LEFT: i32 = 84;
const GRAPH_TOP: i32 = 0;
const GRAPH_WIDTH: i32 = 44;
const GRAPH_HEIGHT: i32 = 28;
/// Vertical scale of the trend graph in °C.
const GRAPH_RANGE_C: f32 = 200.0;

pub struct DisplayController<I2C>
where
    I2C: embedded_hal::blocking::i2c::Write + embedded_hal::blocking::i2c::WriteRead,
{
    display: sh1106::mode::GraphicsMode<sh1106::interface::I2cInterface<I2C>>,
}

impl<I2C> DisplayController<I2C>
where
    I2C: embedded_hal::blocking::i2c::Write + embedded_hal::blocking::i2c::WriteRead,
    <I2C as embedded_hal::blocking::i2c::Write>::Error: std::fmt::Debug,
    <I2C as embedded_hal::blocking::i2c::WriteRead>::Error: std::fmt::Debug,
{
    pub fn new(i2c: I2C) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing SH1106 OLED display");

        let mut display: sh1106::mode::GraphicsMode<_> = Builder::new().connect_i2c(i2c).into();

        display
            .init()
            .map_err(|e| format!("Display init failed: {:?}", e))?;
        display.clear();
        display
            .flush()
            .map_err(|e| format!("Display flush failed: {:?}", e))?;

        Ok(Self { display })
    }

    pub fn render(&mut self, snapshot: &ControlSnapshot) -> Result<(), Box<dyn std::error::Error>> {
        debug!("rendering snapshot: {:.1} °C duty {}", snapshot.measured, snapshot.duty);

        self.display.clear();

        let title_style = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);
        let text_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);

        // measured temperature, large; "--" on a faulted sensor
        let temp_text = if snapshot.measured.is_finite() {
            format!("{:.1}C", snapshot.measured)
        } else {
            "--.-C".to_string()
        };
        Text::with_baseline(&temp_text, Point::new(0, 0), title_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        // mode and the setpoint it resolves to
        let mode_text = format!("{} {:.0}C", snapshot.mode.label(), snapshot.setpoint);
        Text::with_baseline(&mode_text, Point::new(0, 16), text_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        // both setpoints, with a marker on the one being edited
        let setpoints_text = format!(
            "{}BW{:.0} {}ST{:.0}",
            edit_marker(snapshot.screen, MenuScreen::EditBrewTemp),
            snapshot.config.brew_temp,
            edit_marker(snapshot.screen, MenuScreen::EditSteamTemp),
            snapshot.config.steam_temp,
        );
        Text::with_baseline(&setpoints_text, Point::new(0, 30), text_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        let gains_text = format!(
            "P{:.1} I{:.3} D{:.1}",
            snapshot.config.kp, snapshot.config.ki, snapshot.config.kd
        );
        Text::with_baseline(&gains_text, Point::new(0, 42), text_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        let status_text = format!("PWM {:3} {}", snapshot.duty, status_label(snapshot));
        Text::with_baseline(&status_text, Point::new(0, 54), text_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        self.draw_trend(snapshot, stroke)?;

        self.display
            .flush()
            .map_err(|e| format!("Display flush failed: {:?}", e))?;

        Ok(())
    }

    /// Recent-temperature graph: frame, mid-scale gridline, one segment per
    /// history step. Zero-fill and fault samples are skipped, like the
    /// machine's original readout.
    fn draw_trend(
        &mut self,
        snapshot: &ControlSnapshot,
        stroke: PrimitiveStyle<BinaryColor>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Rectangle::new(
            Point::new(GRAPH_LEFT, GRAPH_TOP),
            Size::new(GRAPH_WIDTH as u32, GRAPH_HEIGHT as u32),
        )
        .into_styled(stroke)
        .draw(&mut self.display)
        .map_err(|e| format!("Display draw error: {:?}", e))?;

        let mid_y = GRAPH_TOP + GRAPH_HEIGHT / 2;
        Line::new(
            Point::new(GRAPH_LEFT, mid_y),
            Point::new(GRAPH_LEFT + GRAPH_WIDTH - 1, mid_y),
        )
        .into_styled(stroke)
        .draw(&mut self.display)
        .map_err(|e| format!("Display draw error: {:?}", e))?;

        let trend = &snapshot.trend;
        let step_x = GRAPH_WIDTH / (trend.len() as i32 - 1);
        for (i, window) in trend.windows(2).enumerate() {
            let (a, b) = (window[0], window[1]);
            if !(a.is_finite() && a > 0.0 && b.is_finite() && b > 0.0) {
                continue;
            }
            let x = GRAPH_LEFT + i as i32 * step_x;
            Line::new(
                Point::new(x, scale_temperature(a)),
                Point::new(x + step_x, scale_temperature(b)),
            )
            .into_styled(stroke)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;
        }
        Ok(())
    }

    pub fn show_boot_screen(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.display.clear();

        let title_style = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);
        let text_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        Text::with_baseline("Ember", Point::new(10, 20), title_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        Text::with_baseline("Heating up...", Point::new(20, 40), text_style, Baseline::Top)
            .draw(&mut self.display)
            .map_err(|e| format!("Display draw error: {:?}", e))?;

        self.display
            .flush()
            .map_err(|e| format!("Display flush failed: {:?}", e))?;

        Ok(())
    }
}

fn edit_marker(active: MenuScreen, screen: MenuScreen) -> char {
    if active == screen {
        '>'
    } else {
        ' '
    }
}

fn status_label(snapshot: &ControlSnapshot) -> &'static str {
    match snapshot.tuning {
        TuningStatus::Active => "TUNING",
        TuningStatus::Failed => "TUNE FAIL",
        TuningStatus::Inactive => match snapshot.screen {
            MenuScreen::Tune => "TUNE?",
            _ => "",
        },
    }
}

fn scale_temperature(celsius: f32) -> i32 {
    let clamped = celsius.clamp(0.0, GRAPH_RANGE_C);
    let span = (GRAPH_HEIGHT - 2) as f32;
    GRAPH_TOP + GRAPH_HEIGHT - 1 - (clamped / GRAPH_RANGE_C * span) as i32
}

// Helper function to create display controller from ESP32 I2C pins
pub fn create_display_controller(
    sda: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
    scl: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
) -> Result<DisplayController<I2cDriver<'static>>, Box<dyn std::error::Error>> {
    info!("Setting up I2C for SH1106 display");

    let config = I2cConfig::new().baudrate(400.kHz().into());
    let i2c = I2cDriver::new(
        unsafe { esp_idf_svc::hal::i2c::I2C0::new() },
        sda,
        scl,
        &config,
    )?;

    DisplayController::new(i2c)
}
