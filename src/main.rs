// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::cell::RefCell;
    use core::fmt::Write as _;

    use cortex_m::peripheral::NVIC;
    use cortex_m_rt::entry;
    #[cfg(feature = "defmt")]
    use defmt_rtt as _;
    use panic_halt as _;

    use hal::{
        i2c::{BlockingI2c, Mode},
        pac::{self, interrupt},
        prelude::*,
        serial::{Config, Serial},
    };
    use stm32f7xx_hal as hal;

    use nalgebra::Vector3;
    use quadfc::{
        console::Console,
        drivers::SensorSet,
        flight::{self, FlightConfig, FlightController, Tuning},
        fusion::MahonyAhrs,
        hw::{rc_capture, BoardPins, EscPwm, RcCapture, TimerClock, UsartTerminal},
        indicator::{Led, LedBlinker},
        input::{Channel, InputControl, InputSwitch},
        motors::{MotorMixer, PwmOutput},
        sensors::Sensor,
        StartupError,
    };

    const PWM_FREQ_HZ: u32 = 300;
    /// ESC pulse widths in ms at minimum thrust, calibrated per motor
    const MIN_PULSE_MS: [f32; 4] = [1.312, 1.297, 1.355, 1.305];
    /// Full thrust is this much longer than minimum
    const PULSE_RANGE_MS: f32 = 0.8;

    /// Receiver pin order of yaw, pitch, roll and throttle; the mode switch is on pin 4
    const RC_PINS: [usize; 4] = [0, 1, 2, 3];
    const RC_MODE_SWITCH_PIN: usize = 4;

    #[entry]
    fn main() -> ! {
        let Some(mut dp) = pac::Peripherals::take() else {
            panic!("peripherals taken twice");
        };

        // Timers for the clock and the ESCs
        dp.RCC
            .apb1enr
            .modify(|_, w| w.tim2en().set_bit().tim4en().set_bit());

        // Clocks
        let rcc = dp.RCC.constrain();
        let clocks = rcc.cfgr.sysclk(216.MHz()).freeze();
        let mut apb1 = rcc.apb1;
        let mut apb2 = rcc.apb2;
        let timer_clk = clocks.timclk1().raw();

        let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC, dp.GPIOD);
        let clock = TimerClock::tim2(dp.TIM2, timer_clk);

        let mut red = Led::active_low(pins.leds.red);
        let mut indicator = LedBlinker::new(Led::active_low(pins.leds.green));

        // USART1 (DBG)
        let usart_cfg = Config {
            baud_rate: 115_200.bps(),
            ..Default::default()
        };
        let serial = Serial::new(dp.USART1, (pins.usart1.tx, pins.usart1.rx), &clocks, usart_cfg);
        let mut terminal = UsartTerminal::new(serial);
        let mut console = Console::new(&mut terminal);

        // I2C1 sensor bus
        let i2c = BlockingI2c::i2c1(
            dp.I2C1,
            (pins.i2c1.scl, pins.i2c1.sda),
            Mode::fast(400.kHz()),
            &clocks,
            &mut apb1,
            50_000,
        );
        let bus = RefCell::new(i2c);

        let tuning = Tuning::default();

        let startup = SensorSet::start(&bus, &clock, tuning.debug).and_then(|sensors| {
            let pwm = EscPwm::tim4(dp.TIM4, timer_clk, PWM_FREQ_HZ);
            if pwm.frequency() != PWM_FREQ_HZ {
                return Err(StartupError::PwmFrequency(PWM_FREQ_HZ));
            }
            Ok((sensors, pwm))
        });
        let (mut sensors, pwm) = match startup {
            Ok(s) => s,
            Err(e) => {
                let _ = write!(console, "Error: {}\r\n", e);
                red.on();
                loop {
                    cortex_m::asm::wfi();
                }
            }
        };

        // Motors
        let mhz = PWM_FREQ_HZ as f32 / 1000.0;
        let min_thrust = MIN_PULSE_MS.map(|ms| ms * mhz);
        let max_thrust = MIN_PULSE_MS.map(|ms| (ms + PULSE_RANGE_MS) * mhz);
        let mut motors = MotorMixer::new(pwm, [0, 1, 2, 3], min_thrust, max_thrust);

        // RC receiver
        rc_capture::start(pins.rc, &mut dp.SYSCFG, &mut dp.EXTI, &mut apb2);
        unsafe {
            NVIC::unmask(pac::Interrupt::EXTI9_5);
            NVIC::unmask(pac::Interrupt::EXTI15_10);
        }
        let rc = RcCapture;
        let mut input =
            InputControl::pwm(&rc, RC_PINS).with_channel(Channel::Aux1, RC_MODE_SWITCH_PIN);
        // 1-2 ms pulses to [-1, 1]
        input.set_offset_all(-1.5);
        input.set_scaling_all(2.0);
        flight::configure_default_converters(&mut input);

        let mut fusion = MahonyAhrs::default();

        let mut controller = FlightController::new(FlightConfig {
            clock: &clock,
            gyro: sensors
                .gyro
                .as_mut()
                .map(|s| s as &mut dyn Sensor<Vector3<f32>>),
            accel: sensors
                .accel
                .as_mut()
                .map(|s| s as &mut dyn Sensor<Vector3<f32>>),
            compass: sensors
                .compass
                .as_mut()
                .map(|s| s as &mut dyn Sensor<Vector3<f32>>),
            barometer: sensors.barometer.as_mut().map(|s| s as &mut dyn Sensor<f32>),
            fusion: &mut fusion,
            motors: &mut motors,
            input,
            mode_switch: InputSwitch::new(Channel::Aux1, 2),
            pids: flight::default_pids(),
            indicator: &mut indicator,
            console: Some(console),
            tuning,
        });

        controller.run()
    }

    #[interrupt]
    fn EXTI9_5() {
        rc_capture::service_exti();
    }

    #[interrupt]
    fn EXTI15_10() {
        rc_capture::service_exti();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("quadfc is firmware for thumbv7em-none-eabihf; run `cargo test --lib` on the host");
}
