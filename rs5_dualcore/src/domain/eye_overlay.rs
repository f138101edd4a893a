//! EyeOverlayState: the eye-color overlay pixel.

use std::sync::atomic::{AtomicU8, Ordering};

use rs5_common::config::EyeSection;
use rs5_common::eyes::Rgb;
use rs5_common::record::fields::EyeOverlayField;
use rs5_common::record::{Address, ApplyError, Value};

use super::{DomainApplier, RateTimer, element_error, int_in, singleton_row};
use crate::lock::LockDomain;

/// Overlay color, brightness and refresh cadence.
#[derive(Debug)]
pub struct EyeOverlayState {
    lock: LockDomain,
    mode: AtomicU8,
    brightness: AtomicU8,
    red: AtomicU8,
    green: AtomicU8,
    blue: AtomicU8,
    refresh: RateTimer,
}

impl EyeOverlayState {
    pub fn from_config(eyes: &EyeSection) -> Self {
        Self {
            lock: LockDomain::new("eye_overlay"),
            mode: AtomicU8::new(0),
            brightness: AtomicU8::new(u8::MAX),
            red: AtomicU8::new(0),
            green: AtomicU8::new(0),
            blue: AtomicU8::new(0),
            refresh: RateTimer::new(eyes.update_interval_ms),
        }
    }

    #[inline]
    pub fn domain(&self) -> &LockDomain {
        &self.lock
    }

    #[inline]
    pub fn mode(&self) -> u8 {
        self.mode.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn red(&self) -> u8 {
        self.red.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn green(&self) -> u8 {
        self.green.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn blue(&self) -> u8 {
        self.blue.load(Ordering::Relaxed)
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.red(), self.green(), self.blue())
    }

    #[inline]
    pub fn update_rate(&self) -> u32 {
        self.refresh.interval()
    }

    #[inline]
    pub fn last_update(&self) -> u32 {
        self.refresh.last()
    }

    /// True when the overlay is due a refresh; re-arms the timer under the
    /// overlay lock.
    pub fn due(&self, now: u32) -> bool {
        let _guard = self.lock.acquire();
        self.refresh.due(now)
    }

    pub fn set_color(&self, color: Rgb, brightness: u8) {
        let _guard = self.lock.acquire();
        self.red.store(color.red(), Ordering::Relaxed);
        self.green.store(color.green(), Ordering::Relaxed);
        self.blue.store(color.blue(), Ordering::Relaxed);
        self.brightness.store(brightness, Ordering::Relaxed);
    }

    pub fn set_mode(&self, mode: u8) {
        let _guard = self.lock.acquire();
        self.mode.store(mode, Ordering::Relaxed);
    }
}

impl DomainApplier for EyeOverlayState {
    fn domain(&self) -> &LockDomain {
        &self.lock
    }

    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        singleton_row(address)?;
        let field = EyeOverlayField::from_u8(address.element).ok_or_else(|| element_error(address))?;
        let byte = |cell: &AtomicU8| -> Result<(), ApplyError> {
            let v = int_in(address, value, 0, i32::from(u8::MAX))?;
            cell.store(v as u8, Ordering::Relaxed);
            Ok(())
        };
        match field {
            EyeOverlayField::Mode => byte(&self.mode)?,
            EyeOverlayField::Brightness => byte(&self.brightness)?,
            EyeOverlayField::Red => byte(&self.red)?,
            EyeOverlayField::Green => byte(&self.green)?,
            EyeOverlayField::Blue => byte(&self.blue)?,
            EyeOverlayField::LastUpdate => {
                let v = int_in(address, value, 0, i32::MAX)?;
                self.refresh.set_last(v as u32);
            }
            EyeOverlayField::UpdateRate => {
                let v = int_in(address, value, 1, i32::MAX)?;
                self.refresh.set_interval(v as u32);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs5_common::record::ArrayIdent;

    fn overlay() -> EyeOverlayState {
        let s = EyeOverlayState::from_config(&EyeSection::default());
        s.domain().init();
        s
    }

    fn at(field: EyeOverlayField) -> Address {
        Address::new(ArrayIdent::EyeOverlay, field as u8, 0)
    }

    #[test]
    fn blue_accessor_reads_blue() {
        let s = overlay();
        s.set_color(Rgb::new(0x11, 0x22, 0x33), 200);
        assert_eq!(s.red(), 0x11);
        assert_eq!(s.green(), 0x22);
        assert_eq!(s.blue(), 0x33);
        assert_eq!(s.color(), Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(s.brightness(), 200);
    }

    #[test]
    fn default_refresh_cadence() {
        let s = overlay();
        assert_eq!(s.update_rate(), 40);
        assert!(!s.due(40));
        assert!(s.due(41));
        assert_eq!(s.last_update(), 41);
        assert!(!s.due(60));
    }

    #[test]
    fn refresh_waits_for_overlay_lock() {
        let s = overlay();
        let guard = s.domain().acquire();
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| s.due(500));
            std::thread::sleep(std::time::Duration::from_millis(20));
            assert_eq!(s.last_update(), 0);
            drop(guard);
            assert!(waiter.join().unwrap());
        });
        assert_eq!(s.last_update(), 500);
    }

    #[test]
    fn applies_channel_records() {
        let s = overlay();
        s.apply(at(EyeOverlayField::Blue), &Value::Int(0x7f)).unwrap();
        s.apply(at(EyeOverlayField::UpdateRate), &Value::Int(25)).unwrap();
        assert_eq!(s.blue(), 0x7f);
        assert_eq!(s.red(), 0);
        assert_eq!(s.update_rate(), 25);
    }

    #[test]
    fn rejects_out_of_range() {
        let s = overlay();
        assert!(matches!(
            s.apply(at(EyeOverlayField::Red), &Value::Int(256)),
            Err(ApplyError::OutOfDomain { .. })
        ));
        assert!(
            s.apply(Address::new(ArrayIdent::EyeOverlay, 7, 0), &Value::Int(1))
                .is_err()
        );
        assert!(
            s.apply(Address::new(ArrayIdent::EyeOverlay, 2, 1), &Value::Int(1))
                .is_err()
        );
        assert!(
            s.apply(at(EyeOverlayField::UpdateRate), &Value::Int(0))
                .is_err()
        );
    }
}
