//! BME280 environment sensor, driven through the vendor crate.
//!
//! The vendor driver wants exclusive ownership of an
//! [`embedded_hal::i2c::I2c`] implementation, while the station shares one
//! physical bus among the RTC, the expander and this sensor.
//! [`BusDevice`] bridges the two: a short-lived view over the transport
//! that claims the command gate for the duration of each vendor
//! transaction, so a multi-operation sequence (pointer write + burst
//! read) can never interleave with another device's traffic.
//!
//! The driver is rebuilt per sample. Construction and `init_with_config`
//! re-read the factory calibration block each time, which at the sampling
//! cadence here is a few dozen bytes every couple of seconds and keeps
//! the sensor handle from pinning a borrow of the bus across poll passes.

use bme280::i2c::BME280;
use bme280::{Configuration, IIRFilter, Oversampling};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorType, I2c, Operation, SevenBitAddress};
use log::warn;

use crate::bus::{BusController, I2cMaster};
use crate::error::{BusFault, Result, SensorFault};
use crate::timebase::elapsed;

impl i2c::Error for BusFault {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            BusFault::AddressNack => {
                i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
            }
            BusFault::DataNack => i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Data),
            BusFault::WriteCollision => i2c::ErrorKind::ArbitrationLoss,
            BusFault::Busy | BusFault::Timeout => i2c::ErrorKind::Other,
        }
    }
}

/// Per-transaction view of the shared transport for vendor drivers.
pub struct BusDevice<'a, C: BusController> {
    bus: &'a mut I2cMaster<C>,
}

impl<'a, C: BusController> BusDevice<'a, C> {
    pub fn new(bus: &'a mut I2cMaster<C>) -> Self {
        Self { bus }
    }
}

impl<C: BusController> ErrorType for BusDevice<'_, C> {
    type Error = BusFault;
}

impl<C: BusController> I2c for BusDevice<'_, C> {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> core::result::Result<(), BusFault> {
        if !self.bus.claim() {
            return Err(BusFault::Busy);
        }
        let result = (|| {
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => self.bus.transmit(address, bytes)?,
                    Operation::Read(buf) => self.bus.receive(address, buf)?,
                }
            }
            Ok(())
        })();
        self.bus.release();
        result
    }
}

/// One converted measurement set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReading {
    pub temperature_c: f32,
    pub pressure_pa: f32,
    pub humidity_pct: f32,
}

/// Periodic BME280 sampler.
pub struct EnvironmentSensor {
    sample_ms: u32,
    last_sample_ms: u32,
    has_sampled: bool,
    last: Option<EnvironmentReading>,
}

impl EnvironmentSensor {
    pub fn new(sample_ms: u32) -> Self {
        Self {
            sample_ms: sample_ms.max(1),
            last_sample_ms: 0,
            has_sampled: false,
            last: None,
        }
    }

    /// Most recent good reading, if any.
    pub fn last_reading(&self) -> Option<EnvironmentReading> {
        self.last
    }

    /// Take a reading if the sampling interval has elapsed.
    ///
    /// Returns `Ok(None)` when not yet due. A failed sample still counts
    /// against the interval so a wedged sensor cannot monopolise the bus.
    pub fn poll<C: BusController, D: DelayNs>(
        &mut self,
        bus: &mut I2cMaster<C>,
        delay: &mut D,
        now_ms: u32,
    ) -> Result<Option<EnvironmentReading>> {
        let due = !self.has_sampled || elapsed(now_ms, self.last_sample_ms) >= self.sample_ms;
        if !due {
            return Ok(None);
        }
        self.last_sample_ms = now_ms;
        self.has_sampled = true;
        self.sample(bus, delay).map(Some)
    }

    /// One full vendor-driver cycle: construct, configure, measure.
    pub fn sample<C: BusController, D: DelayNs>(
        &mut self,
        bus: &mut I2cMaster<C>,
        delay: &mut D,
    ) -> Result<EnvironmentReading> {
        let mut device = BME280::new_primary(BusDevice::new(bus));
        let config = Configuration::default()
            .with_humidity_oversampling(Oversampling::Oversampling1X)
            .with_pressure_oversampling(Oversampling::Oversampling16X)
            .with_temperature_oversampling(Oversampling::Oversampling2X)
            .with_iir_filter(IIRFilter::Coefficient16);
        device.init_with_config(delay, config).map_err(|e| {
            warn!("bme280 init failed: {e:?}");
            SensorFault::VendorInit
        })?;
        let m = device.measure(delay).map_err(|e| {
            warn!("bme280 measure failed: {e:?}");
            SensorFault::VendorMeasure
        })?;
        let reading = EnvironmentReading {
            temperature_c: m.temperature,
            pressure_pa: m.pressure,
            humidity_pct: m.humidity,
        };
        self.last = Some(reading);
        Ok(reading)
    }
}
