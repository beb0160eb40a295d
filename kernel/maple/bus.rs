/*
 * dckernel is a kernel core for the SH-4 based Dreamcast console
 * Copyright (C) 2025  MD Gaziur Rahman Noor
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use super::device::Device;
use super::driver::{same_driver, Driver};
use super::error::{BusError, RegisterError};
use super::frame::{Frame, FrameState};
use super::proto::{Command, DeviceInfo, Functions, Response, PORT_COUNT, UNIT_COUNT};
use super::transport::Transport;
use crate::arch::cpu::Cpu;
use alloc::vec::Vec;
use core::ops::ControlFlow;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use crossbeam_queue::ArrayQueue;
use spin::Mutex;

pub const MAX_DRIVERS: usize = 16;
/// Every device frame plus the enumeration frame can be queued at once.
pub const QUEUE_DEPTH: usize = PORT_COUNT * UNIT_COUNT + 1;
/// How long a blocking caller idles before giving up on a frame.
pub const IDLE_LIMIT: usize = 256;

/// Attach/detach notification.
pub type Notify = fn(device: &Device);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameRef {
    Device { port: u8, unit: u8 },
    Detect,
}

#[derive(Clone, Copy)]
struct Notification {
    functions: Functions,
    callback: Notify,
}

/// Device enumeration state: one probe frame that walks the slots.
struct Detector {
    frame: Frame,
    next: usize,
}

pub struct Maple {
    transport: &'static dyn Transport,
    devices: Vec<Mutex<Device>>,
    detector: Mutex<Detector>,
    /// Sub-units reported present by each port's main unit.
    subunits: [AtomicU8; PORT_COUNT],
    drivers: Mutex<Vec<&'static dyn Driver>>,
    queue: ArrayQueue<FrameRef>,
    in_flight: ArrayQueue<FrameRef>,
    busy: AtomicBool,
    on_attach: Mutex<Option<Notification>>,
    on_detach: Mutex<Option<Notification>>,
    ticks: AtomicU32,
    busy_ticks: AtomicU32,
}

impl Maple {
    pub fn new(transport: &'static dyn Transport) -> Self {
        let mut devices = Vec::with_capacity(PORT_COUNT * UNIT_COUNT);
        for port in 0..PORT_COUNT as u8 {
            for unit in 0..UNIT_COUNT as u8 {
                devices.push(Mutex::new(Device::new(port, unit)));
            }
        }

        Self {
            transport,
            devices,
            detector: Mutex::new(Detector {
                frame: Frame::new(0, 0),
                next: 0,
            }),
            subunits: [const { AtomicU8::new(0) }; PORT_COUNT],
            drivers: Mutex::new(Vec::with_capacity(MAX_DRIVERS)),
            queue: ArrayQueue::new(QUEUE_DEPTH),
            in_flight: ArrayQueue::new(QUEUE_DEPTH),
            busy: AtomicBool::new(false),
            on_attach: Mutex::new(None),
            on_detach: Mutex::new(None),
            ticks: AtomicU32::new(0),
            busy_ticks: AtomicU32::new(0),
        }
    }

    pub fn transport(&self) -> &'static dyn Transport {
        self.transport
    }

    fn slot(&self, port: u8, unit: u8) -> Option<&Mutex<Device>> {
        if usize::from(port) >= PORT_COUNT || usize::from(unit) >= UNIT_COUNT {
            return None;
        }

        self.devices.get(usize::from(port) * UNIT_COUNT + usize::from(unit))
    }

    /// Runs `f` on the device at `port`/`unit` with interrupts masked.
    pub fn with_device<R>(&self, port: u8, unit: u8, f: impl FnOnce(&mut Device) -> R) -> Option<R> {
        let slot = self.slot(port, unit)?;
        Some(Cpu::without_interrupts(|| f(&mut slot.lock())))
    }

    pub fn register_driver(&self, driver: &'static dyn Driver) -> Result<(), RegisterError> {
        Cpu::without_interrupts(|| {
            let mut drivers = self.drivers.lock();
            if drivers.iter().any(|d| same_driver(*d, driver)) {
                return Err(RegisterError::AlreadyRegistered);
            }
            if let Some(other) = drivers.iter().find(|d| d.functions().intersects(driver.functions())) {
                return Err(RegisterError::Overlap {
                    existing: other.name(),
                    functions: other.functions() & driver.functions(),
                });
            }
            if drivers.len() >= MAX_DRIVERS {
                return Err(RegisterError::TooManyDrivers);
            }
            drivers.push(driver);

            Ok(())
        })?;

        info!("maple: registered {}", driver.name());
        Ok(())
    }

    /// Removes `driver` and detaches it from every device it was bound to.
    /// Unknown drivers are ignored.
    pub fn unregister_driver(&self, driver: &'static dyn Driver) {
        let removed = Cpu::without_interrupts(|| {
            let mut drivers = self.drivers.lock();
            let before = drivers.len();
            drivers.retain(|d| !same_driver(*d, driver));
            before != drivers.len()
        });
        if !removed {
            return;
        }

        for slot in &self.devices {
            Cpu::without_interrupts(|| {
                let mut device = slot.lock();
                if device.driver().is_some_and(|d| same_driver(d, driver)) {
                    self.unbind(&mut device);
                }
            });
        }
        info!("maple: unregistered {}", driver.name());
    }

    /// Snapshot so driver callbacks run without the driver table locked.
    fn drivers(&self) -> [Option<&'static dyn Driver>; MAX_DRIVERS] {
        let mut snapshot = [None; MAX_DRIVERS];
        Cpu::without_interrupts(|| {
            for (slot, driver) in snapshot.iter_mut().zip(self.drivers.lock().iter()) {
                *slot = Some(*driver);
            }
        });
        snapshot
    }

    /// `callback` runs whenever a driver is bound to a device implementing
    /// any of `functions` (any device, if empty).
    pub fn set_attach_callback(&self, functions: Functions, callback: Option<Notify>) {
        *self.on_attach.lock() = callback.map(|callback| Notification { functions, callback });
    }

    /// Like [`Maple::set_attach_callback`], for unbinding.
    pub fn set_detach_callback(&self, functions: Functions, callback: Option<Notify>) {
        *self.on_detach.lock() = callback.map(|callback| Notification { functions, callback });
    }

    fn notify(notification: &Mutex<Option<Notification>>, device: &Device) {
        let Some(notification) = *notification.lock() else {
            return;
        };
        if notification.functions.is_empty() || notification.functions.intersects(device.functions()) {
            (notification.callback)(device);
        }
    }

    /// Queues the device's frame for the next batch. The frame must be
    /// locked and prepared.
    pub fn queue_frame(&self, device: &mut Device) -> Result<(), BusError> {
        if !device.frame.is_locked() {
            return Err(BusError::NotLocked);
        }
        if device.frame.state() != FrameState::Vacant {
            return Err(BusError::AlreadyQueued);
        }

        device.frame.mark_queued();
        let frame_ref = FrameRef::Device {
            port: device.port(),
            unit: device.unit(),
        };
        if self.queue.push(frame_ref).is_err() {
            device.frame.set_state(FrameState::Vacant);
            return Err(BusError::QueueFull);
        }

        Ok(())
    }

    fn with_frame<R>(&self, frame_ref: FrameRef, f: impl FnOnce(&mut Frame) -> R) -> Option<R> {
        match frame_ref {
            FrameRef::Detect => Some(Cpu::without_interrupts(|| f(&mut self.detector.lock().frame))),
            FrameRef::Device { port, unit } => self.with_device(port, unit, |device| f(&mut device.frame)),
        }
    }

    /// Hands every queued frame to the transport and starts the transfer,
    /// unless one is already running.
    pub fn flush(&self) {
        if self.queue.is_empty() {
            return;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.transport.begin();
        let mut sent = 0;
        while let Some(frame_ref) = self.queue.pop() {
            let pushed = self.with_frame(frame_ref, |frame| -> Result<bool, BusError> {
                if frame.state() != FrameState::Queued {
                    // Dropped by a detach while waiting.
                    return Ok(false);
                }
                self.transport.push(frame.header(), frame.payload())?;
                frame.set_state(FrameState::Sent);
                Ok(true)
            });

            match pushed {
                Some(Ok(true)) => {
                    // Same depth as the queue, cannot overflow.
                    let _ = self.in_flight.push(frame_ref);
                    sent += 1;
                }
                Some(Ok(false)) | None => {}
                Some(Err(_)) => {
                    let _ = self.queue.push(frame_ref);
                    break;
                }
            }
        }

        if sent == 0 {
            self.busy.store(false, Ordering::Release);
            return;
        }
        self.transport.start();
    }

    /// Transfer done: deliver every reply in the order the frames were sent.
    pub fn complete(&self) {
        let mut index = 0;
        while let Some(frame_ref) = self.in_flight.pop() {
            match frame_ref {
                FrameRef::Detect => Cpu::without_interrupts(|| {
                    let mut detector = self.detector.lock();
                    if self.receive(&mut detector.frame, index) {
                        self.on_probe_reply(&mut detector.frame);
                    }
                }),
                FrameRef::Device { port, unit } => {
                    let _ = self.with_device(port, unit, |device| {
                        if self.receive(&mut device.frame, index) {
                            self.on_reply(device);
                        }
                    });
                }
            }
            index += 1;
        }

        self.busy.store(false, Ordering::Release);
    }

    fn receive(&self, frame: &mut Frame, index: usize) -> bool {
        if frame.state() != FrameState::Sent {
            return false;
        }
        let words = self.transport.response(index, frame.recv_buffer());
        frame.set_received(words);

        true
    }

    fn on_reply(&self, device: &mut Device) {
        if !device.frame.reply_matches() {
            device.frame.set_state(FrameState::Rejected);
            device.set_status_valid(false);
            debug!(
                "maple: {} answered {:?}, frame held until the device is probed again",
                device.name(),
                device.frame.reply().response()
            );
            return;
        }

        device.frame.set_state(FrameState::Responded);
        let callback = device.frame.callback();
        device.frame.unlock();
        if let Some(callback) = callback {
            callback(self, device);
        }
    }

    /// Whether a transfer is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Periodic bus work: driver polls, one enumeration probe, and a flush.
    /// Skipped (and counted) while the previous transfer is still running.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if self.is_busy() {
            self.busy_ticks.fetch_add(1, Ordering::Relaxed);
            return;
        }

        for driver in self.drivers().into_iter().flatten() {
            driver.periodic(self);
        }
        self.probe_next();
        self.flush();
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks dropped because the bus was still busy.
    pub fn missed_ticks(&self) -> u32 {
        self.busy_ticks.load(Ordering::Relaxed)
    }

    /// Runs `f` over every device bound to `driver` whose frame isn't
    /// already queued. Stops early when `f` breaks.
    pub fn driver_foreach<F>(&self, driver: &dyn Driver, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(&mut Device) -> ControlFlow<()>,
    {
        for slot in &self.devices {
            let flow = Cpu::without_interrupts(|| {
                let mut device = slot.lock();
                let bound = device.is_valid() && device.driver().is_some_and(|d| same_driver(d, driver));
                if !bound || device.frame.state() == FrameState::Queued {
                    return ControlFlow::Continue(());
                }
                f(&mut device)
            });
            if flow.is_break() {
                return flow;
            }
        }

        ControlFlow::Continue(())
    }

    pub fn driver_for(&self, port: u8, unit: u8) -> Option<&'static dyn Driver> {
        self.with_device(port, unit, |device| device.driver()).flatten()
    }

    pub fn device_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|slot| Cpu::without_interrupts(|| slot.lock().is_valid()))
            .count()
    }

    /// Address of the `n`th present device implementing all of
    /// `functions`, in port then unit order.
    pub fn find_device(&self, functions: Functions, n: usize) -> Option<(u8, u8)> {
        self.devices
            .iter()
            .filter_map(|slot| {
                Cpu::without_interrupts(|| {
                    let device = slot.lock();
                    (device.is_valid() && device.functions().contains(functions))
                        .then(|| (device.port(), device.unit()))
                })
            })
            .nth(n)
    }

    /// Probes every slot once, waiting for each answer.
    pub fn scan_all(&self) {
        for port in 0..PORT_COUNT as u8 {
            self.probe_blocking(port, 0);
            let mask = self.subunits[usize::from(port)].load(Ordering::Acquire);
            for unit in 1..UNIT_COUNT as u8 {
                if mask & (1 << (unit - 1)) != 0 {
                    self.probe_blocking(port, unit);
                }
            }
        }

        info!("maple: {} devices present", self.device_count());
    }

    fn probe_blocking(&self, port: u8, unit: u8) {
        let mut idles = 0;
        while !Cpu::without_interrupts(|| self.queue_probe(&mut self.detector.lock().frame, port, unit)) {
            idles += 1;
            if idles > IDLE_LIMIT {
                warn!("maple: enumeration frame stuck, skipping {}{}", char::from(b'A' + port), unit);
                return;
            }
            self.transport.idle(self);
        }

        for _ in 0..IDLE_LIMIT {
            self.transport.idle(self);
            if !Cpu::without_interrupts(|| self.detector.lock().frame.is_locked()) {
                return;
            }
        }
        warn!("maple: no answer while probing {}{}", char::from(b'A' + port), unit);
    }

    fn queue_probe(&self, frame: &mut Frame, port: u8, unit: u8) -> bool {
        if frame.lock().is_err() {
            return false;
        }
        frame.retarget(port, unit);
        if frame.prepare(Command::DeviceInfo, &[], None).is_err() {
            frame.reset();
            return false;
        }
        frame.mark_queued();
        if self.queue.push(FrameRef::Detect).is_err() {
            frame.reset();
            return false;
        }

        true
    }

    /// Sends the next enumeration probe. Sub-unit slots are only probed
    /// while their main unit reports them.
    fn probe_next(&self) {
        Cpu::without_interrupts(|| {
            let mut detector = self.detector.lock();
            if detector.frame.is_locked() {
                return;
            }

            let total = PORT_COUNT * UNIT_COUNT;
            for _ in 0..total {
                let slot = detector.next;
                detector.next = (slot + 1) % total;

                let port = (slot / UNIT_COUNT) as u8;
                let unit = (slot % UNIT_COUNT) as u8;
                let present = self.subunits[usize::from(port)].load(Ordering::Acquire);
                if unit == 0 || present & (1 << (unit - 1)) != 0 {
                    self.queue_probe(&mut detector.frame, port, unit);
                    return;
                }
            }
        });
    }

    fn on_probe_reply(&self, frame: &mut Frame) {
        let (port, unit) = (frame.port(), frame.unit());
        let reply = frame.reply();
        let info = match reply.response() {
            Response::DeviceInfo => DeviceInfo::parse(reply.data()),
            _ => None,
        };

        if unit == 0 {
            let present = if info.is_some() { reply.header().sender & 0x1f } else { 0 };
            let gone = self.subunits[usize::from(port)].swap(present, Ordering::AcqRel) & !present;
            for sub in 1..UNIT_COUNT as u8 {
                if gone & (1 << (sub - 1)) != 0 {
                    self.device_absent(port, sub);
                }
            }
        }

        match info {
            Some(info) => self.device_present(port, unit, info),
            None => self.device_absent(port, unit),
        }
        frame.reset();
    }

    fn device_present(&self, port: u8, unit: u8, info: DeviceInfo) {
        let _ = self.with_device(port, unit, |device| {
            if !device.is_valid() {
                self.arrive(device, info);
                return;
            }

            if device.functions() != info.functions {
                info!(
                    "maple: {} changed functions {:#010x} -> {:#010x}",
                    device.name(),
                    device.functions().bits(),
                    info.functions.bits()
                );
                self.depart(device);
                self.arrive(device, info);
                return;
            }

            device.set_info(info);
            if device.frame.state() == FrameState::Rejected {
                debug!("maple: {} is back, releasing its frame", device.name());
                device.frame.reset();
            }
            if device.driver().is_none() {
                self.bind(device);
            }
        });
    }

    fn device_absent(&self, port: u8, unit: u8) {
        let _ = self.with_device(port, unit, |device| self.depart(device));
    }

    fn arrive(&self, device: &mut Device, info: DeviceInfo) {
        device.arrive(info);
        info!(
            "maple: {}: {} (functions {:#010x})",
            device.name(),
            info.name(),
            info.functions.bits()
        );
        self.bind(device);
    }

    fn depart(&self, device: &mut Device) {
        if !device.is_valid() {
            return;
        }
        self.unbind(device);
        device.depart();
        info!("maple: {}: removed", device.name());
    }

    fn bind(&self, device: &mut Device) {
        for driver in self.drivers().into_iter().flatten() {
            if !driver.functions().intersects(device.functions()) {
                continue;
            }

            match driver.attach(self, device) {
                Ok(()) => {
                    device.set_driver(Some(driver));
                    Self::notify(&self.on_attach, device);
                    return;
                }
                Err(e) => warn!("maple: {} refused {}: {}", driver.name(), device.name(), e),
            }
        }
    }

    fn unbind(&self, device: &mut Device) {
        if let Some(driver) = device.take_driver() {
            driver.detach(self, device);
            Self::notify(&self.on_detach, device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maple::drivers::controller::CONTROLLER;
    use crate::maple::drivers::memcard::MEMCARD;
    use crate::maple::sim::{SimBus, SimDevice};
    use core::sync::atomic::AtomicUsize;

    struct Counting {
        functions: Functions,
        attaches: AtomicUsize,
        detaches: AtomicUsize,
        refuse: bool,
    }

    impl Counting {
        const fn new(functions: Functions, refuse: bool) -> Self {
            Self {
                functions,
                attaches: AtomicUsize::new(0),
                detaches: AtomicUsize::new(0),
                refuse,
            }
        }

        fn attaches(&self) -> usize {
            self.attaches.load(Ordering::Relaxed)
        }

        fn detaches(&self) -> usize {
            self.detaches.load(Ordering::Relaxed)
        }
    }

    impl Driver for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn functions(&self) -> Functions {
            self.functions
        }

        fn attach(&self, _bus: &Maple, _device: &mut Device) -> Result<(), BusError> {
            self.attaches.fetch_add(1, Ordering::Relaxed);
            if self.refuse {
                return Err(BusError::NoDevice);
            }
            Ok(())
        }

        fn detach(&self, _bus: &Maple, _device: &mut Device) {
            self.detaches.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn bus_with(devices: Vec<(u8, u8, SimDevice)>) -> (&'static SimBus, Maple) {
        let sim = SimBus::leak();
        for (port, unit, device) in devices {
            sim.plug(port, unit, device);
        }
        (sim, Maple::new(sim))
    }

    fn run_ticks(bus: &Maple, n: usize) {
        for _ in 0..n {
            bus.tick();
            bus.transport().idle(bus);
        }
    }

    fn driver_name(bus: &Maple, port: u8, unit: u8) -> Option<&'static str> {
        bus.driver_for(port, unit).map(|d| d.name())
    }

    #[test]
    fn overlapping_drivers_are_refused() {
        static PADS_AND_MICE: Counting = Counting::new(Functions::CONTROLLER.union(Functions::MOUSE), false);

        let (_sim, bus) = bus_with(vec![]);
        bus.register_driver(&CONTROLLER).unwrap();
        assert_eq!(bus.register_driver(&CONTROLLER), Err(RegisterError::AlreadyRegistered));
        assert_eq!(
            bus.register_driver(&PADS_AND_MICE),
            Err(RegisterError::Overlap {
                existing: "controller",
                functions: Functions::CONTROLLER,
            })
        );

        bus.unregister_driver(&CONTROLLER);
        bus.unregister_driver(&CONTROLLER);
        assert!(bus.register_driver(&PADS_AND_MICE).is_ok());
    }

    #[test]
    fn scan_binds_every_device() {
        let (_sim, bus) = bus_with(vec![
            (0, 0, SimDevice::controller()),
            (0, 1, SimDevice::memcard(16)),
            (2, 0, SimDevice::controller()),
        ]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.register_driver(&MEMCARD).unwrap();
        bus.scan_all();

        assert_eq!(bus.device_count(), 3);
        assert_eq!(driver_name(&bus, 0, 0), Some("controller"));
        assert_eq!(driver_name(&bus, 0, 1), Some("memory card"));
        assert_eq!(driver_name(&bus, 1, 0), None);
        assert_eq!(bus.find_device(Functions::MEMCARD, 0), Some((0, 1)));
        assert_eq!(bus.find_device(Functions::CONTROLLER, 1), Some((2, 0)));
        assert_eq!(bus.find_device(Functions::CONTROLLER, 2), None);
        assert_eq!(
            bus.with_device(0, 1, |d| d.name().to_string()),
            Some(String::from("A1"))
        );
        assert!(bus.with_device(4, 0, |_| ()).is_none());
    }

    #[test]
    fn late_driver_attaches_once() {
        static MICE: Counting = Counting::new(Functions::MOUSE, false);
        static NOTIFIED: AtomicUsize = AtomicUsize::new(0);
        fn on_attach(device: &Device) {
            assert_eq!(device.functions(), Functions::MOUSE);
            NOTIFIED.fetch_add(1, Ordering::Relaxed);
        }

        let (_sim, bus) = bus_with(vec![(0, 0, SimDevice::new(Functions::MOUSE, "Mouse"))]);
        bus.scan_all();
        assert_eq!(bus.device_count(), 1);
        assert!(bus.driver_for(0, 0).is_none());

        bus.set_attach_callback(Functions::MOUSE, Some(on_attach));
        bus.register_driver(&MICE).unwrap();
        assert_eq!(MICE.attaches(), 0);

        // A full enumeration cycle and then some.
        run_ticks(&bus, 2 * PORT_COUNT);
        assert_eq!(MICE.attaches(), 1);
        assert_eq!(NOTIFIED.load(Ordering::Relaxed), 1);
        assert_eq!(driver_name(&bus, 0, 0), Some("counting"));
    }

    #[test]
    fn refused_attach_leaves_device_unbound() {
        static PICKY: Counting = Counting::new(Functions::CONTROLLER, true);

        let (_sim, bus) = bus_with(vec![(0, 0, SimDevice::controller())]);
        bus.register_driver(&PICKY).unwrap();
        bus.scan_all();

        assert_eq!(PICKY.attaches(), 1);
        assert!(bus.driver_for(0, 0).is_none());
        assert_eq!(bus.device_count(), 1);
    }

    #[test]
    fn unregister_unbinds_for_good() {
        static PADS: Counting = Counting::new(Functions::CONTROLLER, false);
        static DETACHED: AtomicUsize = AtomicUsize::new(0);
        fn on_detach(_device: &Device) {
            DETACHED.fetch_add(1, Ordering::Relaxed);
        }

        let (_sim, bus) = bus_with(vec![(1, 0, SimDevice::controller())]);
        bus.register_driver(&PADS).unwrap();
        bus.scan_all();
        bus.set_detach_callback(Functions::empty(), Some(on_detach));

        bus.unregister_driver(&PADS);
        assert_eq!(PADS.detaches(), 1);
        assert_eq!(DETACHED.load(Ordering::Relaxed), 1);
        assert!(bus.driver_for(1, 0).is_none());

        bus.unregister_driver(&PADS);
        run_ticks(&bus, 2 * PORT_COUNT);
        assert_eq!(PADS.attaches(), 1);
        assert!(bus.driver_for(1, 0).is_none());
    }

    #[test]
    fn queue_frame_checks_state() {
        let (_sim, bus) = bus_with(vec![(0, 0, SimDevice::controller())]);
        bus.scan_all();

        bus.with_device(0, 0, |device| {
            assert_eq!(
                device.frame.prepare(Command::GetCondition, &[], None),
                Err(BusError::NotLocked)
            );
            device.frame.lock().unwrap();
            assert_eq!(device.frame.lock(), Err(BusError::Busy));
            device
                .frame
                .prepare(Command::GetCondition, &[Functions::CONTROLLER.bits()], None)
                .unwrap();

            device.frame.unlock();
            assert_eq!(bus.queue_frame(device), Err(BusError::NotLocked));
            device.frame.lock().unwrap();
            bus.queue_frame(device).unwrap();
            assert_eq!(device.frame.state(), FrameState::Queued);
            assert_eq!(bus.queue_frame(device), Err(BusError::AlreadyQueued));
        })
        .unwrap();

        bus.transport().idle(&bus);
        assert_eq!(bus.with_device(0, 0, |d| d.frame.state()), Some(FrameState::Responded));
        assert_eq!(bus.with_device(0, 0, |d| d.frame.is_locked()), Some(false));
    }

    #[test]
    fn rejected_frame_waits_for_the_next_probe() {
        let (sim, bus) = bus_with(vec![(1, 0, SimDevice::controller())]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.scan_all();
        sim.with_device(1, 0, |d| d.reject_with = Some(Response::Again));

        // First tick probes A0, so B0's rejected poll stays held.
        run_ticks(&bus, 1);
        let held = bus.with_device(1, 0, |d| (d.frame.state(), d.frame.is_locked())).unwrap();
        assert_eq!(held, (FrameState::Rejected, true));
        assert_eq!(bus.with_device(1, 0, |d| d.status_valid()), Some(false));

        // Second tick finds the frame locked, then probes B0 and releases it.
        run_ticks(&bus, 1);
        assert_eq!(bus.with_device(1, 0, |d| d.missed_ticks()), Some(1));
        assert_eq!(bus.with_device(1, 0, |d| d.frame.is_locked()), Some(false));

        sim.with_device(1, 0, |d| d.reject_with = None);
        run_ticks(&bus, 1);
        assert_eq!(bus.with_device(1, 0, |d| d.status_valid()), Some(true));
    }

    #[test]
    fn unplugged_devices_are_detached() {
        static GONE: AtomicUsize = AtomicUsize::new(0);
        fn on_detach(_device: &Device) {
            GONE.fetch_add(1, Ordering::Relaxed);
        }

        let (sim, bus) = bus_with(vec![(0, 0, SimDevice::controller()), (0, 1, SimDevice::memcard(4))]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.register_driver(&MEMCARD).unwrap();
        bus.set_detach_callback(Functions::MEMCARD, Some(on_detach));
        bus.scan_all();
        assert_eq!(bus.device_count(), 2);

        // Pulling the card shows up in the main unit's answer.
        sim.unplug(0, 1);
        run_ticks(&bus, 1);
        assert_eq!(bus.device_count(), 1);
        assert_eq!(GONE.load(Ordering::Relaxed), 1);
        assert!(bus.driver_for(0, 1).is_none());

        // The controller detach is outside the notification mask.
        sim.unplug(0, 0);
        run_ticks(&bus, PORT_COUNT);
        assert_eq!(bus.device_count(), 0);
        assert_eq!(GONE.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn changed_functions_rebind() {
        let (sim, bus) = bus_with(vec![(0, 0, SimDevice::controller())]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.register_driver(&MEMCARD).unwrap();
        bus.scan_all();
        assert_eq!(driver_name(&bus, 0, 0), Some("controller"));

        sim.plug(0, 0, SimDevice::memcard(4));
        run_ticks(&bus, 1);
        assert_eq!(driver_name(&bus, 0, 0), Some("memory card"));
        assert_eq!(bus.device_count(), 1);
    }

    #[test]
    fn foreach_skips_queued_frames_and_stops_on_break() {
        let (_sim, bus) = bus_with(vec![
            (0, 0, SimDevice::controller()),
            (1, 0, SimDevice::controller()),
            (2, 0, SimDevice::controller()),
        ]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.scan_all();

        let mut seen = 0;
        let flow = bus.driver_foreach(&CONTROLLER, |_| {
            seen += 1;
            ControlFlow::Break(())
        });
        assert!(flow.is_break());
        assert_eq!(seen, 1);

        bus.with_device(1, 0, |device| {
            device.frame.lock().unwrap();
            device.frame.prepare(Command::GetCondition, &[], None).unwrap();
            bus.queue_frame(device).unwrap();
        });

        let mut ports = Vec::new();
        let flow = bus.driver_foreach(&CONTROLLER, |device| {
            ports.push(device.port());
            ControlFlow::Continue(())
        });
        assert!(flow.is_continue());
        assert_eq!(ports, [0, 2]);
    }

    #[test]
    fn full_transport_sends_the_rest_later() {
        let (sim, bus) = bus_with(vec![
            (0, 0, SimDevice::controller()),
            (1, 0, SimDevice::controller()),
            (2, 0, SimDevice::controller()),
        ]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.scan_all();
        sim.set_capacity(Some(1));
        let batches = sim.batches();

        bus.tick();
        for _ in 0..8 {
            bus.transport().idle(&bus);
        }

        for port in 0..3 {
            assert_eq!(bus.with_device(port, 0, |d| d.status_valid()), Some(true));
        }
        // Three polls and a probe, one per batch.
        assert_eq!(sim.batches() - batches, 4);
    }

    #[test]
    fn busy_bus_skips_ticks() {
        let (_sim, bus) = bus_with(vec![(0, 0, SimDevice::controller())]);
        bus.register_driver(&CONTROLLER).unwrap();
        bus.scan_all();

        bus.tick();
        assert!(bus.is_busy());
        bus.tick();
        assert_eq!(bus.ticks(), 2);
        assert_eq!(bus.missed_ticks(), 1);

        bus.complete();
        assert!(!bus.is_busy());
    }
}
