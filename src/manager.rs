//! Subscription lifecycle for the two altitude streams.
//!
//! The manager owns the sensor service and publishes a [`Reading`] through a
//! `watch` channel. Handlers registered with the service may run on any
//! thread; every mutation goes through the channel's lock, so subscribers
//! always see a consistent reading.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::{
    altimeter::{AltitudeService, Delivery, UpdateHandler},
    reading::Reading,
};

#[derive(Debug, Clone, Copy)]
enum Stream {
    Relative,
    Absolute,
}

impl Stream {
    fn as_str(&self) -> &'static str {
        match self {
            Stream::Relative => "Relative",
            Stream::Absolute => "Absolute",
        }
    }
}

#[derive(Debug)]
struct Shared {
    reading: watch::Sender<Reading>,
    session: AtomicU64,
}

impl Shared {
    /// Closes the current session and opens a new one, applying `f` under the
    /// same lock.
    fn open_session(&self, f: impl FnOnce(&mut Reading)) -> u64 {
        let mut session = 0;
        self.reading.send_modify(|reading| {
            session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
            f(reading);
        });
        session
    }

    fn close_session(&self) {
        self.reading.send_if_modified(|_| {
            self.session.fetch_add(1, Ordering::SeqCst);
            false
        });
    }

    /// Applies `f` only if `session` is still current.
    fn deliver(&self, session: u64, f: impl FnOnce(&mut Reading)) -> bool {
        self.reading.send_if_modified(|reading| {
            if self.session.load(Ordering::SeqCst) != session {
                return false;
            }
            f(reading);
            true
        })
    }

    fn update(&self, f: impl FnOnce(&mut Reading) -> bool) {
        self.reading.send_if_modified(f);
    }
}

fn handler<T>(
    shared: Arc<Shared>,
    session: u64,
    stream: Stream,
    apply: fn(&mut Reading, &T),
) -> UpdateHandler<T>
where
    T: Send + 'static,
{
    Box::new(move |delivery: Delivery<T>| match delivery {
        Err(err) => {
            warn!("{} update error: {}", stream.as_str(), err);
            let message = format!("{} error: {}", stream.as_str(), err);
            if !shared.deliver(session, |reading| reading.error = Some(message)) {
                debug!("{} error delivered after stop, ignored", stream.as_str());
            }
        }
        Ok(Some(data)) => {
            if !shared.deliver(session, |reading| apply(reading, &data)) {
                debug!("{} data delivered after stop, ignored", stream.as_str());
            }
        }
        Ok(None) => debug!("{} update: no data", stream.as_str()),
    })
}

pub struct AltimeterManager<S: AltitudeService> {
    service: S,
    shared: Arc<Shared>,
    running: bool,
}

impl<S: AltitudeService> AltimeterManager<S> {
    pub fn new(service: S) -> Self {
        let (reading, _) = watch::channel(Reading::default());

        let manager = Self {
            service,
            shared: Arc::new(Shared {
                reading,
                session: AtomicU64::new(0),
            }),
            running: false,
        };
        manager.refresh();
        manager
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn subscribe(&self) -> watch::Receiver<Reading> {
        self.shared.reading.subscribe()
    }

    pub fn reading(&self) -> Reading {
        self.shared.reading.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn update_availability(&self) {
        let relative = self.service.is_relative_available();
        let absolute = self.service.is_absolute_available();

        self.shared.update(|reading| {
            let changed =
                reading.relative_available != relative || reading.absolute_available != absolute;
            reading.relative_available = relative;
            reading.absolute_available = absolute;
            changed
        });
    }

    pub fn update_authorization(&self) {
        let authorization = self.service.authorization_status().to_string();

        self.shared.update(|reading| {
            if reading.authorization == authorization {
                return false;
            }
            reading.authorization = authorization;
            true
        });
    }

    /// Re-queries availability and authorization.
    pub fn refresh(&self) {
        self.update_availability();
        self.update_authorization();
    }

    /// Starts or stops both streams. No debouncing: every call goes through.
    pub fn set_running(&mut self, running: bool) {
        info!("toggle changed to {running}");
        self.running = running;
        self.shared.update(|reading| {
            let changed = reading.running != running;
            reading.running = running;
            changed
        });

        if running {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn toggle(&mut self) -> bool {
        let running = !self.running;
        self.set_running(running);
        running
    }

    pub fn start(&self) {
        self.update_authorization();

        let relative = self.service.is_relative_available();
        let absolute = self.service.is_absolute_available();

        let session = self.shared.open_session(|reading| {
            reading.error = None;
            reading.relative_available = relative;
            reading.absolute_available = absolute;
            if !relative {
                reading.mark_relative_unavailable();
            }
            if !absolute {
                reading.mark_absolute_unavailable();
            }
        });

        if relative {
            self.service.start_relative_updates(handler(
                self.shared.clone(),
                session,
                Stream::Relative,
                Reading::apply_relative,
            ));
        } else {
            info!("relative altitude is not available");
        }

        if absolute {
            self.service.start_absolute_updates(handler(
                self.shared.clone(),
                session,
                Stream::Absolute,
                Reading::apply_absolute,
            ));
        } else {
            info!("absolute altitude is not available");
        }

        info!("altimeter updates started");
    }

    /// Stops both streams. Deliveries that land after this returns are dropped.
    pub fn stop(&self) {
        self.shared.close_session();

        self.service.stop_relative_updates();
        info!("relative altitude updates stopped");

        self.service.stop_absolute_updates();
        info!("absolute altitude updates stopped");

        info!("altimeter updates stopped");
    }
}

impl<S: AltitudeService> Drop for AltimeterManager<S> {
    fn drop(&mut self) {
        if self.running {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex, mpsc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;
    use crate::{
        altimeter::{AbsoluteAltitudeData, AuthorizationStatus, RelativeAltitudeData},
        error::SensorError,
        reading::DisplayValue,
    };

    struct FakeAltimeter {
        relative_available: bool,
        absolute_available: bool,
        // Answers handed out before falling back to `relative_available`.
        relative_answers: Mutex<VecDeque<bool>>,
        authorization: Mutex<AuthorizationStatus>,
        // Handlers outlive stop to model deliveries already in flight.
        relative: Mutex<Option<UpdateHandler<RelativeAltitudeData>>>,
        absolute: Mutex<Option<UpdateHandler<AbsoluteAltitudeData>>>,
        relative_starts: AtomicUsize,
        absolute_starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl FakeAltimeter {
        fn new(relative_available: bool, absolute_available: bool) -> Self {
            Self {
                relative_available,
                absolute_available,
                relative_answers: Mutex::new(VecDeque::new()),
                authorization: Mutex::new(AuthorizationStatus::Authorized),
                relative: Mutex::new(None),
                absolute: Mutex::new(None),
                relative_starts: AtomicUsize::new(0),
                absolute_starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }
        }

        fn fire_relative(&self, delivery: Delivery<RelativeAltitudeData>) {
            if let Some(handler) = self.relative.lock().unwrap().as_mut() {
                handler(delivery);
            }
        }

        fn fire_absolute(&self, delivery: Delivery<AbsoluteAltitudeData>) {
            if let Some(handler) = self.absolute.lock().unwrap().as_mut() {
                handler(delivery);
            }
        }
    }

    impl AltitudeService for FakeAltimeter {
        fn is_relative_available(&self) -> bool {
            self.relative_answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.relative_available)
        }

        fn is_absolute_available(&self) -> bool {
            self.absolute_available
        }

        fn authorization_status(&self) -> AuthorizationStatus {
            *self.authorization.lock().unwrap()
        }

        fn start_relative_updates(&self, handler: UpdateHandler<RelativeAltitudeData>) {
            self.relative_starts.fetch_add(1, Ordering::SeqCst);
            *self.relative.lock().unwrap() = Some(handler);
        }

        fn stop_relative_updates(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn start_absolute_updates(&self, handler: UpdateHandler<AbsoluteAltitudeData>) {
            self.absolute_starts.fetch_add(1, Ordering::SeqCst);
            *self.absolute.lock().unwrap() = Some(handler);
        }

        fn stop_absolute_updates(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn relative(relative_altitude_m: f64, pressure_kpa: f64) -> RelativeAltitudeData {
        RelativeAltitudeData {
            relative_altitude_m,
            pressure_kpa,
        }
    }

    #[test]
    fn new_queries_availability_and_authorization() {
        let manager = AltimeterManager::new(FakeAltimeter::new(true, false));
        let reading = manager.reading();

        assert!(reading.relative_available);
        assert!(!reading.absolute_available);
        assert_eq!(reading.authorization, "Authorized");
        assert_eq!(reading.relative_altitude, DisplayValue::Placeholder);
        assert!(!reading.running);
    }

    #[test]
    fn unavailable_streams_are_marked_and_not_started() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(false, false));
        manager.set_running(true);

        let reading = manager.reading();
        assert_eq!(reading.relative_altitude.to_string(), "unavailable");
        assert_eq!(reading.relative_pressure.to_string(), "unavailable");
        assert_eq!(reading.absolute_altitude.to_string(), "unavailable");
        assert_eq!(reading.precision.to_string(), "unavailable");
        assert_eq!(reading.accuracy.to_string(), "unavailable");
        assert_eq!(manager.service().relative_starts.load(Ordering::SeqCst), 0);
        assert_eq!(manager.service().absolute_starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn only_the_unavailable_stream_is_skipped() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, false));
        manager.set_running(true);

        assert_eq!(manager.service().relative_starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.service().absolute_starts.load(Ordering::SeqCst), 0);
        assert_eq!(manager.reading().relative_altitude, DisplayValue::Placeholder);
        assert_eq!(manager.reading().absolute_altitude, DisplayValue::Unavailable);
    }

    #[test]
    fn data_is_formatted_with_two_decimals() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);

        manager.service().fire_relative(Ok(Some(relative(12.345678, 100.1))));
        manager.service().fire_absolute(Ok(Some(AbsoluteAltitudeData {
            altitude_m: 35.0,
            precision_m: 0.129,
            accuracy_m: 4.5,
        })));

        let reading = manager.reading();
        assert_eq!(reading.relative_altitude.to_string(), "12.35");
        assert_eq!(reading.relative_pressure.to_string(), "100.10");
        assert_eq!(reading.absolute_altitude.to_string(), "35.00");
        assert_eq!(reading.precision.to_string(), "0.13");
        assert_eq!(reading.accuracy.to_string(), "4.50");
    }

    #[test]
    fn error_only_touches_error_field() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);
        manager.service().fire_relative(Ok(Some(relative(1.0, 101.0))));
        let before = manager.reading();

        manager
            .service()
            .fire_relative(Err(SensorError::delivery("sensor busy")));
        let after = manager.reading();

        assert_eq!(after.error.as_deref(), Some("Relative error: sensor busy"));
        assert_eq!(
            Reading {
                error: None,
                ..after.clone()
            },
            before
        );

        manager
            .service()
            .fire_absolute(Err(SensorError::delivery("not authorized")));
        assert_eq!(
            manager.reading().error.as_deref(),
            Some("Absolute error: not authorized")
        );
        assert_eq!(manager.reading().relative_altitude.to_string(), "1.00");
    }

    #[test]
    fn empty_delivery_is_ignored() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);
        let before = manager.reading();

        manager.service().fire_relative(Ok(None));
        manager.service().fire_absolute(Ok(None));

        assert_eq!(manager.reading(), before);
    }

    #[test]
    fn no_mutation_after_stop() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);
        manager.service().fire_relative(Ok(Some(relative(2.0, 100.0))));
        manager.set_running(false);
        let stopped = manager.reading();

        manager.service().fire_relative(Ok(Some(relative(9.0, 90.0))));
        manager
            .service()
            .fire_absolute(Err(SensorError::delivery("late")));

        assert_eq!(manager.reading(), stopped);
        assert_eq!(stopped.relative_altitude.to_string(), "2.00");
        assert!(!stopped.running);
        assert_eq!(manager.service().stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restart_clears_error_and_keeps_values() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);
        manager.service().fire_relative(Ok(Some(relative(5.0, 99.0))));
        manager
            .service()
            .fire_relative(Err(SensorError::delivery("glitch")));
        manager.set_running(false);

        manager.set_running(true);
        let reading = manager.reading();
        assert_eq!(reading.error, None);
        assert_eq!(reading.relative_altitude.to_string(), "5.00");

        manager.service().fire_relative(Ok(Some(relative(6.0, 98.0))));
        assert_eq!(manager.reading().relative_altitude.to_string(), "6.00");
    }

    #[test]
    fn handler_from_earlier_start_is_stale() {
        let manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.start();
        let stale = manager.service().relative.lock().unwrap().take();

        manager.start();
        manager.service().fire_relative(Ok(Some(relative(1.0, 100.0))));
        assert_eq!(manager.reading().relative_altitude.to_string(), "1.00");

        let mut stale = stale.unwrap();
        stale(Ok(Some(relative(7.0, 70.0))));
        assert_eq!(manager.reading().relative_altitude.to_string(), "1.00");
    }

    #[test]
    fn start_reads_availability_once() {
        let manager = AltimeterManager::new(FakeAltimeter::new(false, true));
        manager
            .service()
            .relative_answers
            .lock()
            .unwrap()
            .extend([true, false]);

        manager.start();

        let reading = manager.reading();
        assert_eq!(manager.service().relative_starts.load(Ordering::SeqCst), 1);
        assert!(reading.relative_available);
        assert_eq!(reading.relative_altitude, DisplayValue::Placeholder);
    }

    #[test]
    fn deliveries_from_another_thread_end_at_stop() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        manager.set_running(true);
        let mut deliver = manager.service().relative.lock().unwrap().take().unwrap();

        let stopped = Arc::new(AtomicBool::new(false));
        let (first_tx, first_rx) = mpsc::channel();

        let flag = stopped.clone();
        let worker = thread::spawn(move || {
            let mut i = 0u32;
            let mut after_stop = 0;
            while after_stop < 1000 {
                deliver(Ok(Some(relative(f64::from(i), 100.0))));
                if i == 0 {
                    first_tx.send(()).unwrap();
                }
                if flag.load(Ordering::SeqCst) {
                    after_stop += 1;
                }
                i += 1;
            }
        });

        first_rx.recv().unwrap();
        manager.set_running(false);
        let snapshot = manager.reading();
        stopped.store(true, Ordering::SeqCst);
        worker.join().unwrap();

        assert_ne!(snapshot.relative_altitude, DisplayValue::Placeholder);
        assert_eq!(manager.reading(), snapshot);
    }

    #[test]
    fn start_refreshes_authorization() {
        let manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        *manager.service().authorization.lock().unwrap() = AuthorizationStatus::Denied;
        assert_eq!(manager.reading().authorization, "Authorized");

        manager.start();
        assert_eq!(manager.reading().authorization, "Denied");
    }

    #[test]
    fn toggle_flips_running() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));

        assert!(manager.toggle());
        assert!(manager.is_running());
        assert!(manager.reading().running);

        assert!(!manager.toggle());
        assert!(!manager.is_running());
        assert_eq!(manager.service().stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribers_see_deliveries() {
        let mut manager = AltimeterManager::new(FakeAltimeter::new(true, true));
        let mut readings = manager.subscribe();
        readings.borrow_and_update();

        manager.set_running(true);
        assert!(readings.has_changed().unwrap());
        readings.borrow_and_update();

        manager.service().fire_relative(Ok(Some(relative(3.0, 100.0))));
        assert!(readings.has_changed().unwrap());
        assert_eq!(
            readings.borrow_and_update().relative_altitude.to_string(),
            "3.00"
        );

        manager.set_running(false);
        readings.borrow_and_update();
        manager.service().fire_relative(Ok(Some(relative(4.0, 100.0))));
        assert!(!readings.has_changed().unwrap());
    }
}
