//! Async driver for a role.
//!
//! One task owns the role and multiplexes its four inputs: transport events,
//! the next timer deadline, the animation clock and commands from
//! [`DriverHandle`]s. Application events are published on a broadcast
//! channel.
//!
//! ```no_run
//! # async fn demo(remote: gymote::GymoteRemote<gymote::LoopbackTransport>,
//! #               events: gymote::transport::TransportEvents) {
//! use gymote::runtime::Driver;
//!
//! let (driver, handle) = Driver::from_role(remote, events);
//! let mut app_events = handle.subscribe();
//! tokio::spawn(driver.run());
//!
//! handle.apply(|remote, _now| remote.update_pointer(120.0, 80.0));
//! while let Ok(event) = app_events.recv().await {
//!     println!("{}", event.name());
//! }
//! # }
//! ```

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::events::Event;
use crate::roles::Role;
use crate::transport::TransportEvents;

/// Capacity of the application event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Far-future fallback for the timer branch when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

type Apply<R> = Box<dyn FnOnce(&mut R, Instant) + Send>;

enum Command<R> {
    Apply(Apply<R>),
    Shutdown,
}

/// Handle for talking to a running [`Driver`].
pub struct DriverHandle<R> {
    commands: mpsc::UnboundedSender<Command<R>>,
    events: broadcast::Sender<Event>,
}

impl<R> Clone for DriverHandle<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            events: self.events.clone(),
        }
    }
}

impl<R> std::fmt::Debug for DriverHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}

impl<R> DriverHandle<R> {
    /// Run `f` on the role inside the driver task. Returns false if the
    /// driver has stopped.
    pub fn apply<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut R, Instant) + Send + 'static,
    {
        self.commands.send(Command::Apply(Box::new(f))).is_ok()
    }

    /// Subscribe to application events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Ask the driver to disconnect and stop.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Owns a role and drives it on a tokio task.
pub struct Driver<R> {
    role: R,
    transport_events: TransportEvents,
    commands: mpsc::UnboundedReceiver<Command<R>>,
    events: broadcast::Sender<Event>,
    animation_interval: Duration,
}

impl<R: Role> Driver<R> {
    /// Create a driver ticking at the role's configured animation interval.
    pub fn from_role(role: R, transport_events: TransportEvents) -> (Self, DriverHandle<R>) {
        let animation_interval = role.animation_interval();
        Self::new(role, transport_events, animation_interval)
    }

    /// Create a driver and its handle with an explicit animation interval.
    pub fn new(
        role: R,
        transport_events: TransportEvents,
        animation_interval: Duration,
    ) -> (Self, DriverHandle<R>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handle = DriverHandle {
            commands: command_tx,
            events: events.clone(),
        };
        let driver = Self {
            role,
            transport_events,
            commands,
            events,
            animation_interval,
        };
        (driver, handle)
    }

    /// Interval between animation ticks.
    pub fn animation_interval(&self) -> Duration {
        self.animation_interval
    }

    /// Run until shut down or every handle is dropped. Returns the role.
    pub async fn run(mut self) -> R {
        let mut animation = time::interval(self.animation_interval);
        animation.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut transport_open = true;

        // Events raised before the loop started, e.g. a restorable pairing.
        self.publish();

        loop {
            let deadline = self.role.next_deadline();
            let wake_at = deadline
                .map(time::Instant::from_std)
                .unwrap_or_else(|| time::Instant::now() + IDLE_WAIT);

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Apply(f)) => f(&mut self.role, Instant::now()),
                    Some(Command::Shutdown) | None => break,
                },
                event = self.transport_events.recv(), if transport_open => match event {
                    Some(event) => self.role.handle_transport_event(event, Instant::now()),
                    None => {
                        debug!("transport event channel closed");
                        transport_open = false;
                    }
                },
                _ = time::sleep_until(wake_at), if deadline.is_some() => {
                    self.role.poll_timers(Instant::now());
                }
                _ = animation.tick() => self.role.on_animation_frame(Instant::now()),
            }

            self.publish();
        }

        info!("driver stopping");
        self.role.disconnect();
        self.publish();
        self.role
    }

    fn publish(&mut self) {
        while let Some(event) = self.role.poll_event() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::transport::{TransportEvent, event_channel};

    /// Role that records its inputs.
    #[derive(Debug, Default)]
    struct ScriptedRole {
        log: Arc<Mutex<Vec<&'static str>>>,
        deadline: Option<Instant>,
        pending: Vec<Event>,
    }

    impl Role for ScriptedRole {
        fn handle_transport_event(&mut self, event: TransportEvent, _now: Instant) {
            self.log.lock().unwrap().push("transport");
            if event == TransportEvent::Connected {
                self.pending.push(Event::Connected);
            }
        }

        fn poll_timers(&mut self, _now: Instant) {
            self.log.lock().unwrap().push("timer");
            self.deadline = None;
        }

        fn on_animation_frame(&mut self, _now: Instant) {
            self.log.lock().unwrap().push("frame");
        }

        fn next_deadline(&self) -> Option<Instant> {
            self.deadline
        }

        fn poll_event(&mut self) -> Option<Event> {
            self.pending.pop()
        }

        fn disconnect(&mut self) {
            self.log.lock().unwrap().push("disconnect");
        }

        fn is_connected(&self) -> bool {
            false
        }

        fn animation_interval(&self) -> Duration {
            Duration::from_millis(10)
        }
    }

    #[tokio::test]
    async fn test_driver_routes_inputs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let role = ScriptedRole {
            log: log.clone(),
            deadline: Some(Instant::now() + Duration::from_millis(5)),
            pending: Vec::new(),
        };
        let (tx, rx) = event_channel();
        let (driver, handle) = Driver::from_role(role, rx);
        let mut events = handle.subscribe();
        let task = tokio::spawn(driver.run());

        tx.send(TransportEvent::Connected).unwrap();
        assert_eq!(events.recv().await.unwrap(), Event::Connected);

        handle.apply(|role, _| role.pending.push(Event::LagStart));
        assert_eq!(events.recv().await.unwrap(), Event::LagStart);

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown();
        let role = task.await.unwrap();

        let log = log.lock().unwrap();
        assert!(log.contains(&"transport"));
        assert!(log.contains(&"timer"));
        assert!(log.contains(&"frame"));
        assert_eq!(log.last(), Some(&"disconnect"));
        assert!(role.deadline.is_none());
    }

    #[tokio::test]
    async fn test_driver_stops_when_handles_dropped() {
        let (_tx, rx) = event_channel();
        let (driver, handle) = Driver::new(ScriptedRole::default(), rx, Duration::from_millis(10));
        drop(handle);
        let role = driver.run().await;
        assert_eq!(role.log.lock().unwrap().as_slice(), &["disconnect"]);
    }

    #[test]
    fn test_driver_uses_configured_animation_interval() {
        use crate::config::GymoteConfig;
        use crate::pairing::{MemoryStore, MockService, PairingManager};
        use crate::roles::GymoteScreen;
        use crate::transport::testing::RecordingTransport;

        let mut config = GymoteConfig::default();
        config.motion.animation_interval_ms = 40;
        let screen = GymoteScreen::new(
            config,
            PairingManager::new(Arc::new(MockService::default()), Arc::new(MemoryStore::new())),
            RecordingTransport::default(),
        );

        let (_tx, rx) = event_channel();
        let (driver, _handle) = Driver::from_role(screen, rx);
        assert_eq!(driver.animation_interval(), Duration::from_millis(40));

        let (_tx, rx) = event_channel();
        let (driver, _handle) = Driver::from_role(ScriptedRole::default(), rx);
        assert_eq!(driver.animation_interval(), Duration::from_millis(10));
    }
}
