//! The broadcast relay: a single task that owns every room and session.
//!
//! Connections never touch room state directly. They enqueue
//! [`RelayCommand`]s through a [`RelayHandle`]; the relay task applies them
//! one at a time, in arrival order, and pushes the resulting frames into the
//! members' [`ClientSink`]s. Reclamation timers feed the same queue, so every
//! mutation of a room is serialized without locks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sketch_relay_core::config::{Config, DEFAULT_RECLAIM_AFTER_SECS};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::RelayClosed;
use crate::protocol::{ConnectionId, DrawPayload, InboundEvent, JoinRoom, OutboundEvent};
use crate::registry::{RoomRegistry, RoomStatus};
use crate::sink::ClientSink;

/// Tunables for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// How long an empty room is kept before it is reclaimed.
    pub reclaim_after: Duration,
    /// Optional cap on stored draw events per room.
    pub max_history: Option<usize>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            reclaim_after: Duration::from_secs(DEFAULT_RECLAIM_AFTER_SECS),
            max_history: None,
        }
    }
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            reclaim_after: config.reclaim_after(),
            max_history: config.max_history(),
        }
    }
}

/// Process-wide counters for the status endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub active_rooms: usize,
    pub connections: usize,
}

/// Work items for the relay task.
pub enum RelayCommand {
    Connect {
        conn_id: ConnectionId,
        sink: Arc<dyn ClientSink>,
    },
    Event {
        conn_id: ConnectionId,
        event: InboundEvent,
    },
    Disconnect {
        conn_id: ConnectionId,
    },
    /// Fired by a reclamation timer.
    Reclaim {
        room_id: String,
    },
    RoomStatus {
        room_id: String,
        reply: oneshot::Sender<Option<RoomStatus>>,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Cheap, cloneable entry point to the relay task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    /// Register a new connection and the sink its frames go to.
    pub fn connect(
        &self,
        conn_id: ConnectionId,
        sink: Arc<dyn ClientSink>,
    ) -> Result<(), RelayClosed> {
        self.send(RelayCommand::Connect { conn_id, sink })
    }

    /// Hand an inbound event from `conn_id` to the relay.
    pub fn dispatch(&self, conn_id: ConnectionId, event: InboundEvent) -> Result<(), RelayClosed> {
        self.send(RelayCommand::Event { conn_id, event })
    }

    /// Report that `conn_id` is gone.
    pub fn disconnect(&self, conn_id: ConnectionId) -> Result<(), RelayClosed> {
        self.send(RelayCommand::Disconnect { conn_id })
    }

    pub async fn room_status(&self, room_id: &str) -> Result<Option<RoomStatus>, RelayClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::RoomStatus {
            room_id: room_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| RelayClosed)
    }

    pub async fn stats(&self) -> Result<RelayStats, RelayClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Stats { reply })?;
        rx.await.map_err(|_| RelayClosed)
    }

    fn send(&self, command: RelayCommand) -> Result<(), RelayClosed> {
        self.tx.send(command).map_err(|_| RelayClosed)
    }
}

/// Per-connection record: where to send frames and which room it is in.
struct Session {
    sink: Arc<dyn ClientSink>,
    room_id: Option<String>,
}

/// Room state plus the event handlers. Synchronous; driven by [`Relay`].
pub struct RelayState {
    registry: RoomRegistry,
    sessions: HashMap<ConnectionId, Session>,
    max_history: Option<usize>,
}

impl RelayState {
    pub fn new(max_history: Option<usize>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            sessions: HashMap::new(),
            max_history,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            active_rooms: self.registry.len(),
            connections: self.sessions.len(),
        }
    }

    /// The room `conn_id` is currently associated with.
    pub fn room_of(&self, conn_id: &ConnectionId) -> Option<&str> {
        self.sessions.get(conn_id)?.room_id.as_deref()
    }

    pub fn connect(&mut self, conn_id: ConnectionId, sink: Arc<dyn ClientSink>) {
        self.sessions.insert(
            conn_id,
            Session {
                sink,
                room_id: None,
            },
        );
    }

    /// Join (or re-join) a room.
    ///
    /// A connection already in a different room leaves it first. Returns the
    /// room left behind empty, if any, so the caller can schedule reclamation.
    #[must_use]
    pub fn join(&mut self, conn_id: ConnectionId, join: JoinRoom) -> Option<String> {
        let JoinRoom {
            room_id,
            is_creating,
        } = join;
        let Some(session) = self.sessions.get_mut(&conn_id) else {
            debug!(%conn_id, room_id = %room_id, "Join from unknown connection, ignoring");
            return None;
        };
        let previous = session.room_id.replace(room_id.clone());
        info!(%conn_id, room_id = %room_id, is_creating, "Client joining room");

        let emptied = match previous {
            Some(previous) if previous != room_id => self.leave(conn_id, &previous),
            _ => None,
        };

        let room = self.registry.get_or_create(&room_id);
        room.add_member(conn_id);
        let count = room.member_count();

        let snapshot = encode(&OutboundEvent::DrawHistory {
            history: room.history(),
        });
        if let Some(frame) = snapshot {
            self.send_to(&conn_id, frame);
        }
        self.broadcast(&room_id, &OutboundEvent::UserCount { count }, None);

        info!(room_id = %room_id, members = count, "Room membership changed");
        emptied
    }

    /// Record a draw and relay it to every other member.
    pub fn draw(&mut self, conn_id: ConnectionId, payload: DrawPayload) {
        let Some(room_id) = self.room_of(&conn_id).map(str::to_owned) else {
            debug!(%conn_id, "Draw without a room, ignoring");
            return;
        };
        let frame = encode(&OutboundEvent::Draw(&payload));
        let Some(room) = self.registry.get_mut(&room_id) else {
            return;
        };
        room.push_draw(payload, self.max_history);

        if let Some(frame) = frame {
            self.broadcast_frame(&room_id, frame, Some(&conn_id));
        }
    }

    /// Wipe the room's history and tell every member, sender included.
    pub fn clear(&mut self, conn_id: ConnectionId) {
        let Some(room_id) = self.room_of(&conn_id).map(str::to_owned) else {
            debug!(%conn_id, "Clear without a room, ignoring");
            return;
        };
        let Some(room) = self.registry.get_mut(&room_id) else {
            return;
        };
        room.clear_history();
        info!(%conn_id, room_id = %room_id, "Room cleared");

        self.broadcast(&room_id, &OutboundEvent::Clear, None);
    }

    /// Drop the connection's session and leave its room.
    ///
    /// Returns the room left behind empty, if any.
    #[must_use]
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Option<String> {
        let room_id = self.sessions.remove(&conn_id)?.room_id?;
        self.leave(conn_id, &room_id)
    }

    /// Reclaim a room if it is still empty.
    pub fn reclaim(&mut self, room_id: &str) -> bool {
        match self.registry.remove_if_empty(room_id) {
            Some(room) => {
                info!(
                    room_id = room.room_id(),
                    created_at = %room.created_at(),
                    last_updated = %room.last_updated(),
                    "Room deleted (empty)"
                );
                true
            }
            None => {
                debug!(room_id, "Room no longer empty or already gone, keeping");
                false
            }
        }
    }

    fn leave(&mut self, conn_id: ConnectionId, room_id: &str) -> Option<String> {
        let room = self.registry.get_mut(room_id)?;
        room.remove_member(&conn_id);
        let count = room.member_count();
        let empty = room.is_empty();

        self.broadcast(room_id, &OutboundEvent::UserCount { count }, None);
        info!(room_id, members = count, "Room membership changed");

        empty.then(|| room_id.to_string())
    }

    fn broadcast(&self, room_id: &str, event: &OutboundEvent<'_>, exclude: Option<&ConnectionId>) {
        if let Some(frame) = encode(event) {
            self.broadcast_frame(room_id, frame, exclude);
        }
    }

    /// Send one frame to every live member of a room, optionally skipping one.
    fn broadcast_frame(&self, room_id: &str, frame: String, exclude: Option<&ConnectionId>) {
        let Some(room) = self.registry.get(room_id) else {
            return;
        };
        let mut sent = 0;
        for member in room.members() {
            if Some(member) == exclude {
                continue;
            }
            if self.send_to(member, frame.clone()) {
                sent += 1;
            }
        }
        debug!(room_id, sent, "Broadcast");
    }

    fn send_to(&self, conn_id: &ConnectionId, frame: String) -> bool {
        let Some(session) = self.sessions.get(conn_id) else {
            return false;
        };
        if !session.sink.is_open() {
            return false;
        }
        match session.sink.send_frame(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!(%conn_id, %e, "Failed to send frame to client");
                false
            }
        }
    }
}

fn encode(event: &OutboundEvent<'_>) -> Option<String> {
    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!(%e, "Failed to serialize event");
            None
        }
    }
}

/// The relay task.
pub struct Relay {
    state: RelayState,
    rx: mpsc::UnboundedReceiver<RelayCommand>,
    /// Weak so that pending timers do not keep the relay alive.
    timer_tx: mpsc::WeakUnboundedSender<RelayCommand>,
    reclaim_after: Duration,
}

impl Relay {
    /// Start the relay task on the current tokio runtime.
    ///
    /// The task stops once every [`RelayHandle`] has been dropped.
    pub fn spawn(settings: RelaySettings) -> RelayHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = Self {
            state: RelayState::new(settings.max_history),
            rx,
            timer_tx: tx.downgrade(),
            reclaim_after: settings.reclaim_after,
        };
        tokio::spawn(relay.run());
        RelayHandle { tx }
    }

    async fn run(mut self) {
        debug!("Relay started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        debug!("Relay stopped");
    }

    fn handle(&mut self, command: RelayCommand) {
        let emptied = match command {
            RelayCommand::Connect { conn_id, sink } => {
                self.state.connect(conn_id, sink);
                None
            }
            RelayCommand::Event { conn_id, event } => match event {
                InboundEvent::Join(join) => self.state.join(conn_id, join),
                InboundEvent::Draw(payload) => {
                    self.state.draw(conn_id, payload);
                    None
                }
                InboundEvent::Clear => {
                    self.state.clear(conn_id);
                    None
                }
                InboundEvent::Unknown(kind) => {
                    debug!(%conn_id, kind = %kind, "Unknown message type, ignoring");
                    None
                }
            },
            RelayCommand::Disconnect { conn_id } => self.state.disconnect(conn_id),
            RelayCommand::Reclaim { room_id } => {
                self.state.reclaim(&room_id);
                None
            }
            RelayCommand::RoomStatus { room_id, reply } => {
                let _ = reply.send(self.state.registry().lookup(&room_id));
                None
            }
            RelayCommand::Stats { reply } => {
                let _ = reply.send(self.state.stats());
                None
            }
        };

        if let Some(room_id) = emptied {
            self.schedule_reclaim(room_id);
        }
    }

    /// Re-check the room after the reclaim delay. Not cancelable: the check
    /// at fire time keeps rooms that gained members in the meantime.
    fn schedule_reclaim(&self, room_id: String) {
        debug!(
            room_id = %room_id,
            after_secs = self.reclaim_after.as_secs(),
            "Scheduling room reclamation"
        );
        let timer_tx = self.timer_tx.clone();
        let delay = self.reclaim_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(RelayCommand::Reclaim { room_id });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use crate::error::SinkClosed;

    /// Sink that records every frame it accepts.
    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Value> {
            self.frames
                .lock()
                .unwrap()
                .drain(..)
                .map(|f| serde_json::from_str(&f).unwrap())
                .collect()
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl ClientSink for RecordingSink {
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn send_frame(&self, frame: String) -> Result<(), SinkClosed> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    /// Sink whose sends always fail even though it claims to be open.
    struct FailingSink;

    impl ClientSink for FailingSink {
        fn is_open(&self) -> bool {
            true
        }

        fn send_frame(&self, _frame: String) -> Result<(), SinkClosed> {
            Err(SinkClosed)
        }
    }

    fn connect(state: &mut RelayState) -> (ConnectionId, Arc<RecordingSink>) {
        let conn_id = ConnectionId::new();
        let sink = Arc::new(RecordingSink::default());
        state.connect(conn_id, sink.clone());
        (conn_id, sink)
    }

    fn join(room_id: &str) -> JoinRoom {
        JoinRoom {
            room_id: room_id.into(),
            is_creating: false,
        }
    }

    fn draw(x: i64, y: i64) -> DrawPayload {
        DrawPayload::new(json!({"type": "draw", "x": x, "y": y}))
    }

    #[test]
    fn test_join_sends_history_then_count() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);

        assert!(state.join(a, join("abc")).is_none());

        assert_eq!(
            sink_a.take(),
            vec![
                json!({"type": "drawHistory", "history": []}),
                json!({"type": "userCount", "count": 1}),
            ]
        );
        assert_eq!(state.room_of(&a), Some("abc"));
    }

    #[test]
    fn test_join_creates_room_once() {
        let mut state = RelayState::new(None);
        let conns: Vec<_> = (0..5).map(|_| connect(&mut state)).collect();
        for (conn_id, _) in &conns {
            let _ = state.join(*conn_id, join("fresh"));
        }

        assert_eq!(state.registry().len(), 1);
        assert_eq!(state.registry().lookup("fresh").unwrap().user_count, 5);
    }

    #[test]
    fn test_example_scenario() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let (b, sink_b) = connect(&mut state);

        let _ = state.join(a, join("abc"));
        sink_a.take();

        let _ = state.join(b, join("abc"));
        assert_eq!(
            sink_b.take(),
            vec![
                json!({"type": "drawHistory", "history": []}),
                json!({"type": "userCount", "count": 2}),
            ]
        );
        assert_eq!(sink_a.take(), vec![json!({"type": "userCount", "count": 2})]);

        state.draw(a, draw(1, 2));
        assert!(sink_a.take().is_empty());
        assert_eq!(sink_b.take(), vec![json!({"type": "draw", "x": 1, "y": 2})]);
        assert_eq!(state.registry().get("abc").unwrap().history(), &[draw(1, 2)]);

        assert!(state.disconnect(b).is_none());
        assert_eq!(sink_a.take(), vec![json!({"type": "userCount", "count": 1})]);
        assert!(sink_b.take().is_empty());
        assert_eq!(state.registry().lookup("abc").unwrap().user_count, 1);
    }

    #[test]
    fn test_history_replayed_in_order() {
        let mut state = RelayState::new(None);
        let (a, _sink_a) = connect(&mut state);
        let _ = state.join(a, join("abc"));
        for i in 0..3 {
            state.draw(a, draw(i, i));
        }

        let (c, sink_c) = connect(&mut state);
        let _ = state.join(c, join("abc"));
        state.draw(a, draw(9, 9));

        assert_eq!(
            sink_c.take(),
            vec![
                json!({"type": "drawHistory", "history": [
                    {"type": "draw", "x": 0, "y": 0},
                    {"type": "draw", "x": 1, "y": 1},
                    {"type": "draw", "x": 2, "y": 2},
                ]}),
                json!({"type": "userCount", "count": 2}),
                json!({"type": "draw", "x": 9, "y": 9}),
            ]
        );
    }

    #[test]
    fn test_clear_is_inclusive_and_destructive() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let (b, sink_b) = connect(&mut state);
        let _ = state.join(a, join("abc"));
        let _ = state.join(b, join("abc"));
        state.draw(b, draw(1, 1));
        sink_a.take();
        sink_b.take();

        state.clear(a);
        assert_eq!(sink_a.take(), vec![json!({"type": "clear"})]);
        assert_eq!(sink_b.take(), vec![json!({"type": "clear"})]);

        let (c, sink_c) = connect(&mut state);
        let _ = state.join(c, join("abc"));
        assert_eq!(sink_c.take()[0], json!({"type": "drawHistory", "history": []}));
    }

    #[test]
    fn test_draw_and_clear_without_room_are_noops() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let (b, sink_b) = connect(&mut state);
        let _ = state.join(b, join("abc"));
        sink_b.take();

        state.draw(a, draw(1, 1));
        state.clear(a);

        assert!(sink_a.take().is_empty());
        assert!(sink_b.take().is_empty());
        assert!(state.registry().get("abc").unwrap().history().is_empty());
    }

    #[test]
    fn test_events_from_unknown_connection_are_ignored() {
        let mut state = RelayState::new(None);
        let stranger = ConnectionId::new();

        assert!(state.join(stranger, join("abc")).is_none());
        state.draw(stranger, draw(1, 1));
        assert!(state.disconnect(stranger).is_none());
        assert!(state.registry().is_empty());
    }

    #[test]
    fn test_last_member_leaving_reports_empty_room() {
        let mut state = RelayState::new(None);
        let (a, _sink_a) = connect(&mut state);
        let _ = state.join(a, join("abc"));

        assert_eq!(state.disconnect(a), Some("abc".to_string()));
        // The room stays until reclaimed.
        assert_eq!(state.registry().lookup("abc").unwrap().user_count, 0);
        assert_eq!(state.stats().connections, 0);

        assert!(state.reclaim("abc"));
        assert!(state.registry().lookup("abc").is_none());
    }

    #[test]
    fn test_reclaim_keeps_rejoined_room() {
        let mut state = RelayState::new(None);
        let (a, _sink_a) = connect(&mut state);
        let _ = state.join(a, join("abc"));
        let _ = state.disconnect(a);

        let (b, _sink_b) = connect(&mut state);
        let _ = state.join(b, join("abc"));

        assert!(!state.reclaim("abc"));
        assert_eq!(state.registry().lookup("abc").unwrap().user_count, 1);
    }

    #[test]
    fn test_rejoin_other_room_leaves_previous() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let (b, sink_b) = connect(&mut state);
        let _ = state.join(a, join("one"));
        let _ = state.join(b, join("one"));
        sink_a.take();
        sink_b.take();

        assert!(state.join(a, join("two")).is_none());
        assert_eq!(sink_b.take(), vec![json!({"type": "userCount", "count": 1})]);
        assert_eq!(state.room_of(&a), Some("two"));
        assert!(!state.registry().get("one").unwrap().contains(&a));

        // Draws now go to the new room only.
        state.draw(b, draw(1, 1));
        assert!(!sink_a.take().iter().any(|f| f["type"] == "draw"));

        assert_eq!(state.join(b, join("two")), Some("one".to_string()));
    }

    #[test]
    fn test_rejoin_same_room_resends_snapshot() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let _ = state.join(a, join("abc"));
        state.draw(a, draw(1, 1));
        sink_a.take();

        assert!(state.join(a, join("abc")).is_none());
        assert_eq!(
            sink_a.take(),
            vec![
                json!({"type": "drawHistory", "history": [{"type": "draw", "x": 1, "y": 1}]}),
                json!({"type": "userCount", "count": 1}),
            ]
        );
    }

    #[test]
    fn test_broadcast_skips_closed_and_failing_sinks() {
        let mut state = RelayState::new(None);
        let (a, sink_a) = connect(&mut state);
        let (b, sink_b) = connect(&mut state);
        let failing = ConnectionId::new();
        state.connect(failing, Arc::new(FailingSink));
        let (c, sink_c) = connect(&mut state);

        for conn_id in [a, b, failing, c] {
            let _ = state.join(conn_id, join("abc"));
        }
        sink_a.take();
        sink_b.take();
        sink_c.take();

        sink_b.close();
        state.draw(a, draw(5, 5));

        assert!(sink_b.take().is_empty());
        assert_eq!(sink_c.take(), vec![json!({"type": "draw", "x": 5, "y": 5})]);
    }

    #[test]
    fn test_history_cap() {
        let mut state = RelayState::new(Some(2));
        let (a, _sink_a) = connect(&mut state);
        let _ = state.join(a, join("abc"));
        for i in 0..4 {
            state.draw(a, draw(i, 0));
        }

        assert_eq!(
            state.registry().get("abc").unwrap().history(),
            &[draw(2, 0), draw(3, 0)]
        );
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let relay = Relay::spawn(RelaySettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let a = ConnectionId::new();

        relay.connect(a, Arc::new(tx)).unwrap();
        relay.dispatch(a, InboundEvent::Join(join("abc"))).unwrap();
        relay.dispatch(a, InboundEvent::Unknown("cursor".into())).unwrap();

        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"drawHistory","history":[]}"#);
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"userCount","count":1}"#);

        assert_eq!(
            relay.room_status("abc").await.unwrap(),
            Some(RoomStatus {
                user_count: 1,
                draw_history_length: 0,
            })
        );
        assert_eq!(
            relay.stats().await.unwrap(),
            RelayStats {
                active_rooms: 1,
                connections: 1,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_joins_create_one_room() {
        let relay = Relay::spawn(RelaySettings::default());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                let (tx, rx) = mpsc::unbounded_channel::<String>();
                let conn_id = ConnectionId::new();
                relay.connect(conn_id, Arc::new(tx)).unwrap();
                relay
                    .dispatch(conn_id, InboundEvent::Join(join("race")))
                    .unwrap();
                rx
            }));
        }
        let mut receivers = Vec::new();
        for task in tasks {
            receivers.push(task.await.unwrap());
        }

        let stats = relay.stats().await.unwrap();
        assert_eq!(stats.active_rooms, 1);
        assert_eq!(relay.room_status("race").await.unwrap().unwrap().user_count, 16);
        drop(receivers);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_reclaimed_after_delay() {
        let relay = Relay::spawn(RelaySettings {
            reclaim_after: Duration::from_secs(60),
            max_history: None,
        });
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let a = ConnectionId::new();
        relay.connect(a, Arc::new(tx)).unwrap();
        relay.dispatch(a, InboundEvent::Join(join("abc"))).unwrap();
        relay.disconnect(a).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(relay.room_status("abc").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(relay.room_status("abc").await.unwrap().is_none());
        assert_eq!(relay.stats().await.unwrap().active_rooms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_during_delay_keeps_room() {
        let relay = Relay::spawn(RelaySettings::default());
        let (tx_a, _rx_a) = mpsc::unbounded_channel::<String>();
        let (tx_b, _rx_b) = mpsc::unbounded_channel::<String>();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        relay.connect(a, Arc::new(tx_a)).unwrap();
        relay.connect(b, Arc::new(tx_b)).unwrap();

        relay.dispatch(a, InboundEvent::Join(join("abc"))).unwrap();
        relay.disconnect(a).unwrap();

        tokio::time::sleep(Duration::from_secs(1800)).await;
        relay.dispatch(b, InboundEvent::Join(join("abc"))).unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(
            relay.room_status("abc").await.unwrap(),
            Some(RoomStatus {
                user_count: 1,
                draw_history_length: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_relay_stops_when_handles_dropped() {
        let relay = Relay::spawn(RelaySettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let a = ConnectionId::new();
        relay.connect(a, Arc::new(tx)).unwrap();
        drop(relay);

        // The relay drops the session sinks once it stops.
        assert!(rx.recv().await.is_none());
    }
}
