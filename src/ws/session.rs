//! Per-connection session: routes client messages into the room manager
//! and forwards the joined room's snapshots to the connection

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::game::ConnectionId;
use crate::rooms::{Room, RoomManager};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Active subscription to a room's broadcasts
struct Subscription {
    room: Arc<Room>,
    forwarder: JoinHandle<()>,
}

/// Session state for one connection
pub struct Session {
    id: ConnectionId,
    manager: Arc<RoomManager>,
    outbound: mpsc::Sender<ServerMsg>,
    subscription: Option<Subscription>,
}

impl Session {
    pub fn new(
        id: ConnectionId,
        manager: Arc<RoomManager>,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Self {
        Self {
            id,
            manager,
            outbound,
            subscription: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the connection is attached to a room
    pub fn in_room(&self) -> bool {
        self.subscription.is_some()
    }

    /// Handle one inbound client message
    pub async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateRoom => {
                let code = self.manager.create_room();
                self.reply(ServerMsg::RoomCreated { code }).await;
            }
            ClientMsg::JoinRoom { code } => {
                let reply = match self.manager.join_room(&code, self.id) {
                    Ok(room) => {
                        self.subscribe(room);
                        ServerMsg::JoinRoomResult {
                            success: true,
                            message: None,
                        }
                    }
                    Err(e) => {
                        debug!(connection_id = %self.id, code = %code, error = %e, "joinRoom rejected");
                        ServerMsg::JoinRoomResult {
                            success: false,
                            message: Some(e.to_string()),
                        }
                    }
                };
                self.reply(reply).await;
            }
            ClientMsg::Join { code } => match self.manager.join_game(&code, self.id) {
                Ok(outcome) => {
                    if outcome.already_joined {
                        debug!(connection_id = %self.id, code = %code, "Repeated join, resending init");
                    }
                    self.subscribe(outcome.room);
                    self.reply(ServerMsg::JoinResult {
                        success: true,
                        message: None,
                    })
                    .await;

                    let config = self.manager.game_config();
                    let init = ServerMsg::GameInit {
                        width: config.arena_width,
                        height: config.arena_height,
                        player_id: outcome.player.id,
                    };
                    self.reply(init).await;
                }
                Err(e) => {
                    debug!(connection_id = %self.id, code = %code, error = %e, "join rejected");
                    self.reply(ServerMsg::JoinResult {
                        success: false,
                        message: Some(e.to_string()),
                    })
                    .await;
                }
            },
            ClientMsg::Input { code, input } => {
                // Late input after a leave or disconnect is expected
                if let Err(e) = self.manager.apply_input(&code, self.id, &input) {
                    debug!(connection_id = %self.id, code = %code, error = %e, "Input dropped");
                }
            }
            ClientMsg::Respawn { code } => {
                if !self.manager.respawn(self.id) {
                    debug!(connection_id = %self.id, code = %code, "Respawn ignored");
                }
            }
            ClientMsg::LeaveRoom { code } => {
                self.manager.leave(&code, self.id);
                let leaving_current = self
                    .subscription
                    .as_ref()
                    .map(|s| s.room.code.eq_ignore_ascii_case(code.trim()))
                    .unwrap_or(false);
                if leaving_current {
                    self.unsubscribe();
                }
            }
            ClientMsg::Ping { t } => {
                self.reply(ServerMsg::Pong { t }).await;
            }
        }
    }

    /// Transport-level disconnect
    pub fn disconnect(mut self) {
        self.unsubscribe();
        if self.manager.on_disconnect(self.id) {
            info!(connection_id = %self.id, "Disconnected player removed");
        }
    }

    /// Start forwarding a room's snapshots, replacing any previous room
    fn subscribe(&mut self, room: Arc<Room>) {
        if let Some(current) = &self.subscription {
            if Arc::ptr_eq(&current.room, &room) {
                return;
            }
        }
        self.unsubscribe();

        let forwarder = tokio::spawn(forward_snapshots(
            self.id,
            room.subscribe(),
            self.outbound.clone(),
        ));
        self.subscription = Some(Subscription { room, forwarder });
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.forwarder.abort();
        }
    }

    async fn reply(&self, msg: ServerMsg) {
        if self.outbound.send(msg).await.is_err() {
            debug!(connection_id = %self.id, "Outbound channel closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Copy room broadcasts into a connection's outbound queue
async fn forward_snapshots(
    connection_id: ConnectionId,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    outbound: mpsc::Sender<ServerMsg>,
) {
    loop {
        match snapshot_rx.recv().await {
            Ok(msg) => {
                if outbound.send(msg).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    connection_id = %connection_id,
                    lagged_count = n,
                    "Client lagged, skipping {} snapshots", n
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(connection_id = %connection_id, "Room broadcast closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, RoomConfig};
    use crate::ws::protocol::DirectionalInput;
    use uuid::Uuid;

    fn setup() -> (Arc<RoomManager>, Session, mpsc::Receiver<ServerMsg>) {
        let manager = Arc::new(RoomManager::new(
            GameConfig::default(),
            RoomConfig::default(),
        ));
        let (tx, rx) = mpsc::channel(64);
        let session = Session::new(Uuid::new_v4(), manager.clone(), tx);
        (manager, session, rx)
    }

    async fn create_room(session: &mut Session, rx: &mut mpsc::Receiver<ServerMsg>) -> String {
        session.handle(ClientMsg::CreateRoom).await;
        match rx.recv().await {
            Some(ServerMsg::RoomCreated { code }) => code,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_join_room_and_join_flow() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;

        session.handle(ClientMsg::JoinRoom { code: code.clone() }).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMsg::JoinRoomResult { success: true, .. })
        ));
        assert!(session.in_room());

        session.handle(ClientMsg::Join { code: code.clone() }).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMsg::JoinResult { success: true, .. })
        ));
        match rx.recv().await {
            Some(ServerMsg::GameInit {
                width,
                height,
                player_id,
            }) => {
                assert_eq!((width, height), (800.0, 600.0));
                assert_eq!(player_id, session.id());
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(manager.player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn joining_twice_succeeds_without_duplicating() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;

        for _ in 0..2 {
            session.handle(ClientMsg::Join { code: code.clone() }).await;
            assert!(matches!(
                rx.recv().await,
                Some(ServerMsg::JoinResult { success: true, .. })
            ));
            assert!(matches!(rx.recv().await, Some(ServerMsg::GameInit { .. })));
        }
        assert_eq!(manager.player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn join_failure_is_reported() {
        let manager = Arc::new(RoomManager::new(
            GameConfig::default(),
            RoomConfig {
                auto_create: false,
                ..RoomConfig::default()
            },
        ));
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session::new(Uuid::new_v4(), manager, tx);

        session.handle(ClientMsg::Join { code: "MISSING".into() }).await;

        match rx.recv().await {
            Some(ServerMsg::JoinResult {
                success: false,
                message: Some(message),
            }) => assert!(message.contains("MISSING")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!session.in_room());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_reach_subscribed_connection() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;
        session.handle(ClientMsg::Join { code: code.clone() }).await;
        rx.recv().await;
        rx.recv().await;

        assert!(manager.get(&code).unwrap().tick());

        match rx.recv().await {
            Some(ServerMsg::GameState { players, .. }) => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, session.id());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn input_and_errors_are_fire_and_forget() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;
        let input = DirectionalInput {
            right: true,
            ..Default::default()
        };

        // Not yet a player, and an unknown room: both silently ignored
        session
            .handle(ClientMsg::Input { code: code.clone(), input })
            .await;
        session
            .handle(ClientMsg::Input { code: "ZZZZZZ".into(), input })
            .await;
        assert!(rx.try_recv().is_err());

        session.handle(ClientMsg::Join { code: code.clone() }).await;
        session
            .handle(ClientMsg::Input { code: code.clone(), input })
            .await;

        let vx = manager
            .get(&code)
            .unwrap()
            .with_state(|s| s.players[&session.id()].vx);
        assert_eq!(vx, 300.0);
    }

    #[tokio::test(start_paused = true)]
    async fn leave_room_removes_player_and_stops_snapshots() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;
        session.handle(ClientMsg::Join { code: code.clone() }).await;

        session.handle(ClientMsg::LeaveRoom { code: code.clone() }).await;

        assert!(!session.in_room());
        assert_eq!(manager.player_count(), 0);
        assert!(!manager.get(&code).unwrap().tick());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_removes_player() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;
        session.handle(ClientMsg::Join { code: code.clone() }).await;
        assert_eq!(manager.player_count(), 1);

        session.disconnect();

        assert_eq!(manager.player_count(), 0);
        assert!(manager.get(&code).unwrap().has_pending_cleanup());
    }

    #[tokio::test(start_paused = true)]
    async fn respawn_only_revives_dead_player() {
        let (manager, mut session, mut rx) = setup();
        let code = create_room(&mut session, &mut rx).await;
        session.handle(ClientMsg::Join { code: code.clone() }).await;
        let room = manager.get(&code).unwrap();
        let id = session.id();

        room.with_state(|s| s.players.get_mut(&id).unwrap().alive = false);
        session.handle(ClientMsg::Respawn { code: code.clone() }).await;

        assert!(room.with_state(|s| s.players[&id].alive));
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (_manager, mut session, mut rx) = setup();
        session.handle(ClientMsg::Ping { t: 42 }).await;
        assert!(matches!(rx.recv().await, Some(ServerMsg::Pong { t: 42 })));
    }
}
