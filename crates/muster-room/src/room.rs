//! Room actor: an isolated tokio task that owns one game session.
//!
//! Each room runs in its own task and is driven through an mpsc
//! command mailbox: no shared mutable state, just message passing.
//! Processing one command at a time is also what serializes the join
//! sequence: the spawn wait and settle delay happen *inside* command
//! processing, so a second join for the same room cannot interleave
//! with one that is still suspended.

use std::future::Future;
use std::pin::Pin;

use futures_util::future;
use muster_protocol::{
    ClientId, DisconnectReason, GameCode, GameOverReason, GamePayload, GameSettings, HostId,
    Packet, RootMessage,
};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::config::SPAWN_SETTLE;
use crate::{
    Directory, GameState, Link, Members, PlayerEvent, RoomConfig, RoomError, Roster,
};

/// Command mailbox depth. Senders wait when the room falls behind.
const COMMAND_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// GameDataBatch
// ---------------------------------------------------------------------------

/// Game-data payloads for one broadcast.
pub enum GameDataBatch {
    /// No game data; protocol payloads only.
    None,

    /// The same payloads for every recipient.
    Fixed(Vec<GamePayload>),

    /// Payloads derived per recipient, for instructions that reference
    /// each client's own identity.
    PerClient(Box<dyn Fn(ClientId) -> Vec<GamePayload> + Send + Sync>),
}

impl GameDataBatch {
    fn for_client(&self, client: ClientId) -> Vec<GamePayload> {
        match self {
            Self::None => Vec::new(),
            Self::Fixed(payloads) => payloads.clone(),
            Self::PerClient(make) => make(client),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and snapshots
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its mailbox.
pub(crate) enum RoomCommand<L> {
    Join {
        link: L,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        client: ClientId,
        reason: DisconnectReason,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Start {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    End {
        reason: GameOverReason,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SetCode {
        code: GameCode,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Broadcast {
        data: GameDataBatch,
        reliable: bool,
        recipient: Option<ClientId>,
        payloads: Vec<RootMessage>,
        reply: oneshot::Sender<()>,
    },
    Destroy {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: GameCode,
    pub state: GameState,
    pub host: HostId,
    /// Number of admitted members.
    pub members: usize,
    /// Number of clients parked in the waiting room.
    pub waiting: usize,
    pub saah: bool,
    pub settings: GameSettings,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: just an `mpsc::Sender` wrapper. Once the actor has
/// stopped (the room was destroyed), every operation resolves to
/// [`RoomError::Unavailable`].
pub struct RoomHandle<L: Link> {
    sender: mpsc::Sender<RoomCommand<L>>,
}

impl<L: Link> Clone for RoomHandle<L> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<L: Link> RoomHandle<L> {
    async fn request<T>(
        &self,
        cmd: RoomCommand<L>,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }

    /// Admits a connection to the room. Resolves once the join has
    /// fully completed, including the spawn wait and settle delay.
    pub async fn join(&self, link: L) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::Join { link, reply }, reply_rx)
            .await?
    }

    /// Removes a client, transferring host and destroying the room if
    /// it was the last one.
    pub async fn leave(
        &self,
        client: ClientId,
        reason: DisconnectReason,
    ) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            RoomCommand::Leave {
                client,
                reason,
                reply,
            },
            reply_rx,
        )
        .await?
    }

    /// Starts the game. Legal only in `NotStarted`.
    pub async fn start(&self) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::Start { reply }, reply_rx).await?
    }

    /// Ends the game. Legal only in `Started`.
    pub async fn end(&self, reason: GameOverReason) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::End { reason, reply }, reply_rx)
            .await?
    }

    /// Assigns or changes the room code and announces it to members.
    pub async fn set_code(&self, code: GameCode) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::SetCode { code, reply }, reply_rx)
            .await?
    }

    /// Fans out game data and/or protocol payloads.
    ///
    /// With a `recipient`, game data is scoped to that client; without
    /// one, every member gets its own envelope. Resolves once every
    /// per-member send has resolved or failed; individual failures are
    /// isolated per connection.
    pub async fn broadcast(
        &self,
        data: GameDataBatch,
        reliable: bool,
        recipient: Option<ClientId>,
        payloads: Vec<RootMessage>,
    ) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            RoomCommand::Broadcast {
                data,
                reliable,
                recipient,
                payloads,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Tears the room down. A second call is rejected.
    pub async fn destroy(&self) -> Result<(), RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::Destroy { reply }, reply_rx)
            .await?
    }

    /// Requests the current room snapshot.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(RoomCommand::GetInfo { reply }, reply_rx).await
    }
}

// ---------------------------------------------------------------------------
// Host-update targeting
// ---------------------------------------------------------------------------

/// Targeting mode for the host-update notification.
///
/// `Everyone` is a broadcast token, not a host identity: it exists
/// only here, so it can never be stored as the room's host.
enum HostUpdateTarget {
    /// Point every member at this client's host authority.
    Client(ClientId),

    /// Address every member individually: each is named as the joining
    /// identity and then synthetically self-removed, re-pointing its
    /// host indirection at the server.
    Everyone,
}

// ---------------------------------------------------------------------------
// The room actor
// ---------------------------------------------------------------------------

struct Room<L: Link, R: Roster, D: Directory> {
    code: GameCode,
    state: GameState,
    settings: GameSettings,
    saah: bool,
    host: HostId,
    members: Members<L>,
    /// Connections that tried to join after the game ended, held until
    /// the host returns and reopens the lobby.
    waiting: Members<L>,
    roster: R,
    directory: D,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    receiver: mpsc::Receiver<RoomCommand<L>>,
}

impl<L: Link, R: Roster, D: Directory> Room<L, R, D> {
    async fn run(mut self) {
        tracing::info!(saah = self.saah, "room opened");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd).await;
                    if self.state.is_destroyed() {
                        break;
                    }
                }
                Some(event) = self.events.recv() => self.observe(event),
            }
        }

        tracing::debug!("room task stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand<L>) {
        match cmd {
            RoomCommand::Join { link, reply } => {
                let result = self.handle_join(link).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                client,
                reason,
                reply,
            } => {
                let result = self.handle_leave(client, reason).await;
                let _ = reply.send(result);
            }
            RoomCommand::Start { reply } => {
                let result = self.handle_start().await;
                let _ = reply.send(result);
            }
            RoomCommand::End { reason, reply } => {
                let result = self.handle_end(reason).await;
                let _ = reply.send(result);
            }
            RoomCommand::SetCode { code, reply } => {
                let result = self.set_code(code).await;
                let _ = reply.send(result);
            }
            RoomCommand::Broadcast {
                data,
                reliable,
                recipient,
                payloads,
                reply,
            } => {
                self.broadcast(&data, reliable, recipient, payloads).await;
                let _ = reply.send(());
            }
            RoomCommand::Destroy { reply } => {
                let result = self.destroy().await;
                let _ = reply.send(result);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
        }
    }

    // -- Join / leave -----------------------------------------------------

    fn handle_join(
        &mut self,
        link: L,
    ) -> Pin<Box<dyn Future<Output = Result<(), RoomError>> + Send + '_>> {
        Box::pin(async move {
        let client = link.client_id();
        let player = self.roster.register_join(client);

        // first join claims host, unless the server holds it
        if self.host == HostId::Nobody && !self.saah {
            self.set_host(HostId::Client(client)).await?;
        }

        if self.state == GameState::Ended {
            self.broadcast(
                &GameDataBatch::None,
                true,
                None,
                vec![RootMessage::PeerJoined {
                    code: self.code,
                    client,
                    host: self.host,
                }],
            )
            .await;

            if self.host == HostId::Client(client) {
                self.reopen_lobby(client).await;
            } else {
                // the lobby stays closed until the host returns
                let packet = Packet::Reliable {
                    nonce: link.next_nonce(),
                    payloads: vec![RootMessage::WaitForHost {
                        code: self.code,
                        client,
                    }],
                };
                if let Err(error) = link.send(packet).await {
                    tracing::warn!(client = %client, %error, "frame dropped: client unreachable");
                }
                self.waiting.add(client, link);
                tracing::info!(client = %client, "client parked in waiting room");
                return Ok(());
            }
        }

        if self.saah {
            self.set_host(HostId::Server).await?;
        }

        // the joined confirmation lists membership including the new client
        let mut member_ids = self.members.ids();
        member_ids.push(client);
        let confirm = Packet::Reliable {
            nonce: link.next_nonce(),
            payloads: vec![RootMessage::GameJoined {
                code: self.code,
                client,
                host: self.host,
                members: member_ids,
            }],
        };
        if let Err(error) = link.send(confirm).await {
            tracing::warn!(client = %client, %error, "frame dropped: client unreachable");
        }

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::PeerJoined {
                code: self.code,
                client,
                host: self.host,
            }],
        )
        .await;

        self.members.add(client, link);

        self.wait_for_spawn(client).await;
        tokio::time::sleep(SPAWN_SETTLE).await;

        if self.saah {
            self.set_host(HostId::Server).await?;
        }

        tracing::info!(client = %client, name = ?player.name, "client joined the game");
        Ok(())
        })
    }

    /// Host rejoin after a finished game: reopen the lobby for the
    /// clients held in the waiting room.
    async fn reopen_lobby(&mut self, rejoining: ClientId) {
        self.state = GameState::NotStarted;

        // members from the ended game must rejoin fresh
        let waiting = &self.waiting;
        self.members.retain(|client, _| waiting.contains(client));

        for (client, link) in self.waiting.drain() {
            self.members.add(client, link);
        }

        // each promoted client gets the full joined confirmation,
        // listing membership including the rejoining host
        let mut member_ids = self.members.ids();
        member_ids.push(rejoining);

        let code = self.code;
        let host = self.host;
        let sends = self.members.iter().map(|(client, link)| {
            let client = *client;
            let members = member_ids.clone();
            async move {
                let packet = Packet::Reliable {
                    nonce: link.next_nonce(),
                    payloads: vec![RootMessage::GameJoined {
                        code,
                        client,
                        host,
                        members,
                    }],
                };
                if let Err(error) = link.send(packet).await {
                    tracing::warn!(client = %client, %error, "frame dropped: client unreachable");
                }
            }
        });
        future::join_all(sends).await;

        tracing::info!(promoted = self.members.len(), "lobby reopened");
    }

    async fn handle_leave(
        &mut self,
        client: ClientId,
        reason: DisconnectReason,
    ) -> Result<(), RoomError> {
        self.roster.register_leave(client);
        self.members.remove(&client);
        // a waiting client that disconnects must not be promoted later
        self.waiting.remove(&client);

        if self.members.is_empty() {
            return self.destroy().await;
        }

        self.transfer_host().await?;

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::PeerRemoved {
                code: self.code,
                client,
                reason,
                host: self.host,
            }],
        )
        .await;

        tracing::info!(client = %client, reason = ?reason, "client left or was removed");
        Ok(())
    }

    // -- Host authority ---------------------------------------------------

    /// Re-seats host authority after a leave. Any deterministic pick
    /// works; this takes the first entry of the player roster. In
    /// server-as-host rooms the server keeps the seat.
    async fn transfer_host(&mut self) -> Result<(), RoomError> {
        if self.saah {
            return Ok(());
        }
        let Some(next) = self.roster.players().first().map(|p| p.client) else {
            return Ok(());
        };
        self.set_host(HostId::Client(next)).await
    }

    async fn set_host(&mut self, host: HostId) -> Result<(), RoomError> {
        if host == HostId::Server && !self.saah {
            return Err(RoomError::ServerHostDisabled);
        }
        self.host = host;

        if let HostId::Client(client) = host {
            if self.state == GameState::Ended {
                if let Some(link) = self.waiting.remove(&client) {
                    // the new host was parked in the waiting room:
                    // complete its join before returning
                    self.handle_join(link).await?;
                }
            }
        }

        tracing::info!(host = %self.describe_host(), "host changed");

        match host {
            HostId::Client(client) => {
                self.update_host(HostUpdateTarget::Client(client)).await;
            }
            HostId::Server => {
                self.update_host(HostUpdateTarget::Everyone).await;
            }
            HostId::Nobody => {}
        }
        Ok(())
    }

    /// Emits the host-update notification: a joined/removed pair that
    /// re-points each recipient's host indirection.
    async fn update_host(&self, target: HostUpdateTarget) {
        match target {
            HostUpdateTarget::Client(client) => {
                let host = HostId::Client(client);
                self.broadcast(
                    &GameDataBatch::None,
                    true,
                    None,
                    vec![
                        RootMessage::PeerJoined {
                            code: self.code,
                            client,
                            host,
                        },
                        RootMessage::PeerRemoved {
                            code: self.code,
                            client,
                            reason: DisconnectReason::None,
                            host,
                        },
                    ],
                )
                .await;
            }
            HostUpdateTarget::Everyone => {
                let code = self.code;
                let sends = self.members.iter().map(|(client, link)| {
                    let client = *client;
                    let payloads = vec![
                        RootMessage::PeerJoined {
                            code,
                            client,
                            host: HostId::Server,
                        },
                        RootMessage::PeerRemoved {
                            code,
                            client,
                            reason: DisconnectReason::None,
                            host: HostId::Server,
                        },
                    ];
                    async move {
                        self.send_frame(client, link, true, payloads).await;
                    }
                });
                future::join_all(sends).await;
            }
        }
    }

    // -- Lifecycle --------------------------------------------------------

    async fn handle_start(&mut self) -> Result<(), RoomError> {
        if !self.state.can_transition_to(GameState::Started) {
            return Err(RoomError::InvalidState(format!(
                "cannot start a game in state {}",
                self.state
            )));
        }
        self.state = GameState::Started;

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::GameStarted { code: self.code }],
        )
        .await;

        tracing::info!("game started");
        Ok(())
    }

    async fn handle_end(&mut self, reason: GameOverReason) -> Result<(), RoomError> {
        if !self.state.can_transition_to(GameState::Ended) {
            return Err(RoomError::InvalidState(format!(
                "cannot end a game in state {}",
                self.state
            )));
        }
        self.waiting.clear();
        self.state = GameState::Ended;

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::GameEnded {
                code: self.code,
                reason,
                should_close: false,
            }],
        )
        .await;

        tracing::info!(reason = ?reason, "game ended");
        Ok(())
    }

    async fn set_code(&mut self, code: GameCode) -> Result<(), RoomError> {
        // the first assignment is silent
        if self.code.is_set() {
            tracing::info!(code = %code, "game code changed");
        }
        self.code = code;
        tracing::Span::current().record("code", tracing::field::display(code));

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::RoomCodeSet { code }],
        )
        .await;

        Ok(())
    }

    async fn destroy(&mut self) -> Result<(), RoomError> {
        if self.state.is_destroyed() {
            return Err(RoomError::Destroyed);
        }

        self.broadcast(
            &GameDataBatch::None,
            true,
            None,
            vec![RootMessage::RoomRemoved {
                reason: DisconnectReason::Destroy,
            }],
        )
        .await;

        self.state = GameState::Destroyed;
        self.directory.unregister(self.code);

        // best effort: every in-memory effect above stands regardless
        let purge = self
            .directory
            .remove_record(&format!("room.{}", self.code))
            .await;
        if let Err(error) = &purge {
            tracing::warn!(%error, "durable room record could not be removed");
        }

        tracing::info!("room destroyed");

        purge.map_err(|e| RoomError::Storage(e.to_string()))
    }

    // -- Broadcast engine -------------------------------------------------

    /// Fans out game data and/or protocol payloads.
    ///
    /// Empty envelopes are suppressed, an absent recipient is a silent
    /// no-op, and per-member sends run concurrently with failures
    /// isolated per connection.
    async fn broadcast(
        &self,
        data: &GameDataBatch,
        reliable: bool,
        recipient: Option<ClientId>,
        payloads: Vec<RootMessage>,
    ) {
        match recipient {
            Some(target) => {
                let Some(link) = self.members.get(&target) else {
                    return;
                };
                let game = data.for_client(target);
                let mut children = Vec::with_capacity(payloads.len() + 1);
                if !game.is_empty() {
                    children.push(RootMessage::GameDataTo {
                        code: self.code,
                        target,
                        payloads: game,
                    });
                }
                children.extend(payloads);
                if children.is_empty() {
                    return;
                }
                self.send_frame(target, link, reliable, children).await;
            }
            None => {
                let sends = self.members.iter().map(|(client, link)| {
                    let client = *client;
                    let game = data.for_client(client);
                    let mut children = Vec::with_capacity(payloads.len() + 1);
                    if !game.is_empty() {
                        children.push(RootMessage::GameData {
                            code: self.code,
                            payloads: game,
                        });
                    }
                    children.extend(payloads.iter().cloned());
                    async move {
                        if children.is_empty() {
                            return;
                        }
                        self.send_frame(client, link, reliable, children).await;
                    }
                });
                future::join_all(sends).await;
            }
        }
    }

    async fn send_frame(
        &self,
        client: ClientId,
        link: &L,
        reliable: bool,
        payloads: Vec<RootMessage>,
    ) {
        let packet = if reliable {
            Packet::Reliable {
                nonce: link.next_nonce(),
                payloads,
            }
        } else {
            Packet::Unreliable { payloads }
        };
        if let Err(error) = link.send(packet).await {
            tracing::warn!(client = %client, %error, "frame dropped: client unreachable");
        }
    }

    // -- Observation ------------------------------------------------------

    /// Blocks the room on the joining player's spawn signal. Other
    /// player events keep being observed while we wait.
    async fn wait_for_spawn(&mut self, client: ClientId) {
        loop {
            match self.events.recv().await {
                Some(PlayerEvent::SpawnComplete { client: spawned }) if spawned == client => {
                    break;
                }
                Some(event) => self.observe(event),
                None => {
                    tracing::warn!(client = %client, "player event feed closed before spawn");
                    break;
                }
            }
        }
    }

    fn observe(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::NameChanged { client, name } => {
                tracing::info!(player = %self.display_name(client), %name, "player set their name");
            }
            PlayerEvent::ColorChanged { client, color } => {
                tracing::info!(player = %self.display_name(client), color = ?color, "player set their color");
            }
            PlayerEvent::SpawnComplete { client } => {
                tracing::debug!(client = %client, "spawn signal with no join in flight");
            }
        }
    }

    fn describe_host(&self) -> String {
        match self.host {
            HostId::Client(client) => self.display_name(client),
            other => other.to_string(),
        }
    }

    fn display_name(&self, client: ClientId) -> String {
        let name = self
            .roster
            .players()
            .into_iter()
            .find(|p| p.client == client)
            .and_then(|p| p.name);
        match name {
            Some(name) => format!("{name} ({client})"),
            None => client.to_string(),
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code,
            state: self.state,
            host: self.host,
            members: self.members.len(),
            waiting: self.waiting.len(),
            saah: self.saah,
            settings: self.settings.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Spawns a room actor and returns the handle to drive it.
///
/// Called by the external owner after reserving a code; registering
/// the room under that code is the owner's side of the bargain, and
/// the room calls [`Directory::unregister`] on destroy. `events` is
/// the player layer's observer feed.
pub fn spawn_room<L, R, D>(
    code: GameCode,
    config: RoomConfig,
    roster: R,
    directory: D,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
) -> RoomHandle<L>
where
    L: Link,
    R: Roster,
    D: Directory,
{
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);

    let host = if config.saah {
        HostId::Server
    } else {
        HostId::Nobody
    };

    let room = Room {
        code,
        state: GameState::NotStarted,
        settings: config.settings,
        saah: config.saah,
        host,
        members: Members::new(),
        waiting: Members::new(),
        roster,
        directory,
        events,
        receiver,
    };

    let span = tracing::info_span!("room", code = %code);
    tokio::spawn(room.run().instrument(span));

    RoomHandle { sender }
}
