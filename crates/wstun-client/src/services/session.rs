// ============================================
// File: crates/wstun-client/src/services/session.rs
// ============================================
//! # Session State Machine
//!
//! ## Creation Reason
//! Drives one tunnel session from the command stream: brings the
//! interface up on `init`, installs routes on `addroute`, and tears
//! everything down when the connection goes away.
//!
//! ## Main Functionality
//! - `Session`: all per-session state as fields of one value
//! - `SessionState`: lifecycle states
//! - `handle_frame`: state check, typed decode, exhaustive dispatch
//! - `run`: serve commands until the multiplexer closes, then tear down
//!
//! ## Session Lifecycle
//! ```text
//! ┌───────────┐  init   ┌──────────────┐  interface bound  ┌──────────┐
//! │ Connected │ ──────► │ Initializing │ ────────────────► │  Active  │◄─┐
//! └─────┬─────┘         └──────┬───────┘                   └────┬─────┘  │
//!       │                      │ setup failed (fatal)           │  addroute
//!       │                      ▼                                │        │
//!       │  connection closed  ┌─────────┐  connection closed    ├────────┘
//!       └───────────────────► │ Closing │ ◄─────────────────────┘
//!                             └────┬────┘
//!                                  │ down hook → withdraw routes → close
//!                                  ▼
//!                            ┌────────────┐
//!                            │ Terminated │
//!                            └────────────┘
//! ```
//!
//! ## Command Rules
//! | Command | Valid in | Wrong state | Failure |
//! |---------|----------|-------------|---------|
//! | `init` | Connected | protocol violation | fatal |
//! | `addroute` | Active | "Cannot addroute before init" | recoverable |
//! | registered | any | n/a | handler decides |
//! | unknown | n/a | protocol violation | n/a |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Commands are handled one at a time in arrival order; the up hook is
//!   the only thing `init` leaves running
//! - The down hook always runs before the interface is closed
//! - A failed `init` releases whatever it had set up before returning,
//!   so teardown never runs the down hook for an interface that never
//!   came up
//!
//! ## Last Modified
//! v0.1.0 - Initial session state machine

use std::sync::Arc;

use ipnet::Ipv4Net;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wstun_common::{RemoteNetwork, TunnelMode};
use wstun_core::protocol::{AddRouteRequest, Command, CommandFrame, CommandKind, InitRequest};
use wstun_transport::error::Result as TransportResult;
use wstun_transport::traits::{DeviceProvider, RouteTable};

use crate::error::{CommandError, Severity};
use crate::services::binding::{InterfaceBinding, InterfaceHandle, DEFAULT_PACKET_QUEUE};
use crate::services::hooks::LifecycleHooks;
use crate::services::multiplexer::{CloseReason, Multiplexer};
use crate::services::registry::{CommandContext, CommandRegistry};

// ============================================
// SessionState
// ============================================

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Connection up, no interface yet.
    Connected,
    /// Processing `init`.
    Initializing,
    /// Interface bound, packets flowing.
    Active,
    /// Teardown has begun.
    Closing,
    /// Interface closed, hooks run.
    Terminated,
}

impl SessionState {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// SessionOptions
// ============================================

/// Behaviour switches fixed at session construction.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Route all traffic through the tunnel after `init`.
    pub default_gateway: bool,
    /// Inbound packet queue depth of the interface.
    pub packet_queue: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_gateway: false,
            packet_queue: DEFAULT_PACKET_QUEUE,
        }
    }
}

// ============================================
// Session
// ============================================

/// One tunnel session.
pub struct Session {
    mux: Arc<Multiplexer>,
    binding: InterfaceBinding,
    routes: Arc<dyn RouteTable>,
    hooks: LifecycleHooks,
    registry: Arc<CommandRegistry>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    network: Option<RemoteNetwork>,
    installed_routes: Vec<Ipv4Net>,
    up_hook: Option<JoinHandle<()>>,
}

impl Session {
    /// Creates a session in `Connected` state.
    #[must_use]
    pub fn new(
        mux: Arc<Multiplexer>,
        provider: Arc<dyn DeviceProvider>,
        routes: Arc<dyn RouteTable>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connected);
        let options = SessionOptions::default();
        Self {
            mux,
            binding: InterfaceBinding::new(provider, Arc::clone(&routes))
                .with_packet_queue(options.packet_queue),
            routes,
            hooks: LifecycleHooks::none(),
            registry: Arc::new(CommandRegistry::new()),
            options,
            state,
            network: None,
            installed_routes: Vec::new(),
            up_hook: None,
        }
    }

    /// Sets the lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the extension commands. The registry is frozen from here on.
    #[must_use]
    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sets the session options.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.binding = self.binding.with_packet_queue(options.packet_queue);
        self.options = options;
        self
    }

    // ========================================
    // Accessors
    // ========================================

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observes state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The negotiated network, once `init` has succeeded.
    #[must_use]
    pub fn network(&self) -> Option<&RemoteNetwork> {
        self.network.as_ref()
    }

    /// The bound interface, while one exists.
    #[must_use]
    pub fn interface(&self) -> Option<&InterfaceHandle> {
        self.binding.handle()
    }

    /// Routes this session installed and has not yet withdrawn.
    #[must_use]
    pub fn installed_routes(&self) -> &[Ipv4Net] {
        &self.installed_routes
    }

    /// The multiplexer this session serves.
    #[must_use]
    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.mux
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Session state changed");
        }
    }

    // ========================================
    // Serving
    // ========================================

    /// Serves command frames until the multiplexer closes, then tears
    /// the session down.
    ///
    /// # Returns
    /// Why the connection closed.
    ///
    /// # Errors
    /// Returns the command error that ended the session, if one did.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<CommandFrame>,
    ) -> Result<CloseReason, CommandError> {
        let mux = Arc::clone(&self.mux);
        let mut fatal = None;

        loop {
            let frame = tokio::select! {
                biased;
                _ = mux.closed() => break,
                frame = commands.recv() => frame,
            };
            let Some(frame) = frame else {
                mux.begin_close(CloseReason::Shutdown);
                break;
            };

            let name = frame.name().to_string();
            let Err(e) = self.handle_frame(frame).await else {
                continue;
            };
            match e.severity() {
                Severity::Fatal => {
                    error!(command = %name, "{}", e);
                    mux.begin_close(CloseReason::SessionFatal(e.to_string()));
                    fatal = Some(e);
                    break;
                }
                Severity::Recoverable => warn!(command = %name, "{}", e),
                Severity::ProtocolViolation => {
                    warn!(command = %name, "Protocol violation: {}", e);
                }
            }
        }

        self.teardown().await;
        match fatal {
            Some(e) => Err(e),
            None => Ok(mux.close_reason().unwrap_or(CloseReason::Shutdown)),
        }
    }

    /// Handles one command frame.
    ///
    /// # Errors
    /// The command's failure; see [`CommandError::severity`].
    pub async fn handle_frame(&mut self, frame: CommandFrame) -> Result<(), CommandError> {
        let kind = CommandKind::of(&frame);
        let state = self.state();
        match kind {
            CommandKind::Init if state != SessionState::Connected => {
                return Err(CommandError::AlreadyInitialized { state });
            }
            CommandKind::AddRoute if state != SessionState::Active => {
                return Err(CommandError::AddRouteBeforeInit);
            }
            _ => {}
        }

        let command = Command::decode(frame).map_err(|e| match kind {
            CommandKind::Init => CommandError::InvalidInit(e),
            CommandKind::AddRoute | CommandKind::Other => CommandError::InvalidArguments(e),
        })?;

        match command {
            Command::Init(request) => self.init(request).await,
            Command::AddRoute(request) => self.add_route(request).await,
            Command::Other(frame) => self.dispatch_extension(&frame).await,
        }
    }

    // ========================================
    // Built-in commands
    // ========================================

    async fn init(&mut self, request: InitRequest) -> Result<(), CommandError> {
        let InitRequest { mode, network, mtu } = request;
        info!(mode = %mode, subnet = %network, mtu, "Initializing tunnel");
        self.set_state(SessionState::Initializing);

        if let Err(e) = self.bring_up(mode, &network, mtu).await {
            self.withdraw_routes(&network).await;
            self.binding.close().await;
            return Err(CommandError::Setup(e));
        }

        let iface = self
            .binding
            .handle()
            .map(|h| h.name().to_string())
            .unwrap_or_default();
        self.up_hook = self.hooks.spawn_up(network.as_str(), &iface);
        self.network = Some(network);
        self.set_state(SessionState::Active);
        info!(iface = %iface, "Tunnel active");
        Ok(())
    }

    async fn bring_up(
        &mut self,
        mode: TunnelMode,
        network: &RemoteNetwork,
        mtu: u16,
    ) -> TransportResult<()> {
        self.binding.create(mode.device_kind(), mtu).await?;
        let gateway = self
            .binding
            .configure(mode.with_addressing(), network, self.options.default_gateway)
            .await?;
        self.installed_routes.extend(gateway);
        self.binding.bind(&self.mux)
    }

    async fn add_route(&mut self, request: AddRouteRequest) -> Result<(), CommandError> {
        let (Some(network), Some(handle)) = (self.network.as_ref(), self.binding.handle()) else {
            return Err(CommandError::AddRouteBeforeInit);
        };

        let destination = request.destination;
        self.routes
            .add_route(handle.name(), destination, network)
            .await
            .map_err(CommandError::Route)?;
        info!(route = %destination, iface = %handle.name(), "Route added");
        self.installed_routes.push(destination);
        Ok(())
    }

    async fn dispatch_extension(&self, frame: &CommandFrame) -> Result<(), CommandError> {
        let Some(handler) = self.registry.get(frame.name()) else {
            return Err(CommandError::UnknownCommand(frame.name().to_string()));
        };

        debug!(command = %frame.name(), "Dispatching extension command");
        let ctx = CommandContext::new(
            self.state(),
            self.network.as_ref(),
            self.binding.handle().map(InterfaceHandle::name),
            &self.mux,
        );
        handler.handle(ctx, frame.args()).await
    }

    // ========================================
    // Teardown
    // ========================================

    /// Runs the down hook, withdraws routes, closes the interface and
    /// moves to `Terminated`. Does nothing once teardown has begun.
    pub async fn teardown(&mut self) {
        if matches!(
            self.state(),
            SessionState::Closing | SessionState::Terminated
        ) {
            return;
        }
        self.set_state(SessionState::Closing);

        if let (Some(handle), Some(network)) = (self.binding.handle(), self.network.as_ref()) {
            let iface = handle.name().to_string();
            self.hooks.run_down(network.as_str(), &iface).await;
        }
        if let Some(network) = self.network.clone() {
            self.withdraw_routes(&network).await;
        }
        self.binding.close().await;

        if let Some(up) = self.up_hook.take() {
            if !up.is_finished() {
                debug!("Up hook still running at teardown");
            }
        }
        self.set_state(SessionState::Terminated);
        info!("Session terminated");
    }

    async fn withdraw_routes(&mut self, network: &RemoteNetwork) {
        let Some(iface) = self.binding.handle().map(|h| h.name().to_string()) else {
            self.installed_routes.clear();
            return;
        };

        while let Some(route) = self.installed_routes.pop() {
            match self.routes.remove_route(&iface, route, network).await {
                Ok(()) => debug!(route = %route, iface = %iface, "Route withdrawn"),
                Err(e) => warn!(route = %route, iface = %iface, "Route withdrawal failed: {}", e),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("network", &self.network)
            .field("interface", &self.binding.handle())
            .field("installed_routes", &self.installed_routes)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::multiplexer::MultiplexerConfig;
    use wstun_transport::traits::TunDevice;
    use wstun_transport::{MockConnection, MockDeviceProvider, MockRouteTable, RouteOp};

    struct Fixture {
        session: Session,
        provider: Arc<MockDeviceProvider>,
        routes: Arc<MockRouteTable>,
    }

    fn fixture() -> Fixture {
        let conn = Arc::new(MockConnection::new());
        let (mux, _commands) = Multiplexer::start(
            conn,
            MultiplexerConfig {
                outbound_queue: 8,
                ping_interval: None,
            },
        );
        let provider = Arc::new(MockDeviceProvider::new());
        let routes = Arc::new(MockRouteTable::new());
        Fixture {
            session: Session::new(mux, provider.clone(), routes.clone()),
            provider,
            routes,
        }
    }

    fn frame(text: &str) -> CommandFrame {
        CommandFrame::decode(text).unwrap()
    }

    #[tokio::test]
    async fn test_init_activates() {
        let mut f = fixture();
        f.session.handle_frame(frame("init TUN 10.8.0.0/24 1400")).await.unwrap();

        assert_eq!(f.session.state(), SessionState::Active);
        assert_eq!(f.session.network().unwrap().as_str(), "10.8.0.0/24");
        let iface = f.session.interface().unwrap();
        assert_eq!(iface.mtu(), 1400);
        assert!(iface.is_bound());
        assert!(f.session.multiplexer().has_interface());
    }

    #[tokio::test]
    async fn test_tap_noconf_skips_address() {
        let mut f = fixture();
        f.session.handle_frame(frame("init TAP_NOCONF 10.8.0.2/24 1500")).await.unwrap();

        let device = f.provider.last_device().unwrap();
        assert_eq!(device.name(), "tap0");
        assert_eq!(device.configure_calls(), vec![None]);
    }

    #[tokio::test]
    async fn test_invalid_init_is_fatal() {
        let mut f = fixture();

        let err = f.session.handle_frame(frame("init TUN 10.8.0.0/24 big")).await.unwrap_err();
        assert!(err.is_fatal());
        let err = f.session.handle_frame(frame("init TUN nonsense 1400")).await.unwrap_err();
        assert!(err.is_fatal());
        let err = f.session.handle_frame(frame("init TUN 10.8.0.0/24")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid init: init needs 3 arguments");
        assert!(f.provider.devices().is_empty());
    }

    #[tokio::test]
    async fn test_setup_failure_releases_interface() {
        let mut f = fixture();
        f.routes.fail_add(true);
        f.session = f.session.with_options(SessionOptions {
            default_gateway: true,
            ..SessionOptions::default()
        });

        let err = f.session.handle_frame(frame("init TUN 10.8.0.2/24 1400")).await.unwrap_err();
        assert!(matches!(err, CommandError::Setup(_)));
        assert!(f.session.interface().is_none());
        assert!(!f.provider.last_device().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_addroute_state_and_arity() {
        let mut f = fixture();

        let err = f.session.handle_frame(frame("addroute 192.168.50.0/24")).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot addroute before init");
        let err = f.session.handle_frame(frame("addroute")).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot addroute before init");

        f.session.handle_frame(frame("init TUN 10.8.0.0/24 1400")).await.unwrap();
        for text in ["addroute", "addroute 10.0.0.0/8 10.1.0.0/16"] {
            let err = f.session.handle_frame(frame(text)).await.unwrap_err();
            assert_eq!(err.to_string(), "addroute needs 1 argument");
            assert_eq!(err.severity(), Severity::Recoverable);
        }
        let err = f.session.handle_frame(frame("addroute not-a-cidr")).await.unwrap_err();
        assert_eq!(err.severity(), Severity::Recoverable);
        assert!(f.routes.calls().is_empty());
    }

    #[tokio::test]
    async fn test_addroute_installs_and_teardown_withdraws() {
        let mut f = fixture();
        f.session.handle_frame(frame("init TUN 10.8.0.0/24 1400")).await.unwrap();
        f.session.handle_frame(frame("addroute 192.168.50.0/24")).await.unwrap();

        let adds = f.routes.calls_of(RouteOp::Add);
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].destination, "192.168.50.0/24".parse::<Ipv4Net>().unwrap());
        assert_eq!(adds[0].iface, "tun0");

        let err = f.session.handle_frame(frame("addroute 192.168.50.0/24")).await.unwrap_err();
        assert!(matches!(err, CommandError::Route(_)));
        assert_eq!(f.session.state(), SessionState::Active);

        f.session.teardown().await;
        assert_eq!(f.session.state(), SessionState::Terminated);
        assert_eq!(f.routes.calls_of(RouteOp::Remove).len(), 1);
        assert!(f.routes.installed().is_empty());
        assert!(!f.provider.last_device().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_protocol_violations() {
        let mut f = fixture();

        let err = f.session.handle_frame(frame("bogus 1 2")).await.unwrap_err();
        assert_eq!(err.severity(), Severity::ProtocolViolation);

        f.session.handle_frame(frame("init TUN 10.8.0.0/24 1400")).await.unwrap();
        let err = f.session.handle_frame(frame("init TAP 10.9.0.0/24 1500")).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::AlreadyInitialized {
                state: SessionState::Active
            }
        ));
        assert_eq!(f.provider.devices().len(), 1);
        assert_eq!(f.session.interface().unwrap().mtu(), 1400);
        assert_eq!(f.session.network().unwrap().as_str(), "10.8.0.0/24");
    }
}
