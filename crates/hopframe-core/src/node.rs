//! The per-node protocol engine.
//!
//! [`Node`] owns all protocol state: the sequence counter, the dedup cache,
//! the route table, and the registered callbacks. The host feeds it frames
//! through [`Node::receive`] and supplies broadcast, a delayed scheduler,
//! and a clock; everything else happens here.
//!
//! # Event flow
//!
//! 1. `receive(bytes, lqs)` parses and filters (self-source, ttl bound,
//!    dedup).
//! 2. The dispatch switch routes by type: advertisements feed the route
//!    table, route-class frames are delivered or forwarded hop by hop,
//!    flood-class frames are delivered and re-broadcast after a jittered
//!    delay.
//! 3. Outbound operations serialize and hand the frame to the host.
//!
//! # Handle semantics
//!
//! `Node` is a cheap clone over shared state. Scheduled tasks (periodic
//! timers, pending refloods) capture a weak handle: once every `Node` clone
//! is dropped they become no-ops, which is how shutdown works: drop the
//! node and its executor together.
//!
//! User callbacks run synchronously on the executor with the engine borrow
//! released, so a callback may re-enter the node (for example, answering a
//! frame from inside `on_recv`). Callbacks must not block.

use std::{cell::RefCell, rc::Rc};

use bytes::Bytes;
use hopframe_proto::{
    ADDR_BROADCAST, ADDR_UNSET, Addr, DATA_MAX, Lqs, Message, MessageType, ROUTES_PER_FRAME,
    RouteMsg, Seq, Ts,
};

use crate::{
    config::NodeConfig,
    error::SendError,
    host::Host,
    jitter::time_based_random,
    lru::RecentCache,
    route_table::{RouteEntry, RouteOrigin, RouteTable},
};

/// Callback for delivered user payloads: `(source, data)`.
pub type RecvHandler = Box<dyn FnMut(Addr, Bytes)>;

/// Callback for received time-sync floods: the originator's timestamp.
pub type TimeSyncHandler = Box<dyn FnMut(Ts)>;

/// Predicate hook over a message. Returning false aborts the operation.
/// The hook may rewrite header fields before the message proceeds.
pub type Interceptor = Box<dyn FnMut(&mut Message) -> bool>;

/// Engine counters.
///
/// Every dropped inbound frame lands in exactly one counter; the delivery
/// and forwarding counters track the happy paths. Cheap enough to keep
/// unconditionally, and the simulation harness asserts over them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Frames rejected by the codec.
    pub parse_errors: u64,
    /// Own frames heard back from the link.
    pub dropped_self: u64,
    /// Frames with an out-of-range or exhausted hop budget.
    pub dropped_ttl: u64,
    /// Frames already seen recently.
    pub dropped_duplicate: u64,
    /// Transit frames with no usable route.
    pub dropped_no_route: u64,
    /// Transit frames for which this node is not the designated forwarder.
    pub dropped_not_forwarder: u64,
    /// Inbound frames vetoed by the dispatch interceptor.
    pub vetoed_dispatch: u64,
    /// Outbound frames vetoed by the broadcast interceptor.
    pub vetoed_broadcast: u64,
    /// Route-class frames re-broadcast toward their destination.
    pub forwarded: u64,
    /// Flood-class frames scheduled for re-broadcast.
    pub reflooded: u64,
    /// Frames delivered to a local callback.
    pub delivered: u64,
}

struct NodeState<H> {
    host: H,
    addr: Addr,
    config: NodeConfig,
    seq: Seq,
    recent: RecentCache,
    routes: RouteTable,
    stats: NodeStats,
    initialized: bool,
    on_recv: Option<RecvHandler>,
    on_sync_time: Option<TimeSyncHandler>,
    on_recv_debug: Option<RecvHandler>,
    broadcast_interceptor: Option<Interceptor>,
    dispatch_interceptor: Option<Interceptor>,
}

impl<H> NodeState<H> {
    fn next_seq(&mut self) -> Seq {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }
}

/// A mesh node bound to a [`Host`].
///
/// Cloning yields another handle to the same node.
pub struct Node<H: Host> {
    inner: Rc<RefCell<NodeState<H>>>,
}

impl<H: Host> Clone for Node<H> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<H: Host> Node<H> {
    /// Create a node with address `addr` on `host`.
    ///
    /// The node is inert until [`Node::init`] runs.
    pub fn new(host: H, addr: Addr, config: NodeConfig) -> Self {
        let lru_size = config.lru_size;
        Self {
            inner: Rc::new(RefCell::new(NodeState {
                host,
                addr,
                config,
                seq: 0,
                recent: RecentCache::new(lru_size),
                routes: RouteTable::new(),
                stats: NodeStats::default(),
                initialized: false,
                on_recv: None,
                on_sync_time: None,
                on_recv_debug: None,
                broadcast_interceptor: None,
                dispatch_interceptor: None,
            })),
        }
    }

    /// Bring the node up: install the self-route, solicit neighbour tables
    /// with one `route_info_and_request`, and arm the periodic routing-sync
    /// and expiry-sweep timers.
    ///
    /// Calling `init` twice is a caller bug (checked in debug builds).
    pub fn init(&self) {
        {
            let mut state = self.inner.borrow_mut();
            debug_assert!(!state.initialized, "init called twice");
            state.initialized = true;
            let now = state.host.now_ms();
            let addr = state.addr;
            state.routes.add_or_replace(RouteEntry {
                dst: addr,
                next_hop: addr,
                metric: 0,
                lqs: 0,
                refreshed_at: now,
                origin: RouteOrigin::Dynamic,
            });
        }
        self.sync_route(true);
        self.arm_sync_timer();
        self.arm_sweep_timer();
    }

    /// This node's address.
    pub fn addr(&self) -> Addr {
        self.inner.borrow().addr
    }

    /// Snapshot of the engine counters.
    pub fn stats(&self) -> NodeStats {
        self.inner.borrow().stats
    }

    /// Route entry for `dst`, if known.
    pub fn route(&self, dst: Addr) -> Option<RouteEntry> {
        self.inner.borrow().routes.find(dst).copied()
    }

    /// Snapshot of the whole route table.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.inner.borrow().routes.iter().copied().collect()
    }

    /// Register the user-payload callback. Replaces any previous one.
    pub fn on_recv(&self, cb: impl FnMut(Addr, Bytes) + 'static) {
        self.inner.borrow_mut().on_recv = Some(Box::new(cb));
    }

    /// Register the time-sync callback. Replaces any previous one.
    pub fn on_sync_time(&self, cb: impl FnMut(Ts) + 'static) {
        self.inner.borrow_mut().on_sync_time = Some(Box::new(cb));
    }

    /// Register the path-debug callback. Replaces any previous one.
    pub fn on_recv_debug(&self, cb: impl FnMut(Addr, Bytes) + 'static) {
        self.inner.borrow_mut().on_recv_debug = Some(Box::new(cb));
    }

    /// Hook every outbound frame before serialization. Returning false
    /// drops the emission.
    pub fn set_broadcast_interceptor(&self, f: impl FnMut(&mut Message) -> bool + 'static) {
        self.inner.borrow_mut().broadcast_interceptor = Some(Box::new(f));
    }

    /// Hook every parsed inbound frame before dispatch. Returning false
    /// drops the frame.
    pub fn set_dispatch_interceptor(&self, f: impl FnMut(&mut Message) -> bool + 'static) {
        self.inner.borrow_mut().dispatch_interceptor = Some(Box::new(f));
    }

    /// Unicast `data` to `dst`.
    ///
    /// With no route known the frame is still emitted with this node as its
    /// own next hop; neighbours not on a route to `dst` will drop it, so
    /// behaviour degrades to no-path rather than an error.
    ///
    /// # Errors
    ///
    /// [`SendError::SizeExceeded`] for oversized payloads,
    /// [`SendError::InterceptorVetoed`] if the broadcast hook refuses.
    pub fn send(&self, dst: Addr, data: impl Into<Bytes>) -> Result<(), SendError> {
        let data = data.into();
        let max = MessageType::UserData.max_data();
        let msg = {
            let mut state = self.inner.borrow_mut();
            if data.len() > max {
                tracing::error!(len = data.len(), "outbound payload too large");
                return Err(SendError::SizeExceeded { len: data.len(), max });
            }
            let next_hop = match state.routes.find(dst) {
                Some(entry) => entry.next_hop,
                None => {
                    tracing::debug!(dst, "no route known, emitting with self as next hop");
                    state.addr
                },
            };
            let ts = state.host.now_ms();
            Message {
                kind: MessageType::UserData,
                ttl: state.config.ttl_default,
                src: state.addr,
                dst,
                seq: state.next_seq(),
                ts,
                next_hop,
                data,
            }
        };
        self.intercept_and_broadcast(msg)
    }

    /// Flood `data` to every reachable node.
    ///
    /// # Errors
    ///
    /// Same as [`Node::send`].
    pub fn broadcast(&self, data: impl Into<Bytes>) -> Result<(), SendError> {
        let data = data.into();
        let max = MessageType::Broadcast.max_data();
        let msg = {
            let mut state = self.inner.borrow_mut();
            if data.len() > max {
                tracing::error!(len = data.len(), "outbound payload too large");
                return Err(SendError::SizeExceeded { len: data.len(), max });
            }
            let ts = state.host.now_ms();
            Message {
                kind: MessageType::Broadcast,
                ttl: state.config.ttl_default,
                src: state.addr,
                dst: ADDR_UNSET,
                seq: state.next_seq(),
                ts,
                next_hop: ADDR_UNSET,
                data,
            }
        };
        self.intercept_and_broadcast(msg)
    }

    /// Flood this node's clock to the mesh. Returns the timestamp that was
    /// put on the wire.
    ///
    /// # Errors
    ///
    /// [`SendError::InterceptorVetoed`] if the broadcast hook refuses.
    pub fn sync_time(&self) -> Result<Ts, SendError> {
        let (msg, ts) = {
            let mut state = self.inner.borrow_mut();
            let ts = state.host.now_ms();
            let msg = Message {
                kind: MessageType::SyncTime,
                ttl: state.config.ttl_default,
                src: state.addr,
                dst: ADDR_UNSET,
                seq: state.next_seq(),
                ts,
                next_hop: ADDR_UNSET,
                data: Bytes::new(),
            };
            (msg, ts)
        };
        self.intercept_and_broadcast(msg)?;
        Ok(ts)
    }

    /// Emit a path-tracing probe toward `dst`.
    ///
    /// The payload starts as this node's address in ASCII; each forwarder
    /// appends itself, so the destination receives the whole path.
    /// `outbound = false` emits the return-leg variant.
    ///
    /// # Errors
    ///
    /// [`SendError::InterceptorVetoed`] if the broadcast hook refuses.
    pub fn send_route_debug(&self, dst: Addr, outbound: bool) -> Result<(), SendError> {
        let msg = {
            let mut state = self.inner.borrow_mut();
            let kind =
                if outbound { MessageType::RouteDebugSend } else { MessageType::RouteDebugBack };
            let next_hop = state.routes.find(dst).map_or(state.addr, |entry| entry.next_hop);
            let ts = state.host.now_ms();
            let data = Bytes::from(state.addr.to_string().into_bytes());
            Message {
                kind,
                ttl: state.config.ttl_default,
                src: state.addr,
                dst,
                seq: state.next_seq(),
                ts,
                next_hop,
                data,
            }
        };
        self.intercept_and_broadcast(msg)
    }

    /// Pin a route: `dst` via `next_hop` at metric 1. Static entries never
    /// expire and dynamic advertisements do not displace them.
    pub fn add_static_route(&self, dst: Addr, next_hop: Addr) {
        let mut state = self.inner.borrow_mut();
        let now = state.host.now_ms();
        state.routes.add_or_replace(RouteEntry {
            dst,
            next_hop,
            metric: 1,
            lqs: 0,
            refreshed_at: now,
            origin: RouteOrigin::Static,
        });
    }

    /// Advertise this node's route table to its neighbours.
    ///
    /// Entries are packed 83 per frame; with `request` set, the final frame
    /// also solicits the receivers' tables. With routing disabled only the
    /// self-route is advertised.
    pub fn sync_route(&self, request: bool) {
        let msgs: Vec<Message> = {
            let mut state = self.inner.borrow_mut();
            let self_addr = state.addr;
            let advertised: Vec<RouteMsg> = if state.config.enable_dv_routing {
                state
                    .routes
                    .iter()
                    .map(|entry| RouteMsg {
                        dst: entry.dst,
                        next_hop: self_addr,
                        metric: entry.metric,
                    })
                    .collect()
            } else {
                vec![RouteMsg { dst: self_addr, next_hop: self_addr, metric: 0 }]
            };
            if advertised.is_empty() {
                return;
            }
            let chunk_count = advertised.len().div_ceil(ROUTES_PER_FRAME);
            advertised
                .chunks(ROUTES_PER_FRAME)
                .enumerate()
                .map(|(index, chunk)| {
                    let kind = if request && index == chunk_count - 1 {
                        MessageType::RouteInfoAndRequest
                    } else {
                        MessageType::RouteInfo
                    };
                    let ts = state.host.now_ms();
                    Message {
                        kind,
                        ttl: state.config.ttl_default,
                        src: self_addr,
                        dst: ADDR_BROADCAST,
                        seq: state.next_seq(),
                        ts,
                        next_hop: ADDR_UNSET,
                        data: RouteMsg::encode_batch(chunk),
                    }
                })
                .collect()
        };
        for msg in msgs {
            let _ = self.intercept_and_broadcast(msg);
        }
    }

    /// Feed a received frame into the engine.
    ///
    /// The host calls this for every frame heard on the link, along with
    /// the link-quality score of the reception (0 when unknown). Malformed
    /// and unwanted frames are counted and dropped; nothing propagates out.
    pub fn receive(&self, frame: &[u8], lqs: Lqs) {
        let msg = match Message::deserialize(frame) {
            Ok(msg) => msg,
            Err(err) => {
                let mut state = self.inner.borrow_mut();
                state.stats.parse_errors += 1;
                tracing::warn!(error = %err, len = frame.len(), "dropping malformed frame");
                return;
            },
        };
        self.dispatch(msg, lqs);
    }

    fn dispatch(&self, mut msg: Message, lqs: Lqs) {
        let vetoed = self
            .with_slot(|state| &mut state.dispatch_interceptor, |cb| !cb(&mut msg))
            .unwrap_or(false);
        if vetoed {
            let mut state = self.inner.borrow_mut();
            state.stats.vetoed_dispatch += 1;
            tracing::debug!(src = msg.src, "inbound frame vetoed by interceptor");
            return;
        }

        {
            let mut state = self.inner.borrow_mut();
            tracing::trace!(
                node = state.addr,
                src = msg.src,
                dst = msg.dst,
                seq = msg.seq,
                ttl = msg.ttl,
                kind = ?msg.kind,
                "frame in"
            );
            if msg.src == state.addr {
                state.stats.dropped_self += 1;
                tracing::debug!("dropping own frame heard back");
                return;
            }
            if msg.ttl > state.config.ttl_default {
                state.stats.dropped_ttl += 1;
                tracing::warn!(ttl = msg.ttl, "dropping frame with out-of-range ttl");
                return;
            }
            let uuid = msg.uuid();
            if state.recent.exists(uuid) {
                state.stats.dropped_duplicate += 1;
                tracing::debug!(src = msg.src, seq = msg.seq, "dropping duplicate frame");
                return;
            }
            state.recent.put(uuid);
        }

        match msg.kind {
            MessageType::RouteInfo | MessageType::RouteInfoAndRequest => {
                self.ingest_routes(&msg, lqs);
            },
            MessageType::UserData | MessageType::RouteDebugSend | MessageType::RouteDebugBack => {
                self.forward_or_deliver(msg);
            },
            MessageType::Broadcast | MessageType::SyncTime => self.deliver_and_reflood(msg),
        }
    }

    /// Merge a neighbour's advertisement into the route table.
    fn ingest_routes(&self, msg: &Message, lqs: Lqs) {
        {
            let mut state = self.inner.borrow_mut();
            if state.config.enable_dv_routing {
                let now = state.host.now_ms();
                let self_addr = state.addr;
                let metric_cap = state.config.ttl_default;
                for advert in RouteMsg::iter_payload(&msg.data) {
                    // A path through us back to us would be a loop.
                    if advert.next_hop == self_addr {
                        continue;
                    }
                    if advert.metric >= metric_cap {
                        continue;
                    }
                    let candidate = RouteEntry {
                        dst: advert.dst,
                        // The usable hop is the advertisement's sender, not
                        // the hop the sender itself uses.
                        next_hop: msg.src,
                        metric: advert.metric + 1,
                        lqs,
                        refreshed_at: now,
                        origin: RouteOrigin::Dynamic,
                    };
                    if state.routes.apply_candidate(candidate) {
                        tracing::debug!(
                            dst = advert.dst,
                            next_hop = msg.src,
                            metric = advert.metric + 1,
                            "route installed"
                        );
                    }
                }
            }
        }
        if msg.kind == MessageType::RouteInfoAndRequest {
            self.sync_route(false);
        }
    }

    /// Deliver a route-class frame locally or relay it one hop.
    fn forward_or_deliver(&self, mut msg: Message) {
        let (self_addr, debug_enabled) = {
            let state = self.inner.borrow();
            (state.addr, state.config.enable_route_debug)
        };

        if msg.dst == self_addr {
            match msg.kind {
                MessageType::UserData => {
                    self.inner.borrow_mut().stats.delivered += 1;
                    let (src, data) = (msg.src, msg.data);
                    self.with_slot(|state| &mut state.on_recv, |cb| cb(src, data));
                },
                MessageType::RouteDebugSend | MessageType::RouteDebugBack => {
                    if !debug_enabled {
                        tracing::debug!(src = msg.src, "route debug disabled, ignoring probe");
                        return;
                    }
                    self.inner.borrow_mut().stats.delivered += 1;
                    let sep = if msg.kind == MessageType::RouteDebugSend { '>' } else { '<' };
                    let path = append_hop(&msg.data, sep, self_addr);
                    let src = msg.src;
                    self.with_slot(|state| &mut state.on_recv_debug, |cb| cb(src, path));
                    if msg.kind == MessageType::RouteDebugSend {
                        // Answer so the tracer sees the return leg too.
                        let _ = self.send_route_debug(msg.src, false);
                    }
                },
                _ => {},
            }
            return;
        }

        let msg = {
            let mut state = self.inner.borrow_mut();
            if !state.config.enable_dv_routing {
                state.stats.dropped_no_route += 1;
                tracing::debug!(dst = msg.dst, "routing disabled, not forwarding");
                return;
            }
            if msg.ttl <= 1 {
                state.stats.dropped_ttl += 1;
                tracing::debug!(src = msg.src, seq = msg.seq, "dropping frame, ttl exhausted");
                return;
            }
            msg.ttl -= 1;
            if msg.next_hop != state.addr {
                state.stats.dropped_not_forwarder += 1;
                tracing::trace!(next_hop = msg.next_hop, "not the designated forwarder");
                return;
            }
            let Some(entry) = state.routes.find(msg.dst) else {
                state.stats.dropped_no_route += 1;
                tracing::debug!(dst = msg.dst, "no route for transit frame");
                return;
            };
            msg.next_hop = entry.next_hop;
            match msg.kind {
                MessageType::RouteDebugSend => msg.data = append_hop(&msg.data, '>', state.addr),
                MessageType::RouteDebugBack => msg.data = append_hop(&msg.data, '<', state.addr),
                _ => {},
            }
            state.stats.forwarded += 1;
            msg
        };
        // Transit frames go out immediately; only floods are jittered.
        let _ = self.intercept_and_broadcast(msg);
    }

    /// Deliver a flood-class frame locally, then schedule its reflood.
    fn deliver_and_reflood(&self, mut msg: Message) {
        match msg.kind {
            MessageType::Broadcast => {
                self.inner.borrow_mut().stats.delivered += 1;
                // Clone, not move: the payload must survive for the reflood.
                let (src, data) = (msg.src, msg.data.clone());
                self.with_slot(|state| &mut state.on_recv, |cb| cb(src, data));
            },
            MessageType::SyncTime => {
                let enabled = self.inner.borrow().config.enable_time_sync;
                if enabled {
                    self.inner.borrow_mut().stats.delivered += 1;
                    let ts = msg.ts;
                    self.with_slot(|state| &mut state.on_sync_time, |cb| cb(ts));
                }
            },
            _ => return,
        }

        let mut state = self.inner.borrow_mut();
        if !state.config.enable_dv_routing {
            return;
        }
        if msg.ttl <= 1 {
            state.stats.dropped_ttl += 1;
            tracing::trace!(src = msg.src, "flood stopped, ttl exhausted");
            return;
        }
        msg.ttl -= 1;
        let seed = state
            .host
            .now_ms()
            .wrapping_add(u32::from(state.addr))
            .wrapping_add(u32::from(state.seq));
        let delay = time_based_random(seed, state.config.delay_min_ms, state.config.delay_max_ms);
        state.stats.reflooded += 1;
        tracing::debug!(src = msg.src, seq = msg.seq, ttl = msg.ttl, delay, "scheduling reflood");
        let weak = Rc::downgrade(&self.inner);
        state.host.schedule_after(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let _ = (Node { inner }).intercept_and_broadcast(msg);
                }
            }),
        );
    }

    /// Run the broadcast interceptor, serialize, and hand to the link.
    fn intercept_and_broadcast(&self, mut msg: Message) -> Result<(), SendError> {
        let vetoed = self
            .with_slot(|state| &mut state.broadcast_interceptor, |cb| !cb(&mut msg))
            .unwrap_or(false);
        if vetoed {
            let mut state = self.inner.borrow_mut();
            state.stats.vetoed_broadcast += 1;
            tracing::debug!(kind = ?msg.kind, "outbound frame vetoed by interceptor");
            return Err(SendError::InterceptorVetoed);
        }
        let frame = match msg.serialize() {
            Ok(frame) => frame,
            Err(err) => {
                // Forwarded debug probes can outgrow the payload budget
                // while accumulating their path.
                tracing::error!(error = %err, "dropping unserializable frame");
                return Err(SendError::SizeExceeded { len: msg.data.len(), max: DATA_MAX });
            },
        };
        self.inner.borrow().host.broadcast(&frame);
        Ok(())
    }

    /// Re-arming periodic advertisement timer.
    fn arm_sync_timer(&self) {
        let weak = Rc::downgrade(&self.inner);
        let state = self.inner.borrow();
        state.host.schedule_after(
            state.config.route_sync_interval_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let node = Node { inner };
                    node.sync_route(false);
                    node.arm_sync_timer();
                }
            }),
        );
    }

    /// Re-arming periodic expiry sweep.
    fn arm_sweep_timer(&self) {
        let weak = Rc::downgrade(&self.inner);
        let state = self.inner.borrow();
        state.host.schedule_after(
            state.config.route_check_interval_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let node = Node { inner };
                    {
                        let mut state = node.inner.borrow_mut();
                        let now = state.host.now_ms();
                        let expired_ms = state.config.route_expired_ms;
                        let cap = state.config.ttl_default;
                        state.routes.sweep_expired(now, expired_ms, cap);
                    }
                    node.arm_sweep_timer();
                }
            }),
        );
    }

    /// Take a callback slot, run it with the engine borrow released, and
    /// put it back, unless the callback itself registered a replacement.
    ///
    /// This is what makes re-entrant callbacks safe: the user code runs
    /// while the node is unborrowed.
    fn with_slot<C, R>(
        &self,
        slot: fn(&mut NodeState<H>) -> &mut Option<C>,
        run: impl FnOnce(&mut C) -> R,
    ) -> Option<R> {
        let taken = {
            let mut state = self.inner.borrow_mut();
            slot(&mut state).take()
        };
        let mut cb = taken?;
        let out = run(&mut cb);
        let mut state = self.inner.borrow_mut();
        let entry = slot(&mut state);
        if entry.is_none() {
            *entry = Some(cb);
        }
        Some(out)
    }
}

/// Append `sep` and a node address to an accumulated path payload.
fn append_hop(data: &Bytes, sep: char, addr: Addr) -> Bytes {
    let mut path = Vec::with_capacity(data.len() + 4);
    path.extend_from_slice(data);
    path.push(sep as u8);
    path.extend_from_slice(addr.to_string().as_bytes());
    Bytes::from(path)
}
