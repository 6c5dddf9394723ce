//! Multi-node test cluster.
//!
//! Builds N nodes on one virtual executor and one broadcast medium, with
//! per-node recorders for everything the engine delivers. Node `i` gets
//! address `i`, matching the way the end-to-end scenarios are written.

use std::{cell::RefCell, rc::Rc};

use bytes::Bytes;
use hopframe_core::{Node, NodeConfig};
use hopframe_proto::{Addr, Ts};

use crate::{executor::SimExecutor, link::SimLink, sim_host::SimHost};

type DeliveryLog = Rc<RefCell<Vec<(Addr, Bytes)>>>;

/// A simulated mesh of nodes with delivery recorders.
pub struct Cluster {
    executor: SimExecutor,
    link: SimLink,
    nodes: Vec<Node<SimHost>>,
    recv: Vec<DeliveryLog>,
    sync: Vec<Rc<RefCell<Vec<Ts>>>>,
    debug: Vec<DeliveryLog>,
}

impl Cluster {
    /// Build `count` nodes on a full-mesh medium. Nothing is initialized
    /// yet; call [`Cluster::init_all`] (or init nodes selectively).
    pub fn new(count: usize, config: &NodeConfig) -> Self {
        let executor = SimExecutor::new();
        let link = SimLink::new(executor.clone());

        let mut nodes = Vec::with_capacity(count);
        let mut recv = Vec::with_capacity(count);
        let mut sync = Vec::with_capacity(count);
        let mut debug = Vec::with_capacity(count);

        for index in 0..count {
            let addr = index as Addr;
            let host = SimHost::new(addr, executor.clone(), link.clone());
            let node = Node::new(host, addr, config.clone());

            let recv_log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&recv_log);
            node.on_recv(move |src, data| log.borrow_mut().push((src, data)));

            let sync_log: Rc<RefCell<Vec<Ts>>> = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&sync_log);
            node.on_sync_time(move |ts| log.borrow_mut().push(ts));

            let debug_log: DeliveryLog = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&debug_log);
            node.on_recv_debug(move |src, data| log.borrow_mut().push((src, data)));

            let sink = node.clone();
            link.attach(addr, move |bytes, lqs| sink.receive(bytes, lqs));

            nodes.push(node);
            recv.push(recv_log);
            sync.push(sync_log);
            debug.push(debug_log);
        }

        Self { executor, link, nodes, recv, sync, debug }
    }

    /// Build a linear chain: node `i` hears only nodes `i - 1` and `i + 1`.
    pub fn chain(count: usize, config: &NodeConfig) -> Self {
        let cluster = Self::new(count, config);
        cluster.link.set_topology(|a, b| a.abs_diff(b) == 1);
        cluster
    }

    /// Initialize every node, in address order.
    pub fn init_all(&self) {
        for node in &self.nodes {
            node.init();
        }
    }

    /// The shared virtual executor.
    pub fn executor(&self) -> &SimExecutor {
        &self.executor
    }

    /// The shared broadcast medium.
    pub fn link(&self) -> &SimLink {
        &self.link
    }

    /// Node `index`.
    pub fn node(&self, index: usize) -> &Node<SimHost> {
        &self.nodes[index]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cluster is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Advance virtual time, draining due tasks.
    pub fn run_for(&self, ms: u64) {
        self.executor.run_for(ms);
    }

    /// User payloads delivered at node `index`, in arrival order.
    pub fn recv_log(&self, index: usize) -> Vec<(Addr, Bytes)> {
        self.recv[index].borrow().clone()
    }

    /// Time-sync values delivered at node `index`.
    pub fn sync_log(&self, index: usize) -> Vec<Ts> {
        self.sync[index].borrow().clone()
    }

    /// Path-debug deliveries at node `index`.
    pub fn debug_log(&self, index: usize) -> Vec<(Addr, Bytes)> {
        self.debug[index].borrow().clone()
    }
}
