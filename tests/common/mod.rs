//! A test-only simulated network standing in for the injected transport
//! (spec §1(a), §6). Mirrors the `labrpc`-style tester network that drove
//! `original_source/src/raft/raft.go` — `connect`/`disconnect` simulate a
//! partition, calls route through a shared registry rather than sockets.
//! This is integration-test scaffolding only; it is not part of the
//! crate's public API.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

use raft_core::{
    AppendEntriesArgs, AppendEntriesReply, ApplyMsg, Persister, Raft, RaftClient, RaftConfig,
    RequestVoteArgs, RequestVoteReply, RpcError,
};

pub struct MemoryPersister {
    blob: Mutex<Vec<u8>>,
}

impl MemoryPersister {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryPersister {
            blob: Mutex::new(Vec::new()),
        })
    }
}

impl Persister for MemoryPersister {
    fn save(&self, blob: Vec<u8>) {
        *self.blob.lock().unwrap() = blob;
    }
    fn read(&self) -> Vec<u8> {
        self.blob.lock().unwrap().clone()
    }
}

struct NetworkState {
    servers: HashMap<u64, Raft<String>>,
    connected: HashMap<(u64, u64), bool>,
}

/// A shared, mutable registry of live peers plus a connectivity matrix.
/// `NetworkClient` instances hold an `Arc<Network>` and a `(from, to)`
/// pair, looking the target peer up by id on every call so that peers can
/// be registered, killed, and restarted independently of the client
/// handles the rest of the cluster already holds.
pub struct Network {
    state: Mutex<NetworkState>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Network {
            state: Mutex::new(NetworkState {
                servers: HashMap::new(),
                connected: HashMap::new(),
            }),
        })
    }

    pub fn register(&self, id: u64, peer: Raft<String>) {
        self.state.lock().unwrap().servers.insert(id, peer);
    }

    pub fn client(self: &Arc<Self>, from: u64, to: u64) -> Arc<dyn RaftClient<String>> {
        Arc::new(NetworkClient {
            net: self.clone(),
            from,
            to,
        })
    }

    fn is_connected(&self, from: u64, to: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .connected
            .get(&(from, to))
            .copied()
            .unwrap_or(true)
    }

    /// Cuts `id` off from every other peer in both directions, simulating
    /// a network partition (spec §8 scenario 4).
    pub fn disconnect(&self, id: u64, peers: &[u64]) {
        let mut state = self.state.lock().unwrap();
        for &other in peers {
            state.connected.insert((id, other), false);
            state.connected.insert((other, id), false);
        }
    }

    pub fn connect(&self, id: u64, peers: &[u64]) {
        let mut state = self.state.lock().unwrap();
        for &other in peers {
            state.connected.insert((id, other), true);
            state.connected.insert((other, id), true);
        }
    }
}

struct NetworkClient {
    net: Arc<Network>,
    from: u64,
    to: u64,
}

impl RaftClient<String> for NetworkClient {
    fn request_vote(&self, args: RequestVoteArgs) -> Result<RequestVoteReply, RpcError> {
        if !self.net.is_connected(self.from, self.to) {
            return Err(RpcError::Disconnected);
        }
        let target = {
            let state = self.net.state.lock().unwrap();
            state.servers.get(&self.to).cloned()
        };
        match target {
            Some(peer) => Ok(peer.request_vote(args)),
            None => Err(RpcError::Disconnected),
        }
    }

    fn append_entries(&self, args: AppendEntriesArgs<String>) -> Result<AppendEntriesReply, RpcError> {
        if !self.net.is_connected(self.from, self.to) {
            return Err(RpcError::Disconnected);
        }
        let target = {
            let state = self.net.state.lock().unwrap();
            state.servers.get(&self.to).cloned()
        };
        match target {
            Some(peer) => Ok(peer.append_entries(args)),
            None => Err(RpcError::Disconnected),
        }
    }
}

/// A `n`-peer cluster wired through a shared `Network`, each peer backed
/// by its own `MemoryPersister` so it can be "crashed" (dropped) and
/// restarted from the same persisted blob (spec §8 scenario 5).
pub struct Cluster {
    pub network: Arc<Network>,
    pub persisters: Vec<Arc<MemoryPersister>>,
    pub peers: Vec<Raft<String>>,
    pub applied: Vec<Arc<Mutex<Vec<(u64, String)>>>>,
    ids: Vec<u64>,
}

impl Cluster {
    pub fn new(n: usize) -> Self {
        let network = Network::new();
        let ids: Vec<u64> = (0..n as u64).collect();
        let persisters: Vec<_> = (0..n).map(|_| MemoryPersister::new()).collect();
        let mut peers = Vec::new();
        let mut applied = Vec::new();

        for i in 0..n {
            let peer_clients: Vec<Arc<dyn RaftClient<String>>> =
                ids.iter().map(|&j| network.client(i as u64, j)).collect();
            let (tx, rx) = channel();
            let log: Arc<Mutex<Vec<(u64, String)>>> = Arc::new(Mutex::new(Vec::new()));
            spawn_collector(rx, log.clone());
            let raft = Raft::new(
                i as u64,
                peer_clients,
                persisters[i].clone(),
                Box::new(tx),
                RaftConfig::default(),
            );
            network.register(i as u64, raft.clone());
            peers.push(raft);
            applied.push(log);
        }

        Cluster {
            network,
            persisters,
            peers,
            applied,
            ids,
        }
    }

    pub fn leader(&self) -> Option<usize> {
        self.peers
            .iter()
            .enumerate()
            .find(|(_, p)| p.get_state().1)
            .map(|(i, _)| i)
    }

    pub fn kill(&self, id: usize) {
        self.peers[id].kill();
    }

    /// Restarts peer `id` from its persisted blob, reconnecting it to
    /// every other current peer.
    pub fn restart(&mut self, id: usize) {
        self.peers[id].kill();
        let peer_clients: Vec<Arc<dyn RaftClient<String>>> = self
            .ids
            .iter()
            .map(|&j| self.network.client(id as u64, j))
            .collect();
        let (tx, rx) = channel();
        let log: Arc<Mutex<Vec<(u64, String)>>> = Arc::new(Mutex::new(Vec::new()));
        spawn_collector(rx, log.clone());
        let raft = Raft::new(
            id as u64,
            peer_clients,
            self.persisters[id].clone(),
            Box::new(tx),
            RaftConfig::default(),
        );
        self.network.register(id as u64, raft.clone());
        self.peers[id] = raft;
        self.applied[id] = log;
    }

    pub fn disconnect(&self, id: usize) {
        let others: Vec<u64> = self.ids.iter().copied().filter(|&x| x != id as u64).collect();
        self.network.disconnect(id as u64, &others);
    }

    pub fn connect(&self, id: usize) {
        let others: Vec<u64> = self.ids.iter().copied().filter(|&x| x != id as u64).collect();
        self.network.connect(id as u64, &others);
    }
}

fn spawn_collector(rx: Receiver<ApplyMsg<String>>, log: Arc<Mutex<Vec<(u64, String)>>>) {
    std::thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            if msg.command_valid {
                if let Some(command) = msg.command {
                    log.lock().unwrap().push((msg.command_index, command));
                }
            }
        }
    });
}
