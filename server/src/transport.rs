//! Delivery seam between the option engine and connections
//!
//! The engine never talks to sockets directly. It hands ordered batches of
//! option operations to a [`Transport`], which is expected to deliver them in
//! call order per connection. Delivery failures are the transport's concern and
//! are not retried by the engine.

use shared::OptionOp;

pub trait Transport {
    /// Delivers `ops` to every connection in `include` (or to all connections
    /// when `include` is `None`) except those listed in `exclude`
    fn broadcast(&mut self, ops: Vec<OptionOp>, include: Option<&[u32]>, exclude: &[u32]);

    fn send(&mut self, client_id: u32, ops: Vec<OptionOp>) {
        self.broadcast(ops, Some(std::slice::from_ref(&client_id)), &[]);
    }
}

/// Splits `ops` into chunks of at most `chunk_size` and broadcasts them in order
pub fn broadcast_chunked<T: Transport + ?Sized>(
    transport: &mut T,
    ops: &[OptionOp],
    chunk_size: usize,
    include: Option<&[u32]>,
    exclude: &[u32],
) -> usize {
    let mut chunks = 0;
    for chunk in ops.chunks(chunk_size.max(1)) {
        transport.broadcast(chunk.to_vec(), include, exclude);
        chunks += 1;
    }
    chunks
}

/// A batch recorded by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub ops: Vec<OptionOp>,
    pub include: Option<Vec<u32>>,
    pub exclude: Vec<u32>,
}

impl Delivery {
    /// Whether a connection with `client_id` is addressed by this batch
    pub fn reaches(&self, client_id: u32) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |include| include.contains(&client_id));
        included && !self.exclude.contains(&client_id)
    }
}

/// In-process transport that records every batch in order
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub deliveries: Vec<Delivery>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations addressed to `client_id`, in delivery order
    pub fn ops_for(&self, client_id: u32) -> Vec<OptionOp> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.reaches(client_id))
            .flat_map(|delivery| delivery.ops.iter().cloned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.deliveries.clear();
    }
}

impl Transport for MemoryTransport {
    fn broadcast(&mut self, ops: Vec<OptionOp>, include: Option<&[u32]>, exclude: &[u32]) {
        self.deliveries.push(Delivery {
            ops,
            include: include.map(<[u32]>::to_vec),
            exclude: exclude.to_vec(),
        });
    }
}
